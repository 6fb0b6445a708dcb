//! Shared foundational types used across the Kiln incremental compiler driver.
//!
//! This crate provides interned identifiers, content and API hashing, and the
//! internal error type used by every other Kiln crate.

#![warn(missing_docs)]

pub mod hash;
pub mod intern;
pub mod result;

pub use hash::{ApiHash, ContentHash};
pub use intern::{Interner, Name};
pub use result::{InternalError, KilnResult};
