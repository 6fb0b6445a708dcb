//! Virtual file identities and content stamps for the Kiln driver.
//!
//! Every filesystem-facing identifier inside the incremental core passes
//! through a [`FileConverter`], which interns logical paths into opaque
//! [`VirtualFileRef`]s. The [`StampOracle`] produces memoized content stamps
//! for sources, products, and libraries on demand.

#![warn(missing_docs)]

pub mod converter;
pub mod file;
pub mod oracle;
pub mod stamp;

pub use converter::FileConverter;
pub use file::{VirtualFile, VirtualFileRef};
pub use oracle::StampOracle;
pub use stamp::{Stamp, StampError};
