//! Diagnostic types reported by the external compiler during a compile step.
//!
//! The incremental engine never interprets diagnostics; it buffers them per
//! source and attaches them to the produced analysis, separated into those
//! already reported to the user and those held back.

#![warn(missing_docs)]

pub mod problem;
pub mod severity;

pub use problem::{Position, Problem};
pub use severity::Severity;
