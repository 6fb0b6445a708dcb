//! A single buffered compiler diagnostic.

use crate::severity::Severity;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The source position a diagnostic points at.
///
/// All fields are optional because compilers emit positionless diagnostics
/// (e.g. global configuration warnings). A problem whose position carries no
/// source path cannot be attached to any source and is dropped by the
/// callback.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// The source file the diagnostic refers to, if known.
    pub source: Option<PathBuf>,
    /// 1-indexed line, if known.
    pub line: Option<u32>,
    /// 1-indexed column, if known.
    pub column: Option<u32>,
}

impl Position {
    /// A position with no source, line, or column.
    pub fn unknown() -> Self {
        Self::default()
    }

    /// A position inside `source` at the given line and column.
    pub fn at(source: impl Into<PathBuf>, line: u32, column: u32) -> Self {
        Self {
            source: Some(source.into()),
            line: Some(line),
            column: Some(column),
        }
    }

    /// A position identifying `source` without a line or column.
    pub fn in_source(source: impl Into<PathBuf>) -> Self {
        Self {
            source: Some(source.into()),
            line: None,
            column: None,
        }
    }
}

/// A compiler diagnostic buffered during one compile cycle.
///
/// `reported` distinguishes problems the compiler already showed the user
/// from those it held back (e.g. suppressed duplicates); both halves are
/// preserved in the analysis so a later tool can re-render them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    /// The compiler-defined category (e.g. `"typer"`, `"parser"`).
    pub category: String,
    /// Where the problem occurred.
    pub position: Position,
    /// The diagnostic message.
    pub message: String,
    /// How severe the problem is.
    pub severity: Severity,
    /// Whether the compiler already reported this problem to the user.
    pub reported: bool,
}

impl Problem {
    /// Creates a new problem.
    pub fn new(
        category: impl Into<String>,
        position: Position,
        message: impl Into<String>,
        severity: Severity,
        reported: bool,
    ) -> Self {
        Self {
            category: category.into(),
            position,
            message: message.into(),
            severity,
            reported,
        }
    }
}
