//! Error types for class-file management.

use std::path::PathBuf;

/// Errors raised while moving, deleting, or restoring class artifacts.
#[derive(Debug, thiserror::Error)]
pub enum ClassfileError {
    /// An I/O error occurred on a managed artifact.
    #[error("class-file I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The transactional staging ledger could not be written or parsed.
    #[error("staging ledger error at {path}: {reason}")]
    Ledger {
        /// The ledger file path.
        path: PathBuf,
        /// Description of the problem.
        reason: String,
    },
}

impl ClassfileError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_display_names_path() {
        let err = ClassfileError::io(
            "out/A.class",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("out/A.class"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn ledger_display() {
        let err = ClassfileError::Ledger {
            path: PathBuf::from(".staging/ledger.json"),
            reason: "truncated".to_string(),
        };
        assert!(err.to_string().contains("truncated"));
    }
}
