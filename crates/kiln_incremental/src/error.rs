//! Error types for the incremental engine.

use kiln_common::InternalError;

/// Errors raised while driving an incremental compilation run.
#[derive(Debug, thiserror::Error)]
pub enum IncError {
    /// The external compile function reported failure. The class-file
    /// manager rolls back and the previous analysis is kept.
    #[error("compilation failed: {message}")]
    CompileFailed {
        /// The compiler's failure message.
        message: String,
    },

    /// The run was cancelled cooperatively. Recognized by the driver and
    /// turned into a no-change result.
    #[error("compilation cancelled")]
    Cancelled,

    /// Invalidation did not reach a fixed point within the cycle ceiling.
    #[error("invalidation did not settle after {cycles} cycles")]
    CycleLimitExceeded {
        /// The configured ceiling that was hit.
        cycles: u32,
    },

    /// A defect in the compiler integration, such as registering a source
    /// twice in one cycle under strict mode or taking the callback result
    /// more than once. The message names the offending source or callback.
    #[error(transparent)]
    Internal(#[from] InternalError),

    /// A class-file manager operation failed.
    #[error(transparent)]
    Classfile(#[from] kiln_classfile::ClassfileError),

    /// An analysis invariant was violated while merging a cycle's delta.
    #[error(transparent)]
    Analysis(#[from] kiln_analysis::AnalysisError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_error_names_the_source() {
        let err: IncError = InternalError::new(
            "source registered twice in one compile cycle: src/A.src",
        )
        .into();
        assert!(matches!(err, IncError::Internal(_)));
        assert!(err.to_string().contains("src/A.src"));
    }

    #[test]
    fn cycle_limit_names_the_ceiling() {
        let err = IncError::CycleLimitExceeded { cycles: 16 };
        assert!(err.to_string().contains("16"));
    }

    #[test]
    fn analysis_error_converts() {
        let err: IncError = kiln_analysis::AnalysisError::InconsistentAnalysis {
            binary_name: "pkg.A".to_string(),
        }
        .into();
        assert!(err.to_string().contains("pkg.A"));
    }
}
