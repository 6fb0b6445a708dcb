//! Common result and error types for the Kiln core.

/// The standard result type for fallible internal operations.
pub type KilnResult<T> = Result<T, InternalError>;

/// An internal error indicating a bug in the driver integration, not a
/// problem with user input.
///
/// Compiler diagnostics are data to the engine and flow through the analysis
/// callback; they never surface as `InternalError`.
#[derive(Debug, thiserror::Error)]
#[error("internal incremental-compiler error: {message}")]
pub struct InternalError {
    /// Description of the internal error.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let err = InternalError::new("callback state corrupted");
        assert_eq!(
            format!("{err}"),
            "internal incremental-compiler error: callback state corrupted"
        );
    }

    #[test]
    fn from_string() {
        let err: InternalError = "boom".to_string().into();
        assert_eq!(err.message, "boom");
    }
}
