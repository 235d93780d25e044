use thiserror::Error;

/// Validation errors for primitive values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// When a value does not match the required pattern.
    #[error("{field} ('{value}') is not allowed")]
    PatternMismatch {
        /// Field name that failed validation.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// When a byte string has the wrong length.
    #[error("{field} must be {expected} bytes, got {actual}")]
    BadLength {
        /// Field name that failed validation.
        field: &'static str,
        /// Required length.
        expected: usize,
        /// Provided length.
        actual: usize,
    },
}
