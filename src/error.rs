//! Error types for arclite
//!
//! This module defines every error the binding layer can surface.

use thiserror::Error;

/// The main error type for arclite
#[derive(Error, Debug)]
pub enum Error {
    // ========== Statement Errors ==========
    #[error("Syntax error: {message}")]
    Syntax { message: String },

    #[error("Arity error: expected {expected} {what}, found {found}")]
    Arity {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    // ========== Type Errors ==========
    #[error("Type error: cannot convert {from} to {to}")]
    TypeMismatch { from: &'static str, to: &'static str },

    #[error("Type error: NULL cannot be converted to non-optional {to}")]
    NullConversion { to: &'static str },

    #[error("Type error: value of {0} bytes is too large for the engine")]
    ValueTooLarge(usize),

    #[error("Type error: column index {index} out of range for {count} column(s)")]
    InvalidColumnIndex { index: usize, count: usize },

    // ========== Execution Errors ==========
    #[error("Runtime error ({code}): {message}")]
    Runtime { code: i32, message: String },

    #[error("Function error in '{function}': {message}")]
    FunctionEvaluation { function: String, message: String },

    // ========== Connection Errors ==========
    #[error("Connection error: cannot open '{locator}': {message}")]
    Open { locator: String, message: String },

    #[error("Connection error: cannot register function '{name}': {message}")]
    Registration { name: String, message: String },

    #[error("Connection error: string contains an interior NUL byte")]
    NulByte(#[from] std::ffi::NulError),
}

impl Error {
    pub(crate) fn type_mismatch<T: ?Sized>(from: &'static str) -> Self {
        Error::TypeMismatch {
            from,
            to: std::any::type_name::<T>(),
        }
    }

    pub(crate) fn null_conversion<T: ?Sized>() -> Self {
        Error::NullConversion {
            to: std::any::type_name::<T>(),
        }
    }
}

/// Result type alias for arclite operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Arity {
            what: "parameter(s)",
            expected: 3,
            found: 2,
        };
        assert_eq!(
            err.to_string(),
            "Arity error: expected 3 parameter(s), found 2"
        );

        let err = Error::type_mismatch::<i64>("TEXT");
        assert_eq!(err.to_string(), "Type error: cannot convert TEXT to i64");

        let err = Error::null_conversion::<String>();
        assert!(err.to_string().contains("alloc::string::String"));
    }
}
