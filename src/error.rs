//! Error types for the Losp interpreter

use thiserror::Error;

/// Losp interpreter errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // Parse errors
    /// Syntax error encountered during tokenizing or tree building
    ///
    /// **Triggered by:** a disallowed token pair, an unterminated string,
    /// or unbalanced brackets at end of input
    #[error("Syntax error at line {line}, column {col}: {message}")]
    SyntaxError {
        /// Line number where the error occurred
        line: usize,
        /// Column number where the error occurred
        col: usize,
        /// Error description, including a short excerpt of nearby source
        message: String,
    },

    /// Unexpected end of input during parsing
    #[error("Unexpected end of input: {0}")]
    UnexpectedEnd(String),

    /// A special operator's Prepare hook rejected the node
    #[error("{operator}: {message}")]
    PrepareError {
        /// Special operator id
        operator: String,
        /// Rejection message from the hook
        message: String,
    },

    // Runtime errors
    /// Reference to an unbound identifier
    #[error("no variable named {name} was found")]
    UndefinedVariable {
        /// Identifier name
        name: String,
    },

    /// Reference to an unregistered operator
    #[error("no operator named {name} is registered")]
    UndefinedOperator {
        /// Operator name
        name: String,
    },

    /// Wrong number of arguments, exact variant
    #[error("exactly {expected} arguments are required, got {got}")]
    ArityExact {
        /// Required argument count
        expected: usize,
        /// Actual argument count
        got: usize,
    },

    /// Wrong number of arguments, at-least variant
    #[error("{}", at_least_text(.expected))]
    ArityAtLeast {
        /// Minimum argument count
        expected: usize,
    },

    /// Argument at a given index had the wrong type (or was missing)
    #[error("argument at index {index} expected type {expected}; got {got}")]
    TypeMismatch {
        /// Zero-based argument index
        index: usize,
        /// Expected type name
        expected: String,
        /// Actual type name, or "missing"
        got: String,
    },

    /// Chained property lookup walked through a non-object
    #[error("intermediate value not a script object")]
    NotScriptObject,

    /// Property lookup failed on a script object
    #[error("property not found: {key}")]
    PropertyNotFound {
        /// Missing key
        key: String,
    },

    /// A special operator handler was invoked on a non-special node
    #[error("{operator} must be invoked through its special-operator form")]
    SpecialOperatorMisuse {
        /// Operator id
        operator: String,
    },

    /// An async proxy completed with another async result
    #[error("async processes cannot emit another async result")]
    AsyncContract,

    /// Operator registration violated a naming rule
    #[error("cannot register operator {name}: {reason}")]
    Registration {
        /// Offending name
        name: String,
        /// Rule that was violated
        reason: String,
    },

    /// Unexpected node or result kind inside the evaluator
    #[error("internal error: {0}")]
    Internal(String),
}

fn at_least_text(expected: &usize) -> String {
    if *expected == 1 {
        "at least one argument is required".to_string()
    } else {
        format!("at least {} arguments are required", expected)
    }
}

impl Error {
    /// Create an internal error with a message
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// Create a type mismatch for a missing argument
    pub fn missing_argument(index: usize, expected: impl Into<String>) -> Self {
        Error::TypeMismatch {
            index,
            expected: expected.into(),
            got: "missing".to_string(),
        }
    }
}

/// Result type for Losp operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_messages() {
        let e = Error::ArityExact {
            expected: 2,
            got: 3,
        };
        assert_eq!(e.to_string(), "exactly 2 arguments are required, got 3");

        let e = Error::ArityAtLeast { expected: 1 };
        assert_eq!(e.to_string(), "at least one argument is required");

        let e = Error::ArityAtLeast { expected: 2 };
        assert_eq!(e.to_string(), "at least 2 arguments are required");
    }

    #[test]
    fn test_name_error_message() {
        let e = Error::UndefinedVariable {
            name: "x".to_string(),
        };
        assert_eq!(e.to_string(), "no variable named x was found");
    }

    #[test]
    fn test_async_contract_message() {
        assert!(Error::AsyncContract
            .to_string()
            .contains("async processes cannot emit another async result"));
    }
}
