//! Script Error Handling
//!
//! Every operator reports failures through [`ScriptError`]. Variants carry the
//! name of the operator that raised them so the interpreter can halt the
//! script with a readable cause chain.
//!
//! # Taxonomy
//!
//! | Kind | Variants |
//! |------|----------|
//! | Arity | `Arity`, `Underflow` |
//! | Type | `Type` |
//! | Value | `Value` |
//! | Timeout | `Timeout` |
//! | Execution | `Execution`, `Panic`, `Cancelled` |
//! | Shutdown | `Shutdown` |
//! | BoundExceeded | `BoundExceeded` |
//! | Dispatch | `UnknownOperator` |
//! | Environment | `Config`, `Io` |

use std::error::Error as StdError;
use thiserror::Error;

/// Result type used by every operator
pub type Result<T> = std::result::Result<T, ScriptError>;

/// Errors raised while executing operators and macros
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("{name} expects {expected} argument(s) on the stack, found {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("stack underflow")]
    Underflow,

    #[error("{name} {message}")]
    Type { name: String, message: String },

    #[error("{name}: {message}")]
    Value { name: String, message: String },

    #[error("{name} reached the execution time limit ({limit_ms} ms)")]
    Timeout { name: String, limit_ms: u64 },

    #[error("{name} encountered an error while executing")]
    Execution {
        name: String,
        #[source]
        source: Box<ScriptError>,
    },

    #[error("{name} could not be properly shut down")]
    Shutdown {
        name: String,
        #[source]
        source: Option<Box<ScriptError>>,
    },

    /// Raised by the output guard, which knows no operator; the renderer
    /// fills in `name` on the way out (see [`ScriptError::raised_by`]).
    #[error(
        "{}cannot write, maximum number of characters written: {limit}",
        operator_prefix(.name)
    )]
    BoundExceeded { name: Option<String>, limit: usize },

    #[error("execution cancelled")]
    Cancelled,

    #[error("panic: {0}")]
    Panic(String),

    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    #[error("invalid configuration for {key}: {message}")]
    Config { key: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a [`ScriptError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Arity,
    Type,
    Value,
    Timeout,
    Execution,
    Shutdown,
    BoundExceeded,
    Dispatch,
    Environment,
}

impl ScriptError {
    /// Argument present but of the wrong runtime type
    pub fn type_error(name: &str, message: impl Into<String>) -> Self {
        ScriptError::Type {
            name: name.to_string(),
            message: message.into(),
        }
    }

    /// Argument well-typed but semantically invalid
    pub fn value_error(name: &str, message: impl Into<String>) -> Self {
        ScriptError::Value {
            name: name.to_string(),
            message: message.into(),
        }
    }

    /// Output ceiling hit, not yet attributed to an operator
    pub fn bound_exceeded(limit: usize) -> Self {
        ScriptError::BoundExceeded { name: None, limit }
    }

    /// Attribute an anonymous bound violation to `operator`
    ///
    /// Every other error, and a violation already attributed, is returned as is.
    pub fn raised_by(self, operator: &str) -> Self {
        match self {
            ScriptError::BoundExceeded { name: None, limit } => ScriptError::BoundExceeded {
                name: Some(operator.to_string()),
                limit,
            },
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ScriptError::Arity { .. } | ScriptError::Underflow => ErrorKind::Arity,
            ScriptError::Type { .. } => ErrorKind::Type,
            ScriptError::Value { .. } => ErrorKind::Value,
            ScriptError::Timeout { .. } => ErrorKind::Timeout,
            ScriptError::Execution { .. } | ScriptError::Panic(_) | ScriptError::Cancelled => {
                ErrorKind::Execution
            }
            ScriptError::Shutdown { .. } => ErrorKind::Shutdown,
            ScriptError::BoundExceeded { .. } => ErrorKind::BoundExceeded,
            ScriptError::UnknownOperator(_) => ErrorKind::Dispatch,
            ScriptError::Config { .. } | ScriptError::Io(_) => ErrorKind::Environment,
        }
    }

    /// Render this error followed by each of its causes, one per line
    pub fn cause_chain(&self) -> String {
        let mut out = self.to_string();
        let mut current: Option<&(dyn StdError + 'static)> = self.source();
        while let Some(cause) = current {
            out.push_str("\n  caused by: ");
            out.push_str(&cause.to_string());
            current = cause.source();
        }
        out
    }
}

fn operator_prefix(name: &Option<String>) -> String {
    match name {
        Some(name) => format!("{} ", name),
        None => String::new(),
    }
}

/// Format a panic payload into an error message
pub fn format_panic_payload(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(ScriptError::Underflow.kind(), ErrorKind::Arity);
        assert_eq!(
            ScriptError::type_error("B58->", "operates on a STRING.").kind(),
            ErrorKind::Type
        );
        assert_eq!(
            ScriptError::bound_exceeded(3).kind(),
            ErrorKind::BoundExceeded
        );
        assert_eq!(ScriptError::Cancelled.kind(), ErrorKind::Execution);
    }

    #[test]
    fn test_messages_name_the_operator() {
        let err = ScriptError::Timeout {
            name: "TIMEBOX".to_string(),
            limit_ms: 250,
        };
        assert_eq!(
            err.to_string(),
            "TIMEBOX reached the execution time limit (250 ms)"
        );

        let err = ScriptError::Arity {
            name: "GEO.INTERSECTS".to_string(),
            expected: 2,
            found: 0,
        };
        assert!(err.to_string().starts_with("GEO.INTERSECTS expects 2"));
    }

    #[test]
    fn test_cause_chain_keeps_original_error() {
        let err = ScriptError::Execution {
            name: "TIMEBOX".to_string(),
            source: Box::new(ScriptError::value_error("B58->", "Invalid checksum.")),
        };
        let chain = err.cause_chain();
        assert!(chain.contains("TIMEBOX encountered an error while executing"));
        assert!(chain.contains("caused by: B58->: Invalid checksum."));
    }

    #[test]
    fn test_bound_violation_names_the_renderer() {
        let err = ScriptError::bound_exceeded(4);
        assert_eq!(
            err.to_string(),
            "cannot write, maximum number of characters written: 4"
        );

        let err = err.raised_by("SNAPSHOT");
        assert_eq!(
            err.to_string(),
            "SNAPSHOT cannot write, maximum number of characters written: 4"
        );
        // First attribution wins
        let err = err.raised_by("->JSON");
        assert!(err.cause_chain().starts_with("SNAPSHOT cannot write"));

        let err = ScriptError::Underflow.raised_by("SNAPSHOT");
        assert!(matches!(err, ScriptError::Underflow));
    }

    #[test]
    fn test_shutdown_without_cause() {
        let err = ScriptError::Shutdown {
            name: "TIMEBOX".to_string(),
            source: None,
        };
        assert!(err.source().is_none());
        assert_eq!(err.cause_chain(), "TIMEBOX could not be properly shut down");
    }

    #[test]
    fn test_format_panic_payload() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("panic message");
        assert_eq!(format_panic_payload(&payload), "panic message");

        let payload: Box<dyn std::any::Any + Send> = Box::new("owned panic".to_string());
        assert_eq!(format_panic_payload(&payload), "owned panic");

        let payload: Box<dyn std::any::Any + Send> = Box::new(42u32);
        assert_eq!(format_panic_payload(&payload), "unknown panic");
    }
}
