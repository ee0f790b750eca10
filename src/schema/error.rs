//! Defines the error types for schema definition and mutation.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("duplicate parameter '{0}'")]
    DuplicateParameter(String),
    #[error("duplicate rule '{0}'")]
    DuplicateRule(String),
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),
    #[error("unknown rule '{0}'")]
    UnknownRule(String),
    #[error("invalid default for '{name}': {msg}")]
    InvalidDefault { name: String, msg: String },
    #[error("type mismatch for '{name}': expected {expected}, got {got}")]
    TypeMismatch { name: String, expected: &'static str, got: &'static str },
    #[error("value '{value}' not allowed for '{name}' (choices: {allowed})")]
    ValueNotAllowed { name: String, value: String, allowed: String },
}
