//! Defines the error types for cfgspc loading.
use crate::schema::SchemaError;
use thiserror::Error;

/// Any parse failure aborts the whole load; a partially built schema is
/// never handed to the caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("line {line}: {msg}")]
    Syntax { line: usize, msg: String },
    #[error("line {line}: unknown type constructor '{ctor}'")]
    UnknownConstructor { line: usize, ctor: String },
    #[error("line {line}: unknown lifecycle context '{context}' in when clause")]
    UnknownContext { line: usize, context: String },
    #[error("line {line}: unsupported rule code '{code}'")]
    BadCode { line: usize, code: String },
    #[error(transparent)]
    Schema(#[from] SchemaError),
}
