//! The persisted cfgspc text representation: parser and writer.
pub mod error;
pub mod parser;
pub mod writer;

pub use error::ParseError;
pub use parser::parse_schema;
pub use writer::to_cfg_string;
