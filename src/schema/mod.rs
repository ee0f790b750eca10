//! Typed parameter descriptors and the schema registry.
pub mod error;
pub mod registry;
pub mod types;

// Re-export key types for convenient access
pub use error::SchemaError;
pub use registry::{SchemaRegistry, SchemaSnapshot, SnapshotEntry};
pub use types::{
    GateMode, ParamId, ParamKind, ParamValue, ParameterDescriptor, RecomputeWhen, RuleId,
};
