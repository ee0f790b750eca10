//! Python-facing wrappers, compiled only with the extension-module feature.
pub mod python;
