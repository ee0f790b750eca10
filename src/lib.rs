// FFI Facade: The main entry point for Python.
// With the extension-module feature, this file uses `pyo3` to define the
// `_core` Python module and expose the schema registry as a Python object.

pub mod cfg;
pub mod matrix;
pub mod rules;
pub mod schema;

#[cfg(feature = "extension-module")]
pub mod bindings;

#[cfg(feature = "extension-module")]
use pyo3::prelude::*;

/// A simple function to confirm the Rust core is callable from Python.
#[cfg(feature = "extension-module")]
#[pyfunction]
fn rust_core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// This function defines the `tealpars._core` Python module.
/// The name `_core` is chosen to indicate it's an internal, compiled component.
#[cfg(feature = "extension-module")]
#[pymodule]
fn _core(_py: Python, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(rust_core_version, m)?)?;
    m.add_class::<bindings::python::PyParameterSchema>()?;
    Ok(())
}
