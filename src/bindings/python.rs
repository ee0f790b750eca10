use crate::cfg;
use crate::schema::SchemaRegistry;
use pyo3::prelude::*;
use pyo3::exceptions::PyValueError;

fn py_err(e: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// Python-facing wrapper over [`SchemaRegistry`].
///
/// Values cross the boundary as text; each parameter's declared kind decides
/// how the text is interpreted, exactly as when loading a cfgspc file.
#[pyclass(name = "_ParameterSchema")]
#[derive(Debug, Clone, Default)]
pub struct PyParameterSchema {
    inner: SchemaRegistry,
}

#[pymethods]
impl PyParameterSchema {
    #[new]
    pub fn new() -> Self { Self::default() }

    /// Loads a schema from cfgspc text. Any malformed declaration fails the
    /// whole load.
    #[staticmethod]
    pub fn from_cfg(text: &str) -> PyResult<Self> {
        let inner = cfg::parse_schema(text).map_err(py_err)?;
        Ok(Self { inner })
    }

    pub fn set_value(&mut self, name: &str, value: &str) -> PyResult<()> {
        let kind = self.inner.descriptor(name).map_err(py_err)?.kind.clone();
        let parsed = kind.parse_value(value).map_err(py_err)?;
        self.inner.set_value(name, parsed).map_err(py_err)
    }

    pub fn get_value(&self, name: &str) -> PyResult<String> {
        Ok(self.inner.value(name).map_err(py_err)?.cfg_text())
    }

    pub fn is_active(&self, name: &str) -> PyResult<bool> {
        self.inner.is_active(name).map_err(py_err)
    }

    pub fn is_required(&self, name: &str) -> PyResult<bool> {
        self.inner.is_required(name).map_err(py_err)
    }

    /// All parameters as `(name, value, active)` tuples in declaration order.
    pub fn snapshot(&self) -> Vec<(String, String, bool)> {
        self.inner
            .snapshot()
            .iter()
            .map(|e| (e.name.clone(), e.value.cfg_text(), e.active))
            .collect()
    }

    pub fn to_cfg(&self) -> String {
        cfg::to_cfg_string(&self.inner)
    }

    pub fn __len__(&self) -> usize {
        self.inner.len()
    }
}
