use crate::codegen::Config;
use crate::display::{listing, trace};
use crate::graph::Declarations;
use crate::pipeline::{Compilation, Compiler};
use crate::store::{Quantity, Scope};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

fn parse_config(config_json: Option<&str>) -> PyResult<Config> {
    match config_json {
        Some(json) => Config::from_json(json).map_err(|e| PyValueError::new_err(format!("Invalid configuration: {}", e))),
        None => Ok(Config::new()),
    }
}

#[pyclass(name = "_Declarations")]
#[derive(Debug, Clone, Default)]
pub struct PyDeclarations {
    inner: Declarations,
}

impl PyDeclarations {
    /// Compiles the whole plan (so the shared scope feeds `scope`) and returns one scope.
    fn compile_one(&self, scope: &str, config_json: Option<&str>) -> PyResult<Compilation> {
        let config = parse_config(config_json)?;
        let scope = Scope::from(scope);
        if self.inner.plan.get(&scope).is_none() {
            return Err(PyValueError::new_err(format!("Scope '{}' has no requests", scope)));
        }
        let decl = &self.inner;
        let mut results = Compiler::new(&decl.catalog, &decl.externals, &config).compile_all(&decl.plan);
        match results.remove(&scope) {
            Some(Ok(compilation)) => Ok(compilation),
            Some(Err(e)) => Err(PyValueError::new_err(e.to_string())),
            None => Err(PyRuntimeError::new_err(format!("Scope '{}' was not compiled", scope))),
        }
    }
}

#[pymethods]
impl PyDeclarations {
    #[new]
    pub fn new(document: &str) -> PyResult<Self> {
        Declarations::from_json(document)
            .map(|inner| Self { inner })
            .map_err(|e| PyValueError::new_err(e.to_string()))
    }

    #[staticmethod]
    pub fn from_path(path: &str) -> PyResult<Self> {
        Declarations::from_path(path)
            .map(|inner| Self { inner })
            .map_err(|e| PyValueError::new_err(e.to_string()))
    }

    pub fn scopes(&self) -> Vec<String> {
        self.inner.plan.scopes().map(|s| s.to_string()).collect()
    }

    pub fn node_count(&self) -> usize { self.inner.catalog.len() }

    /// The substituted call strings of `scope`, in schedule order.
    #[pyo3(signature = (scope, config_json=None))]
    pub fn compile(&self, scope: &str, config_json: Option<&str>) -> PyResult<Vec<String>> {
        let compilation = self.compile_one(scope, config_json)?;
        Ok(compilation.calls.into_iter().map(|c| c.call).collect())
    }

    #[pyo3(signature = (scope, config_json=None))]
    pub fn compile_json(&self, scope: &str, config_json: Option<&str>) -> PyResult<String> {
        self.compile_one(scope, config_json)?
            .to_json()
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))
    }

    #[pyo3(signature = (scope, config_json=None))]
    pub fn listing(&self, scope: &str, config_json: Option<&str>) -> PyResult<String> {
        Ok(listing::format_listing(&self.compile_one(scope, config_json)?))
    }

    #[pyo3(signature = (scope, quantity, config_json=None))]
    pub fn trace(&self, scope: &str, quantity: &str, config_json: Option<&str>) -> PyResult<String> {
        let compilation = self.compile_one(scope, config_json)?;
        Ok(trace::format_trace(&compilation, &Quantity::from(quantity)))
    }
}
