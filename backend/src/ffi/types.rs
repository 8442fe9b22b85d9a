//! Type conversion utilities for FFI boundary
//!
//! Converts between Rust types and PyO3-compatible types (PyDict, PyList, etc.)

use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};
use serde::Serialize;
use serde_json::Value;

use crate::models::{Event, EventSink};
use crate::orchestrator::{RunConfig, SimulationError};

// ========================================================================
// PyDict Extraction Helpers
// ========================================================================

/// Extract an optional field from a Python dict.
///
/// Returns `None` when the key is missing or maps to `None`.
fn extract_optional<'py, T>(dict: &Bound<'py, PyDict>, key: &str) -> PyResult<Option<T>>
where
    T: FromPyObject<'py>,
{
    match dict.get_item(key)? {
        Some(value) if !value.is_none() => Ok(Some(value.extract()?)),
        _ => Ok(None),
    }
}

/// Extract a field with a default value if missing.
fn extract_with_default<'py, T>(dict: &Bound<'py, PyDict>, key: &str, default: T) -> PyResult<T>
where
    T: FromPyObject<'py>,
{
    Ok(extract_optional(dict, key)?.unwrap_or(default))
}

// ========================================================================
// Configuration Parsers
// ========================================================================

/// Convert a start command dict to RunConfig
///
/// Keys: `duration`, `rate`, `mal_frac`, `seed` (all optional; missing keys
/// take the defaults of [`RunConfig`]). Range checks happen in the driver so
/// that rejections are reported through the event callback as well.
pub fn parse_run_config(py_config: &Bound<'_, PyDict>) -> PyResult<RunConfig> {
    let defaults = RunConfig::default();
    Ok(RunConfig {
        duration: extract_with_default(py_config, "duration", defaults.duration)?,
        rate: extract_with_default(py_config, "rate", defaults.rate)?,
        mal_frac: extract_with_default(py_config, "mal_frac", defaults.mal_frac)?,
        seed: extract_optional(py_config, "seed")?,
    })
}

// ========================================================================
// Result Converters
// ========================================================================

/// Convert a JSON value into the equivalent Python object
fn json_to_py(py: Python<'_>, value: &Value) -> PyResult<PyObject> {
    Ok(match value {
        Value::Null => py.None(),
        Value::Bool(b) => b.to_object(py),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                u.to_object(py)
            } else if let Some(i) = n.as_i64() {
                i.to_object(py)
            } else {
                n.as_f64().unwrap_or(f64::NAN).to_object(py)
            }
        }
        Value::String(s) => s.to_object(py),
        Value::Array(items) => {
            let converted = items
                .iter()
                .map(|item| json_to_py(py, item))
                .collect::<PyResult<Vec<_>>>()?;
            PyList::new_bound(py, converted).into_any().unbind()
        }
        Value::Object(map) => {
            let dict = PyDict::new_bound(py);
            for (k, v) in map {
                dict.set_item(k, json_to_py(py, v)?)?;
            }
            dict.into_any().unbind()
        }
    })
}

/// Convert any serializable value (event, summary) to the Python object of
/// its JSON form
pub fn to_py<T: Serialize>(py: Python<'_>, value: &T) -> PyResult<PyObject> {
    let value = serde_json::to_value(value)
        .map_err(|e| PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("Serialization failed: {}", e)))?;
    json_to_py(py, &value)
}

/// Map engine errors onto Python exceptions
pub fn simulation_error_to_py(error: SimulationError) -> PyErr {
    match error {
        SimulationError::InvalidConfig(_) => PyErr::new::<pyo3::exceptions::PyValueError, _>(error.to_string()),
        _ => PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(error.to_string()),
    }
}

// ========================================================================
// Event Sink
// ========================================================================

/// Forwards every event to a Python callable as a dict
pub struct PyCallbackSink {
    callback: PyObject,
}

impl PyCallbackSink {
    pub fn new(callback: PyObject) -> Self {
        Self { callback }
    }
}

impl EventSink for PyCallbackSink {
    fn emit(&mut self, event: Event) {
        Python::with_gil(|py| {
            let delivered = to_py(py, &event).and_then(|payload| self.callback.call1(py, (payload,)));
            if let Err(e) = delivered {
                tracing::warn!(event = event.event_type(), error = %e, "python event callback failed");
                e.print(py);
            }
        });
    }
}
