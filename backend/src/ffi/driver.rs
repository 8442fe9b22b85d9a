//! PyO3 wrapper for Driver
//!
//! # Example (from Python)
//!
//! ```python
//! from atm_filter_sim import Driver
//!
//! def on_event(msg):
//!     print(msg["type"], msg.get("total"))
//!
//! driver = Driver()
//! driver.start({"duration": 5.0, "rate": 200.0, "mal_frac": 0.12, "seed": 42}, on_event)
//! summary = driver.wait()
//! print(summary["false_positive_rate"], summary["false_negative_rate"])
//! ```

use pyo3::prelude::*;
use pyo3::types::PyDict;

use super::types::{parse_run_config, simulation_error_to_py, to_py, PyCallbackSink};
use crate::orchestrator::{CancelToken, Driver, RunHandle};

/// Python wrapper for the Rust driver
#[pyclass(name = "Driver")]
pub struct PyDriver {
    inner: Driver,
    active: Option<RunHandle>,
}

#[pymethods]
impl PyDriver {
    #[new]
    fn new() -> Self {
        PyDriver {
            inner: Driver::default(),
            active: None,
        }
    }

    /// Start a run on a background thread
    ///
    /// Returns the run id. Raises ValueError for an invalid configuration and
    /// RuntimeError if a run is already active; `callback` receives the
    /// matching `sim_error` dict in both cases.
    fn start(&mut self, config: &Bound<'_, PyDict>, callback: PyObject) -> PyResult<String> {
        let run_config = parse_run_config(config)?;
        let handle = self
            .inner
            .spawn(run_config, PyCallbackSink::new(callback))
            .map_err(simulation_error_to_py)?;
        let run_id = handle.run_id().to_string();
        self.active = Some(handle);
        Ok(run_id)
    }

    /// Run on the calling thread, releasing the GIL while cells are processed
    fn run(&self, py: Python<'_>, config: &Bound<'_, PyDict>, callback: PyObject) -> PyResult<PyObject> {
        let run_config = parse_run_config(config)?;
        let mut sink = PyCallbackSink::new(callback);
        let token = CancelToken::new();
        let driver = &self.inner;
        let summary = py
            .allow_threads(|| driver.run(run_config, &mut sink, &token))
            .map_err(simulation_error_to_py)?;
        to_py(py, &summary)
    }

    /// Request cancellation of the background run, if any
    fn cancel(&self) {
        if let Some(handle) = &self.active {
            handle.cancel();
        }
    }

    /// Block until the background run ends; returns its summary dict
    fn wait(&mut self, py: Python<'_>) -> PyResult<Option<PyObject>> {
        let handle = match self.active.take() {
            Some(handle) => handle,
            None => return Ok(None),
        };
        let summary = py.allow_threads(|| handle.join()).map_err(simulation_error_to_py)?;
        to_py(py, &summary).map(Some)
    }

    fn is_running(&self) -> bool {
        self.inner.is_running()
    }
}
