//! Python bindings
//!
//! Exposes the driver to a Python web server. Events reach Python as dicts
//! through a callback, one call per `sim_update` / `sim_done` / `sim_error`.

pub mod driver;
pub mod types;
