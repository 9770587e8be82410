//! Error module orchestrator.
//!
//! Registry, runtime, and script-facing code all return [`Result`] so the
//! not-found and range families surface to the immediate caller.

mod types;

pub use types::{PropMonitorError, Result};
