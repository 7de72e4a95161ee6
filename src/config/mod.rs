//! Configuration for display-topology
//!
//! A single JSON settings file controls diagnostics verbosity and the
//! refresh-rate inputs the server does not report.

pub mod settings;

pub use settings::Settings;
