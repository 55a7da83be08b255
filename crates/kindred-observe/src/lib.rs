//! Observability for Kindred: structured logging with an optional
//! OpenTelemetry bridge.

pub mod tracing_setup;

pub use tracing_setup::{LogFormat, TracingOptions, init_tracing, shutdown_tracing};
