//! Logging support for code running inside a request context.

pub mod spans;
pub mod tracing_setup;

pub use tracing_setup::{LogFormat, TracingConfig, init_tracing, init_tracing_with};
