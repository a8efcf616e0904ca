//! Request-scoped context propagation for tokio services.
//!
//! This crate ties together the context manager, its logging helpers and a
//! simulated workload used to exercise both.

pub mod simulation;

pub use reqctx_core::{
    Context, ContextError, ContextKey, ContextManager, RequestId, Result, Scope, TraceId,
};
pub use reqctx_observability::{LogFormat, TracingConfig, init_tracing, init_tracing_with, spans};
