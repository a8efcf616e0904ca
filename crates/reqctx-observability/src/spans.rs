//! Span helpers that stamp request identifiers on everything logged inside.
//!
//! All span names use the `reqctx.` namespace prefix for low cardinality.

use reqctx_core::{Context, ContextManager};
use tracing::Span;
use tracing::field::{self, Empty};

/// Create the root span for one unit of work.
///
/// Unset identifiers stay empty and can be filled in later with
/// [`record_context`].
#[inline]
pub fn request_span(context: &Context) -> Span {
    let span = tracing::info_span!("reqctx.request", req_id = Empty, trace_id = Empty);
    record_context(&span, context);
    span
}

/// [`request_span`] for whatever `manager` has bound right now.
pub fn current_request_span(manager: &ContextManager) -> Span {
    request_span(&manager.get().unwrap_or_default())
}

/// Create a span for a unit of work fanned out from a request.
///
/// Parent: request span
#[inline]
pub fn child_task(name: &'static str) -> Span {
    tracing::debug_span!("reqctx.task", task = name)
}

/// Copy the identifiers that are set on `context` onto `span`.
pub fn record_context(span: &Span, context: &Context) {
    if let Some(req_id) = &context.req_id {
        span.record("req_id", field::display(req_id));
    }
    if let Some(trace_id) = &context.trace_id {
        span.record("trace_id", field::display(trace_id));
    }
}
