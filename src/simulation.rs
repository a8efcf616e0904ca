//! Simulated server workload exercising context propagation end to end.
//!
//! Every simulated request gets its own scope and fans out into nested calls,
//! timers, spawned tasks and blocking work. Each stage records which request
//! it believes it is serving so cross-request leaks show up in the report.

use reqctx_core::{Context, ContextKey, ContextManager, RequestId, TraceId};
use reqctx_observability::spans;
use serde::Serialize;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{Instrument, Span};

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub requests: usize,
    pub step_delay: Duration,
    /// Fields every handler must find set before it returns.
    pub required_keys: Vec<ContextKey>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            requests: 8,
            step_delay: Duration::from_millis(5),
            required_keys: ContextKey::ALL.to_vec(),
        }
    }
}

impl SimulationConfig {
    /// Replace the required fields with keys given by their wire names
    /// (`reqId`, `traceId`).
    pub fn require_keys<'a>(
        mut self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> reqctx_core::Result<Self> {
        self.required_keys = names
            .into_iter()
            .map(|name| name.trim().parse::<ContextKey>())
            .collect::<reqctx_core::Result<_>>()?;
        Ok(self)
    }
}

/// What one stage of a handler saw in the active context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Observation {
    pub stage: &'static str,
    pub req_id: Option<String>,
    pub trace_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestReport {
    pub index: usize,
    pub expected_req_id: String,
    pub req_id: Option<RequestId>,
    pub trace_id: Option<TraceId>,
    pub observations: Vec<Observation>,
}

impl RequestReport {
    pub fn leaks(&self) -> impl Iterator<Item = &Observation> {
        self.observations
            .iter()
            .filter(|obs| obs.req_id.as_deref() != Some(self.expected_req_id.as_str()))
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulationReport {
    pub requests: Vec<RequestReport>,
}

impl SimulationReport {
    pub fn leak_count(&self) -> usize {
        self.requests.iter().map(|r| r.leaks().count()).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.leak_count() == 0
    }
}

/// Run `config.requests` handlers concurrently, one scope each.
pub async fn simulate(
    manager: &ContextManager,
    config: &SimulationConfig,
) -> anyhow::Result<SimulationReport> {
    let mut handlers = JoinSet::new();
    for index in 0..config.requests {
        let ctx = Context::new().with_req_id(request_id(index));
        let span = spans::request_span(&ctx);
        let handler = handle_request(
            manager.clone(),
            index,
            config.step_delay,
            config.required_keys.clone(),
        );
        handlers.spawn(manager.scope(ctx, handler).instrument(span));
    }

    let mut report = SimulationReport::default();
    while let Some(joined) = handlers.join_next().await {
        report.requests.push(joined??);
    }
    report.requests.sort_by_key(|r| r.index);

    tracing::info!(
        requests = report.requests.len(),
        leaks = report.leak_count(),
        "simulation finished"
    );
    Ok(report)
}

fn request_id(index: usize) -> String {
    format!("req-{index}")
}

fn observe(manager: &ContextManager, stage: &'static str) -> Observation {
    Observation {
        stage,
        req_id: manager.get_by_key(ContextKey::ReqId),
        trace_id: manager.get_by_key(ContextKey::TraceId),
    }
}

fn authorize(manager: &ContextManager) -> Observation {
    load_principal(manager)
}

fn load_principal(manager: &ContextManager) -> Observation {
    tracing::debug!("loading principal");
    observe(manager, "nested_call")
}

async fn handle_request(
    manager: ContextManager,
    index: usize,
    step_delay: Duration,
    required_keys: Vec<ContextKey>,
) -> anyhow::Result<RequestReport> {
    tracing::info!("request started");
    let mut observations = vec![observe(&manager, "entry"), authorize(&manager)];

    // Stagger requests so their continuations interleave.
    let factor = u32::try_from(index % 3 + 1).unwrap_or(1);
    tokio::time::sleep(step_delay * factor).await;
    observations.push(observe(&manager, "after_timer"));

    // The trace id only becomes known part-way through handling.
    manager.set(ContextKey::TraceId, format!("trace-{index}"))?;
    if let Some(ctx) = manager.get() {
        spans::record_context(&Span::current(), &ctx);
    }

    let m = manager.clone();
    let lookup = manager.spawn(
        async move {
            tokio::task::yield_now().await;
            observe(&m, "spawned_lookup")
        }
        .instrument(spans::child_task("lookup")),
    );
    let m = manager.clone();
    let audit = manager.spawn_blocking(move || observe(&m, "blocking_audit"));

    observations.push(lookup.await?);
    observations.push(audit.await?);
    tokio::task::yield_now().await;
    observations.push(observe(&manager, "exit"));
    for key in required_keys {
        manager.get_by_key_or_fail(key)?;
    }

    tracing::info!(stages = observations.len(), "request handled");
    Ok(RequestReport {
        index,
        expected_req_id: request_id(index),
        req_id: manager.req_id(),
        trace_id: manager.trace_id(),
        observations,
    })
}
