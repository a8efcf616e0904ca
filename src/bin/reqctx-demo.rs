//! reqctx demo
//!
//! Runs a burst of simulated requests on one runtime and checks that every
//! handler stage only ever saw its own request context.

use clap::Parser;
use reqctx::simulation::{self, SimulationConfig};
use reqctx::{ContextManager, LogFormat, TracingConfig};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "reqctx-demo")]
#[command(about = "Simulate interleaved requests and verify context isolation", long_about = None)]
#[command(version)]
struct Cli {
    /// Number of concurrent simulated requests
    #[arg(short, long, env = "REQCTX_DEMO_REQUESTS", default_value_t = 8)]
    requests: usize,

    /// Base delay of each handler's timer step, in milliseconds
    #[arg(short, long, env = "REQCTX_DEMO_DELAY_MS", default_value_t = 5)]
    delay_ms: u64,

    /// Log output format (pretty, compact, json)
    #[arg(long, env = "REQCTX_LOG_FORMAT", default_value = "compact")]
    log_format: LogFormat,

    /// Context fields every handler must have set, by wire name
    #[arg(
        long,
        env = "REQCTX_DEMO_REQUIRE",
        value_delimiter = ',',
        default_value = "reqId,traceId"
    )]
    require: Vec<String>,

    /// Print the full report as JSON on stdout
    #[arg(long)]
    report: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    reqctx::init_tracing_with(&TracingConfig::default().with_format(cli.log_format));

    let config = SimulationConfig {
        requests: cli.requests,
        step_delay: Duration::from_millis(cli.delay_ms),
        ..SimulationConfig::default()
    }
    .require_keys(cli.require.iter().map(String::as_str))?;
    tracing::info!(requests = config.requests, delay_ms = cli.delay_ms, "starting simulation");

    let manager = ContextManager::new();
    let report = simulation::simulate(&manager, &config).await?;

    if cli.report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    if !report.is_clean() {
        for request in &report.requests {
            for leak in request.leaks() {
                tracing::error!(
                    expected = %request.expected_req_id,
                    observed = ?leak.req_id,
                    stage = leak.stage,
                    "context leaked between requests"
                );
            }
        }
        anyhow::bail!("{} stage(s) observed a foreign request context", report.leak_count());
    }

    tracing::info!("every stage observed its own request context");
    Ok(())
}
