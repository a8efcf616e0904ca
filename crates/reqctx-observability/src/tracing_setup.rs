//! Standard tracing subscriber setup for binaries embedding request contexts.

use std::fmt;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Output format of the fmt subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}' (expected pretty, compact or json)")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Compact => "compact",
            LogFormat::Json => "json",
        })
    }
}

#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub format: LogFormat,
    /// Directives applied on top of `RUST_LOG`.
    pub directives: Vec<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            directives: vec!["reqctx=info".to_string()],
        }
    }
}

impl TracingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn env_filter(&self) -> EnvFilter {
        self.directives
            .iter()
            .fold(EnvFilter::from_default_env(), |filter, directive| {
                filter.add_directive(directive.parse().unwrap_or_default())
            })
    }
}

/// Initialize a tracing subscriber with env-based filtering.
///
/// Default directives:
/// - `reqctx=info`
pub fn init_tracing() {
    init_tracing_with(&TracingConfig::default());
}

pub fn init_tracing_with(config: &TracingConfig) {
    let filter = config.env_filter();
    match config.format {
        LogFormat::Pretty => tracing_subscriber::fmt().pretty().with_env_filter(filter).init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_current_span(true)
            .with_env_filter(filter)
            .init(),
    }
}
