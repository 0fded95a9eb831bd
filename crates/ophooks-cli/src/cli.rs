use clap::{Parser, ValueEnum};

#[derive(Parser)]
#[command(name = "ophooks")]
#[command(about = "Drive the operation hook broker with simulated FHIR operations")]
#[command(version)]
pub struct Cli {
    /// Number of simulated operations (each publishes a pre and a post event)
    #[arg(short = 'n', long, default_value_t = 100)]
    pub operations: usize,

    /// Number of distinct tenants to spread operations across
    #[arg(short, long, default_value_t = 3)]
    pub tenants: usize,

    /// Register the console subscriber (logs every event)
    #[arg(long)]
    pub console: bool,

    /// Enable the metrics aggregator regardless of OPHOOKS_METRICS_ENABLED
    #[arg(long)]
    pub metrics: bool,

    /// Where flushed metrics go
    #[arg(long, value_enum, default_value = "log")]
    pub sink: SinkKind,

    /// Collector URL for the http sink
    #[arg(long, env = "OPHOOKS_METRICS_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Keep running this long so the flush timer can fire
    #[arg(long, default_value_t = 0)]
    pub run_for_ms: u64,

    /// Log level used when RUST_LOG is not set
    #[arg(long, env = "OPHOOKS_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

#[derive(Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum SinkKind {
    /// Log data points through tracing
    #[default]
    Log,
    /// POST requests as JSON to --endpoint
    Http,
}
