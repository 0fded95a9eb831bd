//! Simulated host: publishes pre/post events for a spread of operations.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use ophooks_core::{Broker, ConsoleSubscriber, OperationEvent, OperationKind, RequestScope};
use ophooks_metrics::{HttpSink, MetricsAggregator, MetricsConfig, MetricsSink, TracingSink};
use serde_json::json;
use tracing::{debug, info};

use crate::cli::{Cli, SinkKind};
use crate::output::{print_counters, print_flush, print_success, print_warning};

const RESOURCE_TYPES: [&str; 3] = ["Patient", "Observation", "Encounter"];

/// Summary of one simulated run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub published: usize,
    pub rejected: usize,
}

pub async fn run(cli: &Cli) -> Result<()> {
    let mut config = MetricsConfig::from_env().context("invalid metrics configuration")?;
    if cli.metrics {
        config = config.enabled();
    }

    let broker = Broker::new_shared();
    if cli.console {
        ConsoleSubscriber::register(&broker);
    }

    let sink = build_sink(cli)?;
    info!(
        sink = sink.name(),
        enabled = config.enabled,
        "starting metrics aggregator"
    );
    let aggregator = MetricsAggregator::new(&broker, sink, config)?;
    if !aggregator.is_enabled() {
        print_warning(
            "Metrics aggregator is disabled; pass --metrics or set OPHOOKS_METRICS_ENABLED=true",
        );
    }

    let tenants: Vec<String> = (0..cli.tenants.max(1))
        .map(|_| uuid::Uuid::new_v4().to_string())
        .collect();

    let stats = simulate(&broker, &tenants, cli.operations).await;
    print_success(&format!(
        "Published {} event(s), {} rejected",
        stats.published, stats.rejected
    ));

    if cli.run_for_ms > 0 {
        tokio::time::sleep(Duration::from_millis(cli.run_for_ms)).await;
    }

    if aggregator.is_enabled() {
        println!("{}", "Pending counters".cyan());
        print_counters(&aggregator.snapshot());
        print_flush(&aggregator.flush().await);
    }
    aggregator.destroy();

    Ok(())
}

fn build_sink(cli: &Cli) -> Result<Arc<dyn MetricsSink>> {
    match cli.sink {
        SinkKind::Log => Ok(Arc::new(TracingSink::new())),
        SinkKind::Http => {
            let Some(endpoint) = cli.endpoint.as_deref() else {
                bail!("--endpoint is required for the http sink");
            };
            Ok(Arc::new(HttpSink::new(endpoint)))
        }
    }
}

/// Publish `operations` pre/post pairs, cycling through operation kinds,
/// tenants and resource types. The post event is skipped when pre is
/// rejected, the way a host aborts the storage call.
pub async fn simulate(broker: &Broker, tenants: &[String], operations: usize) -> RunStats {
    let mut stats = RunStats::default();
    let pairs = OperationKind::ALL.len() / 2;

    for i in 0..operations {
        let pair = (i % pairs) * 2;
        let (pre, post) = (OperationKind::ALL[pair], OperationKind::ALL[pair + 1]);
        let tenant = tenants.get(i % tenants.len().max(1)).cloned();
        let scope = scope_for(pre, tenant, RESOURCE_TYPES[i % RESOURCE_TYPES.len()]);

        let outcome = broker
            .publish(&OperationEvent::new(pre).with_scope(scope.clone()))
            .await;
        stats.published += 1;
        if !outcome.success {
            debug!(operation = %pre, errors = outcome.errors.len(), "pre hook rejected");
            stats.rejected += 1;
            continue;
        }

        broker
            .publish(
                &OperationEvent::new(post)
                    .with_scope(scope)
                    .with_response(json!({"status": 200})),
            )
            .await;
        stats.published += 1;
    }

    stats
}

/// System-level interactions have no resource type.
fn scope_for(kind: OperationKind, tenant: Option<String>, resource_type: &str) -> RequestScope {
    let resource_type = match kind {
        OperationKind::PreTransaction
        | OperationKind::PreBatch
        | OperationKind::PreSearchSystem
        | OperationKind::PreHistorySystem => None,
        _ => Some(resource_type.to_string()),
    };
    RequestScope::from_parts(tenant, resource_type)
}
