//! Metrics aggregator configuration.
//!
//! Values are read once, when the aggregator is constructed. They can come
//! from the process environment ([`MetricsConfig::from_env`]) or from a
//! `[metrics]` table in a TOML file via serde.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::MetricsError;

/// Enables the aggregator when set to exactly `true`.
pub const ENV_ENABLED: &str = "OPHOOKS_METRICS_ENABLED";
/// Flush interval in milliseconds.
pub const ENV_PUSH_INTERVAL_MS: &str = "OPHOOKS_METRICS_PUSH_INTERVAL_MS";
/// Maximum number of sink requests in flight at once.
pub const ENV_SEND_CONCURRENCY: &str = "OPHOOKS_METRICS_SEND_CONCURRENCY";
/// Namespace attached to every sink request.
pub const ENV_NAMESPACE: &str = "OPHOOKS_METRICS_NAMESPACE";

const DEFAULT_PUSH_INTERVAL_MS: u64 = 60_000;
const DEFAULT_SEND_CONCURRENCY: usize = 25;
const DEFAULT_NAMESPACE: &str = "OperationHooks";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Subscribe and start the flush timer on construction
    pub enabled: bool,
    pub push_interval_ms: u64,
    /// Outer batch size: requests sent concurrently per flush step
    pub concurrent_send_count: usize,
    pub namespace: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            push_interval_ms: DEFAULT_PUSH_INTERVAL_MS,
            concurrent_send_count: DEFAULT_SEND_CONCURRENCY,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl MetricsConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, MetricsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    ///
    /// Unset keys fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, MetricsError> {
        let mut config = Self::default();

        if let Some(enabled) = lookup(ENV_ENABLED) {
            config.enabled = enabled == "true";
        }
        if let Some(raw) = lookup(ENV_PUSH_INTERVAL_MS) {
            config.push_interval_ms = raw.trim().parse().map_err(|_| {
                MetricsError::invalid_config(format!("{ENV_PUSH_INTERVAL_MS}={raw} is not a number"))
            })?;
        }
        if let Some(raw) = lookup(ENV_SEND_CONCURRENCY) {
            config.concurrent_send_count = raw.trim().parse().map_err(|_| {
                MetricsError::invalid_config(format!("{ENV_SEND_CONCURRENCY}={raw} is not a number"))
            })?;
        }
        if let Some(namespace) = lookup(ENV_NAMESPACE) {
            config.namespace = namespace;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MetricsError> {
        if self.push_interval_ms == 0 {
            return Err(MetricsError::invalid_config("push_interval_ms must be > 0"));
        }
        if self.concurrent_send_count == 0 {
            return Err(MetricsError::invalid_config(
                "concurrent_send_count must be > 0",
            ));
        }
        if self.namespace.is_empty() {
            return Err(MetricsError::invalid_config("namespace must not be empty"));
        }
        Ok(())
    }

    pub fn push_interval(&self) -> Duration {
        Duration::from_millis(self.push_interval_ms)
    }

    /// Enable the aggregator.
    pub fn enabled(mut self) -> Self {
        self.enabled = true;
        self
    }

    /// Set the flush interval.
    pub fn with_push_interval(mut self, interval: Duration) -> Self {
        self.push_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the number of concurrent sink requests.
    pub fn with_concurrent_send_count(mut self, count: usize) -> Self {
        self.concurrent_send_count = count;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = MetricsConfig::from_lookup(lookup(&[])).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.push_interval(), Duration::from_millis(60_000));
        assert_eq!(config.concurrent_send_count, 25);
        assert_eq!(config.namespace, "OperationHooks");
    }

    #[test]
    fn test_enabled_requires_literal_true() {
        let on = MetricsConfig::from_lookup(lookup(&[(ENV_ENABLED, "true")])).unwrap();
        assert!(on.enabled);

        for value in ["TRUE", "1", "yes", "false", ""] {
            let config = MetricsConfig::from_lookup(lookup(&[(ENV_ENABLED, value)])).unwrap();
            assert!(!config.enabled, "{value:?} should not enable metrics");
        }
    }

    #[test]
    fn test_overrides() {
        let config = MetricsConfig::from_lookup(lookup(&[
            (ENV_PUSH_INTERVAL_MS, "1500"),
            (ENV_SEND_CONCURRENCY, " 4 "),
            (ENV_NAMESPACE, "Tenant/Ops"),
        ]))
        .unwrap();
        assert_eq!(config.push_interval_ms, 1500);
        assert_eq!(config.concurrent_send_count, 4);
        assert_eq!(config.namespace, "Tenant/Ops");
    }

    #[test]
    fn test_invalid_values() {
        let err = MetricsConfig::from_lookup(lookup(&[(ENV_PUSH_INTERVAL_MS, "soon")]));
        assert!(matches!(err, Err(MetricsError::InvalidConfig(_))));

        let err = MetricsConfig::from_lookup(lookup(&[(ENV_SEND_CONCURRENCY, "0")]));
        assert!(matches!(err, Err(MetricsError::InvalidConfig(_))));
    }

    #[test]
    fn test_toml_table_with_partial_fields() {
        let config: MetricsConfig = toml::from_str(
            r#"
            enabled = true
            push_interval_ms = 5000
            "#,
        )
        .unwrap();
        assert!(config.enabled);
        assert_eq!(config.push_interval_ms, 5000);
        assert_eq!(config.concurrent_send_count, 25);
    }

    #[test]
    fn test_push_interval_saturates() {
        let config = MetricsConfig::default().with_push_interval(Duration::MAX);
        assert_eq!(config.push_interval_ms, u64::MAX);

        let config = MetricsConfig::default().with_push_interval(Duration::from_millis(1500));
        assert_eq!(config.push_interval_ms, 1500);
    }
}
