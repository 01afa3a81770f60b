use event_bus::consumer_retry::RetryConfig;
use event_bus::AGENT_QUEUE;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::failure::FailurePolicy;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(String),

    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: String,
        value: String,
        reason: String,
    },
}

/// Which broker implementation to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusType {
    Nats,
    InMemory,
}

impl FromStr for BusType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nats" => Ok(BusType::Nats),
            "inmemory" => Ok(BusType::InMemory),
            _ => Err("must be 'nats' or 'inmemory'".to_string()),
        }
    }
}

/// Where business metrics go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsSinkKind {
    Statsd,
    Log,
}

impl FromStr for MetricsSinkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "statsd" => Ok(MetricsSinkKind::Statsd),
            "log" => Ok(MetricsSinkKind::Log),
            _ => Err("must be 'statsd' or 'log'".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    pub sink: MetricsSinkKind,
    pub statsd_host: String,
    pub statsd_port: u16,
    /// Global `service:` tag on every metric
    pub service: String,
}

/// Runtime configuration shared by every agent process
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub bus_type: BusType,
    pub broker_url: String,
    pub queue_name: String,
    /// Durable consumer group; replicas of one agent share it
    pub consumer_group: String,
    pub handler_timeout: Duration,
    /// `max_attempts` is the delivery bound, `initial_backoff` the first requeue delay
    pub retry: RetryConfig,
    pub failure_policy: FailurePolicy,
    pub health_port: Option<u16>,
    pub metrics: MetricsConfig,
}

impl RuntimeConfig {
    /// Load from the process environment (call `dotenvy::dotenv()` first)
    pub fn from_env(agent: &str) -> Result<Self, ConfigError> {
        Self::from_lookup(agent, |var| env::var(var).ok())
    }

    /// Load from an arbitrary variable source
    pub fn from_lookup<F>(agent: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let bus_type = vars.parse_or("BUS_TYPE", BusType::Nats)?;
        let broker_url = vars.or("BROKER_URL", "nats://localhost:4222");
        let queue_name = vars.or("QUEUE_NAME", AGENT_QUEUE);
        let consumer_group = vars.or("CONSUMER_GROUP", agent);

        let handler_timeout_secs: u64 = vars.parse_or("HANDLER_TIMEOUT_SECS", 30)?;
        if handler_timeout_secs == 0 {
            return Err(vars.invalid("HANDLER_TIMEOUT_SECS", "must be at least 1"));
        }

        let max_deliveries: u32 = vars.parse_or("MAX_DELIVERIES", 5)?;
        if max_deliveries == 0 {
            return Err(vars.invalid("MAX_DELIVERIES", "must be at least 1"));
        }

        let retry_backoff_ms: u64 = vars.parse_or("RETRY_BACKOFF_MS", 500)?;
        let failure_policy = vars.parse_or("FAILURE_POLICY", FailurePolicy::Retry)?;
        let health_port = vars.parse_opt::<u16>("HEALTH_PORT")?;

        let metrics = MetricsConfig {
            sink: vars.parse_or("METRICS_SINK", MetricsSinkKind::Statsd)?,
            statsd_host: vars.or("STATSD_HOST", "datadog-agent"),
            statsd_port: vars.parse_or("STATSD_PORT", 8125)?,
            service: vars.or("DATADOG_SERVICE", "product-dev-consulting"),
        };

        Ok(Self {
            bus_type,
            broker_url,
            queue_name,
            consumer_group,
            handler_timeout: Duration::from_secs(handler_timeout_secs),
            retry: RetryConfig {
                max_attempts: max_deliveries,
                initial_backoff: Duration::from_millis(retry_backoff_ms),
                ..RetryConfig::default()
            },
            failure_policy,
            health_port,
            metrics,
        })
    }
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, var: &str) -> Option<String> {
        (self.0)(var).filter(|v| !v.trim().is_empty())
    }

    fn or(&self, var: &str, default: &str) -> String {
        self.get(var).unwrap_or_else(|| default.to_string())
    }

    fn invalid(&self, var: &str, reason: &str) -> ConfigError {
        ConfigError::Invalid {
            var: var.to_string(),
            value: self.get(var).unwrap_or_default(),
            reason: reason.to_string(),
        }
    }

    fn parse_opt<T>(&self, var: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: ToString,
    {
        match self.get(var) {
            None => Ok(None),
            Some(value) => value.parse().map(Some).map_err(|e: T::Err| ConfigError::Invalid {
                var: var.to_string(),
                value,
                reason: e.to_string(),
            }),
        }
    }

    fn parse_or<T>(&self, var: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: ToString,
    {
        Ok(self.parse_opt(var)?.unwrap_or(default))
    }
}

/// Read a required variable; blank counts as missing
pub fn require_env(var: &str) -> Result<String, ConfigError> {
    env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::Missing(var.to_string()))
}

/// Read an optional variable with a default
pub fn env_or(var: &str, default: &str) -> String {
    env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
