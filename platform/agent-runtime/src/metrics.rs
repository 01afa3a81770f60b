//! Business metrics (DogStatsD gauges) and runtime counters (Prometheus)

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::{Arc, Mutex};

use crate::config::{MetricsConfig, MetricsSinkKind};

/// `key:value` tag
pub fn tag(key: &str, value: impl std::fmt::Display) -> String {
    format!("{key}:{value}")
}

/// Fire-and-forget sink for business metrics
///
/// Emission never fails from the caller's point of view; a sink that cannot
/// deliver logs and drops the sample.
pub trait MetricsSink: Send + Sync {
    fn gauge(&self, name: &str, value: f64, tags: &[String]);
}

/// DogStatsD over UDP with a global `service:` tag
pub struct StatsdSink {
    socket: UdpSocket,
    target: SocketAddr,
    service_tag: String,
}

impl StatsdSink {
    pub fn new(host: &str, port: u16, service: &str) -> std::io::Result<Self> {
        let target = (host, port).to_socket_addrs()?.next().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{host}:{port} did not resolve"),
            )
        })?;
        let bind: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind)?;
        socket.set_nonblocking(true)?;

        Ok(Self {
            socket,
            target,
            service_tag: tag("service", service),
        })
    }

    /// `name:value|g|#tag1,tag2,service:x`
    pub fn format_gauge(&self, name: &str, value: f64, tags: &[String]) -> String {
        let mut all_tags: Vec<&str> = tags.iter().map(String::as_str).collect();
        all_tags.push(&self.service_tag);
        format!("{}:{}|g|#{}", name, value, all_tags.join(","))
    }
}

impl MetricsSink for StatsdSink {
    fn gauge(&self, name: &str, value: f64, tags: &[String]) {
        let line = self.format_gauge(name, value, tags);
        match self.socket.send_to(line.as_bytes(), self.target) {
            Ok(_) => tracing::debug!(metric = %name, value, "Metric sent"),
            Err(e) => tracing::warn!(metric = %name, error = %e, "Failed to send metric"),
        }
    }
}

/// Writes metrics to the log only
#[derive(Debug, Default)]
pub struct LogSink;

impl MetricsSink for LogSink {
    fn gauge(&self, name: &str, value: f64, tags: &[String]) {
        tracing::info!(metric = %name, value, tags = ?tags, "Metric");
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMetric {
    pub name: String,
    pub value: f64,
    pub tags: Vec<String>,
}

/// Keeps every sample in memory, for tests
#[derive(Debug, Default)]
pub struct RecordingSink {
    samples: Mutex<Vec<RecordedMetric>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<RecordedMetric> {
        self.samples
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Samples emitted under `name`
    pub fn named(&self, name: &str) -> Vec<RecordedMetric> {
        self.recorded()
            .into_iter()
            .filter(|m| m.name == name)
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.named(name).len()
    }
}

impl MetricsSink for RecordingSink {
    fn gauge(&self, name: &str, value: f64, tags: &[String]) {
        if let Ok(mut samples) = self.samples.lock() {
            samples.push(RecordedMetric {
                name: name.to_string(),
                value,
                tags: tags.to_vec(),
            });
        }
    }
}

/// Build the configured sink; an unresolvable StatsD host falls back to logging
pub fn build_sink(config: &MetricsConfig) -> Arc<dyn MetricsSink> {
    match config.sink {
        MetricsSinkKind::Log => Arc::new(LogSink),
        MetricsSinkKind::Statsd => {
            match StatsdSink::new(&config.statsd_host, config.statsd_port, &config.service) {
                Ok(sink) => Arc::new(sink),
                Err(e) => {
                    tracing::warn!(
                        host = %config.statsd_host,
                        port = config.statsd_port,
                        error = %e,
                        "StatsD unavailable, metrics will be logged only"
                    );
                    Arc::new(LogSink)
                }
            }
        }
    }
}

/// How a delivery was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Acked,
    Requeued,
    DeadLettered,
    DecodeFailed,
    Unhandled,
}

impl DeliveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOutcome::Acked => "acked",
            DeliveryOutcome::Requeued => "requeued",
            DeliveryOutcome::DeadLettered => "dead_lettered",
            DeliveryOutcome::DecodeFailed => "decode_failed",
            DeliveryOutcome::Unhandled => "unhandled",
        }
    }
}

/// Prometheus counters for the consume loop, rendered on `/metrics`
#[derive(Clone)]
pub struct RuntimeMetrics {
    registry: Registry,
    pub deliveries_total: IntCounterVec,
    pub handler_duration_seconds: HistogramVec,
    pub agent_up: IntGaugeVec,
}

impl RuntimeMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let deliveries_total = IntCounterVec::new(
            Opts::new("agent_deliveries_total", "Deliveries settled by the agent"),
            &["agent", "outcome"], // acked|requeued|dead_lettered|decode_failed|unhandled
        )?;

        let handler_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "agent_handler_duration_seconds",
                "Handler execution time in seconds",
            ),
            &["agent", "event_type"],
        )?;

        let agent_up = IntGaugeVec::new(
            Opts::new("agent_up", "1 while the agent is consuming"),
            &["agent"],
        )?;

        registry.register(Box::new(deliveries_total.clone()))?;
        registry.register(Box::new(handler_duration_seconds.clone()))?;
        registry.register(Box::new(agent_up.clone()))?;

        Ok(Self {
            registry,
            deliveries_total,
            handler_duration_seconds,
            agent_up,
        })
    }

    pub fn record(&self, agent: &str, outcome: DeliveryOutcome) {
        self.deliveries_total
            .with_label_values(&[agent, outcome.as_str()])
            .inc();
    }

    pub fn delivered(&self, agent: &str, outcome: DeliveryOutcome) -> u64 {
        self.deliveries_total
            .with_label_values(&[agent, outcome.as_str()])
            .get()
    }

    pub fn render(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&mf, &mut buf).map_err(|e| e.to_string())?;
        String::from_utf8(buf).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dogstatsd_line_format() {
        let sink = StatsdSink::new("127.0.0.1", 8125, "product-dev-consulting").unwrap();
        let line = sink.format_gauge(
            "ai_agent.deployment.deployments_triggered",
            1.0,
            &[tag("agent", "deployment"), tag("task", "task-001")],
        );
        assert_eq!(
            line,
            "ai_agent.deployment.deployments_triggered:1|g|#agent:deployment,task:task-001,service:product-dev-consulting"
        );
    }

    #[test]
    fn test_statsd_sink_delivers_over_udp() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(std::time::Duration::from_secs(1)))
            .unwrap();
        let port = receiver.local_addr().unwrap().port();

        let sink = StatsdSink::new("127.0.0.1", port, "svc").unwrap();
        sink.gauge("ai_agent.testing.tests_run", 1.0, &[tag("result", "passed")]);

        let mut buf = [0u8; 256];
        let n = receiver.recv(&mut buf).unwrap();
        assert_eq!(
            std::str::from_utf8(&buf[..n]).unwrap(),
            "ai_agent.testing.tests_run:1|g|#result:passed,service:svc"
        );
    }

    #[test]
    fn test_unresolvable_host_falls_back_to_log_sink() {
        let config = MetricsConfig {
            sink: MetricsSinkKind::Statsd,
            statsd_host: "no-such-host.invalid".to_string(),
            statsd_port: 8125,
            service: "svc".to_string(),
        };
        // Must not panic; emission is a no-op beyond logging
        build_sink(&config).gauge("ai_agent.support.tickets_resolved", 1.0, &[]);
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::new();
        sink.gauge("a", 1.0, &[tag("agent", "support")]);
        sink.gauge("b", 2.0, &[]);
        sink.gauge("a", 1.0, &[]);

        assert_eq!(sink.count("a"), 2);
        assert_eq!(sink.named("b")[0].value, 2.0);
        assert_eq!(sink.recorded()[0].tags, vec!["agent:support".to_string()]);
    }

    #[test]
    fn test_runtime_metrics_render() {
        let metrics = RuntimeMetrics::new().unwrap();
        metrics.record("support", DeliveryOutcome::Acked);
        metrics.record("support", DeliveryOutcome::Acked);
        metrics.record("support", DeliveryOutcome::DecodeFailed);

        assert_eq!(metrics.delivered("support", DeliveryOutcome::Acked), 2);
        let text = metrics.render().unwrap();
        assert!(text.contains("agent_deliveries_total{agent=\"support\",outcome=\"acked\"} 2"));
        assert!(text.contains("outcome=\"decode_failed\""));
    }
}
