//! Metrics for tracking usage of sunset endpoints.
//!
//! Provides Prometheus metrics for monitoring deprecated endpoint access.

use axum::http::Method;
use prometheus::{IntCounterVec, IntGaugeVec, Opts, Registry};
use std::collections::HashMap;

use crate::config::MetricsConfig;

/// Metrics collector for sunset endpoint usage.
#[derive(Clone)]
pub struct SunsetMetrics {
    /// Registry for all metrics
    registry: Registry,

    /// Requests that hit a sunset endpoint, by period
    pub requests_total: IntCounterVec,

    /// Requests answered by a behavior instead of the endpoint
    pub short_circuits_total: IntCounterVec,

    /// Days until sunset for each endpoint (negative if past)
    pub days_until_sunset: IntGaugeVec,
}

impl SunsetMetrics {
    /// Create a metrics collector with the given prefix.
    pub fn new(prefix: &str) -> prometheus::Result<Self> {
        Self::with_labels(prefix, HashMap::new())
    }

    /// Create a metrics collector from configuration.
    pub fn from_config(config: &MetricsConfig) -> prometheus::Result<Self> {
        Self::with_labels(&config.prefix, config.labels.clone())
    }

    fn with_labels(prefix: &str, labels: HashMap<String, String>) -> prometheus::Result<Self> {
        let registry = if labels.is_empty() {
            Registry::new()
        } else {
            Registry::new_custom(None, Some(labels))?
        };

        let requests_total = IntCounterVec::new(
            Opts::new(
                format!("{}_requests_total", prefix),
                "Total number of requests to sunset endpoints",
            ),
            &["endpoint_id", "method", "period"],
        )?;

        let short_circuits_total = IntCounterVec::new(
            Opts::new(
                format!("{}_short_circuits_total", prefix),
                "Total number of requests answered by a sunset behavior",
            ),
            &["endpoint_id", "behavior", "status"],
        )?;

        let days_until_sunset = IntGaugeVec::new(
            Opts::new(
                format!("{}_days_until_sunset", prefix),
                "Days until endpoint sunset (negative if past)",
            ),
            &["endpoint_id", "path"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(short_circuits_total.clone()))?;
        registry.register(Box::new(days_until_sunset.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            short_circuits_total,
            days_until_sunset,
        })
    }

    /// Record a request to a sunset endpoint.
    ///
    /// Extension methods share the `other` label value.
    pub fn record_request(&self, endpoint_id: &str, method: &Method, period: &str) {
        self.requests_total
            .with_label_values(&[endpoint_id, method_label(method), period])
            .inc();
    }

    /// Record a response produced by a behavior.
    pub fn record_short_circuit(&self, endpoint_id: &str, behavior: &str, status: u16) {
        let status = status.to_string();
        self.short_circuits_total
            .with_label_values(&[endpoint_id, behavior, status.as_str()])
            .inc();
    }

    /// Update the days until sunset gauge.
    pub fn set_days_until_sunset(&self, endpoint_id: &str, path: &str, days: i64) {
        self.days_until_sunset
            .with_label_values(&[endpoint_id, path])
            .set(days);
    }

    /// Get the Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encode metrics in Prometheus text format.
    pub fn encode(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

fn method_label(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::HEAD => "HEAD",
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::DELETE => "DELETE",
        Method::CONNECT => "CONNECT",
        Method::OPTIONS => "OPTIONS",
        Method::TRACE => "TRACE",
        Method::PATCH => "PATCH",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_request() {
        let metrics = SunsetMetrics::new("test").unwrap();
        metrics.record_request("legacy-api", &Method::GET, "upcoming");

        let output = metrics.encode();
        assert!(output.contains("test_requests_total"));
        assert!(output.contains("legacy-api"));
        assert!(output.contains("period=\"upcoming\""));
    }

    #[test]
    fn test_extension_methods_share_one_series() {
        let metrics = SunsetMetrics::new("test").unwrap();
        for i in 0..500 {
            let method = Method::from_bytes(format!("JUNK{i}").as_bytes()).unwrap();
            metrics.record_request("legacy-api", &method, "upcoming");
        }
        metrics.record_request("legacy-api", &Method::PATCH, "upcoming");

        let families = metrics.registry().gather();
        let requests = families
            .iter()
            .find(|f| f.get_name() == "test_requests_total")
            .unwrap();
        assert_eq!(requests.get_metric().len(), 2);
        assert_eq!(
            metrics
                .requests_total
                .with_label_values(&["legacy-api", "other", "upcoming"])
                .get(),
            500
        );
        assert!(!metrics.encode().contains("JUNK"));
    }

    #[test]
    fn test_record_short_circuit() {
        let metrics = SunsetMetrics::new("test").unwrap();
        metrics.record_short_circuit("legacy-api", "error", 410);

        let output = metrics.encode();
        assert!(output.contains("test_short_circuits_total"));
        assert!(output.contains("status=\"410\""));
    }

    #[test]
    fn test_days_until_sunset() {
        let metrics = SunsetMetrics::new("test").unwrap();
        metrics.set_days_until_sunset("legacy-api", "/api/v1/users", -3);

        let output = metrics.encode();
        assert!(output.contains("test_days_until_sunset"));
        assert!(output.contains("-3"));
    }

    #[test]
    fn test_const_labels_from_config() {
        let config = MetricsConfig {
            labels: HashMap::from([("service".to_string(), "billing".to_string())]),
            ..MetricsConfig::default()
        };
        let metrics = SunsetMetrics::from_config(&config).unwrap();
        metrics.record_request("legacy-api", &Method::GET, "sunset");

        let output = metrics.encode();
        assert!(output.contains("api_sunset_requests_total"));
        assert!(output.contains("service=\"billing\""));
    }

    #[test]
    fn test_invalid_prefix_rejected() {
        assert!(SunsetMetrics::new("not a valid prefix").is_err());
    }
}
