//! Tower middleware that applies sunset behaviors and deprecation headers.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::http::{HeaderValue, Request};
use axum::response::Response;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use tower::{Layer, Service};
use tracing::{debug, info};

use crate::behavior::Outcome;
use crate::config::ApiSunsetConfig;
use crate::error::ConfigError;
use crate::metrics::SunsetMetrics;
use crate::registry::SunsetRegistry;

/// Source of the current time.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Layer wrapping services with [`SunsetService`].
#[derive(Clone)]
pub struct SunsetLayer {
    registry: Arc<SunsetRegistry>,
    clock: Arc<dyn Clock>,
    metrics: Option<Arc<SunsetMetrics>>,
}

impl SunsetLayer {
    pub fn new(registry: SunsetRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            clock: Arc::new(SystemClock),
            metrics: None,
        }
    }

    /// Build the registry and, if enabled, the metrics from configuration.
    pub fn from_config(config: &ApiSunsetConfig) -> Result<Self, ConfigError> {
        let mut layer = Self::new(SunsetRegistry::from_config(config)?);
        if config.metrics.enabled {
            match SunsetMetrics::from_config(&config.metrics) {
                Ok(metrics) => layer = layer.with_metrics(Arc::new(metrics)),
                Err(e) => tracing::warn!(error = %e, "Metrics disabled, failed to create collectors"),
            }
        }
        Ok(layer)
    }

    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self.seed_days_until_sunset();
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<SunsetMetrics>) -> Self {
        self.metrics = Some(metrics);
        self.seed_days_until_sunset();
        self
    }

    /// Set the days-until-sunset gauge of every endpoint from the current clock.
    fn seed_days_until_sunset(&self) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        let now = self.clock.now();
        for entry in self.registry.iter() {
            let endpoint = entry.endpoint();
            if let Some(days) = endpoint.timeline().days_until_sunset(now) {
                metrics.set_days_until_sunset(&endpoint.id, &endpoint.path, days);
            }
        }
    }

    pub fn registry(&self) -> &SunsetRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> Option<&Arc<SunsetMetrics>> {
        self.metrics.as_ref()
    }
}

impl<S> Layer<S> for SunsetLayer {
    type Service = SunsetService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SunsetService {
            inner,
            registry: Arc::clone(&self.registry),
            clock: Arc::clone(&self.clock),
            metrics: self.metrics.clone(),
        }
    }
}

/// Service applying the sunset declaration matching each request.
#[derive(Clone)]
pub struct SunsetService<S> {
    inner: S,
    registry: Arc<SunsetRegistry>,
    clock: Arc<dyn Clock>,
    metrics: Option<Arc<SunsetMetrics>>,
}

impl<S, B> Service<Request<B>> for SunsetService<S>
where
    S: Service<Request<B>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        // The clone is not necessarily ready; keep the driven service for this call.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let Some(entry) = self.registry.find(req.uri().path(), req.method()) else {
            return Box::pin(inner.call(req));
        };

        let endpoint = entry.endpoint();
        let now = self.clock.now();
        let (period, behavior) = endpoint.find_period_behavior(now);

        debug!(
            endpoint_id = %endpoint.id,
            path = %req.uri().path(),
            method = %req.method(),
            %period,
            behavior = behavior.name(),
            "Request matches sunset endpoint"
        );

        if let Some(metrics) = &self.metrics {
            metrics.record_request(&endpoint.id, req.method(), period.as_str());
            if let Some(days) = endpoint.timeline().days_until_sunset(now) {
                metrics.set_days_until_sunset(&endpoint.id, &endpoint.path, days);
            }
        }

        if self.registry.settings().log_access {
            info!(
                endpoint_id = %endpoint.id,
                path = %req.uri().path(),
                method = %req.method(),
                %period,
                "Sunset endpoint accessed"
            );
        }

        let headers = behavior.include_headers.then(|| entry.headers().clone());

        match behavior.behave_with(endpoint, period) {
            Outcome::Respond(mut response) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_short_circuit(
                        &endpoint.id,
                        behavior.name(),
                        response.status().as_u16(),
                    );
                }
                if let Some(headers) = &headers {
                    headers.apply_to(response.headers_mut());
                }
                Box::pin(async move { Ok(response) })
            }
            Outcome::Continue { notice } => {
                let notice = notice.and_then(|n| {
                    HeaderValue::from_str(&n)
                        .ok()
                        .map(|v| (self.registry.header_names().notice.clone(), v))
                });

                Box::pin(async move {
                    let mut response = inner.call(req).await?;
                    if let Some(headers) = &headers {
                        headers.apply_to(response.headers_mut());
                    }
                    if let Some((name, value)) = notice {
                        response.headers_mut().insert(name, value);
                    }
                    Ok(response)
                })
            }
        }
    }
}
