//! Configuration for the sunset middleware.
//!
//! Defines deprecated endpoints, their sunset timelines, per-period behaviors,
//! header names and metrics options.

use axum::http::{HeaderName, Method};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::behavior::{BehaviorAction, PeriodBehavior};
use crate::error::{ConfigError, Result};
use crate::timeline::{self, Period, SunsetTimeline};

/// Main configuration for the sunset middleware.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiSunsetConfig {
    /// Deprecated endpoints
    #[serde(default)]
    pub endpoints: Vec<EndpointSunset>,

    /// Global settings
    #[serde(default)]
    pub settings: GlobalSettings,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl ApiSunsetConfig {
    /// Load and validate configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.settings.header_names()?;
        for endpoint in &self.endpoints {
            endpoint.validate()?;
        }
        Ok(())
    }
}

/// Sunset declaration for one endpoint or route group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointSunset {
    /// Unique identifier for this declaration
    pub id: String,

    /// Path to match (exact, or a glob pattern like /api/v1/*)
    pub path: String,

    /// HTTP methods to match (empty means all methods)
    #[serde(default)]
    pub methods: Vec<String>,

    /// When the endpoint was deprecated (RFC 3339 with offset)
    #[serde(default)]
    pub deprecated_at: Option<DateTime<Utc>>,

    /// When the endpoint stops being served (RFC 3339 with offset).
    /// Emitted as the Sunset header (RFC 8594).
    #[serde(default)]
    pub sunset_on: Option<DateTime<Utc>>,

    /// Replacement endpoint or migration guide, linked with rel="sunset"
    #[serde(default)]
    pub alternative_url: Option<String>,

    /// Deprecation policy document, linked with rel="deprecation"
    #[serde(default)]
    pub documentation_url: Option<String>,

    /// Grace periods and the behavior for each period
    #[serde(default)]
    pub periods: PeriodSchedule,
}

impl EndpointSunset {
    /// Validate the endpoint configuration.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(ConfigError::EmptyId);
        }
        if self.path.is_empty() {
            return Err(ConfigError::EmptyPath(self.id.clone()));
        }
        if self.is_pattern() {
            globset::Glob::new(&self.path).map_err(|source| ConfigError::InvalidPattern {
                id: self.id.clone(),
                pattern: self.path.clone(),
                source,
            })?;
        }
        self.parsed_methods()?;

        if let (Some(deprecated), Some(sunset)) = (&self.deprecated_at, &self.sunset_on) {
            if deprecated > sunset {
                return Err(ConfigError::DeprecatedAfterSunset(self.id.clone()));
            }
        }

        if self.sunset_on.is_none()
            && (!self.periods.pre_sunset_grace_period.is_zero()
                || !self.periods.post_sunset_grace_period.is_zero())
        {
            return Err(ConfigError::GraceWithoutSunset(self.id.clone()));
        }

        for period in PERIODS {
            self.periods.behavior_for(period).validate(self)?;
        }

        if let Some(sunset) = &self.sunset_on {
            if self.timeline().period_at(Utc::now()) == Period::Sunset
                && matches!(self.periods.sunset.action, BehaviorAction::Pass)
            {
                tracing::warn!(
                    endpoint_id = %self.id,
                    sunset = %sunset,
                    "Sunset date is in the past but the endpoint is still served"
                );
            }
        }

        Ok(())
    }

    /// Whether `path` contains glob metacharacters.
    pub fn is_pattern(&self) -> bool {
        self.path.contains(['*', '?', '[', '{'])
    }

    /// Parse `methods` into HTTP methods, uppercased.
    pub fn parsed_methods(&self) -> Result<Vec<Method>> {
        self.methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.to_uppercase().as_bytes()).map_err(|_| {
                    ConfigError::InvalidMethod {
                        id: self.id.clone(),
                        method: m.clone(),
                    }
                })
            })
            .collect()
    }

    /// The sunset timeline of this endpoint.
    pub fn timeline(&self) -> SunsetTimeline {
        SunsetTimeline::new(
            self.sunset_on,
            self.periods.pre_sunset_grace_period,
            self.periods.post_sunset_grace_period,
        )
    }

    /// Find the behavior to assume at `as_of`.
    pub fn find_period_behavior(&self, as_of: DateTime<Utc>) -> (Period, &PeriodBehavior) {
        let period = self.timeline().period_at(as_of);
        (period, self.periods.behavior_for(period))
    }
}

const PERIODS: [Period; 4] = [
    Period::Upcoming,
    Period::PreSunsetGrace,
    Period::PostSunsetGrace,
    Period::Sunset,
];

/// Grace period lengths and the behavior assumed in each period.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PeriodSchedule {
    /// How long before `sunset_on` the pre-sunset grace period starts (0 disables it)
    #[serde(default = "zero", with = "timeline::duration")]
    pub pre_sunset_grace_period: TimeDelta,

    /// How long after `sunset_on` the post-sunset grace period lasts (0 disables it)
    #[serde(default = "zero", with = "timeline::duration")]
    pub post_sunset_grace_period: TimeDelta,

    #[serde(default = "PeriodBehavior::pass")]
    pub upcoming: PeriodBehavior,

    #[serde(default = "PeriodBehavior::pass")]
    pub pre_sunset_grace: PeriodBehavior,

    #[serde(default = "PeriodBehavior::pass")]
    pub post_sunset_grace: PeriodBehavior,

    #[serde(default = "PeriodBehavior::gone")]
    pub sunset: PeriodBehavior,
}

fn zero() -> TimeDelta {
    TimeDelta::zero()
}

impl PeriodSchedule {
    pub fn behavior_for(&self, period: Period) -> &PeriodBehavior {
        match period {
            Period::Upcoming => &self.upcoming,
            Period::PreSunsetGrace => &self.pre_sunset_grace,
            Period::PostSunsetGrace => &self.post_sunset_grace,
            Period::Sunset => &self.sunset,
        }
    }
}

impl Default for PeriodSchedule {
    fn default() -> Self {
        Self {
            pre_sunset_grace_period: zero(),
            post_sunset_grace_period: zero(),
            upcoming: PeriodBehavior::pass(),
            pre_sunset_grace: PeriodBehavior::pass(),
            post_sunset_grace: PeriodBehavior::pass(),
            sunset: PeriodBehavior::gone(),
        }
    }
}

/// Global settings for the middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalSettings {
    /// Header name for deprecation (default: Deprecation)
    #[serde(default = "default_deprecation_header")]
    pub deprecation_header: String,

    /// Header name for sunset date (default: Sunset)
    #[serde(default = "default_sunset_header")]
    pub sunset_header: String,

    /// Header name for links (default: Link)
    #[serde(default = "default_link_header")]
    pub link_header: String,

    /// Header name for warn behavior notices (default: X-Deprecation-Notice)
    #[serde(default = "default_notice_header")]
    pub notice_header: String,

    /// Whether to log every access to a sunset endpoint
    #[serde(default = "default_true")]
    pub log_access: bool,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            deprecation_header: default_deprecation_header(),
            sunset_header: default_sunset_header(),
            link_header: default_link_header(),
            notice_header: default_notice_header(),
            log_access: true,
        }
    }
}

impl GlobalSettings {
    /// Parse the configured header names.
    pub fn header_names(&self) -> Result<HeaderNames> {
        fn parse(name: &str) -> Result<HeaderName> {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ConfigError::InvalidHeaderName(name.to_string()))
        }

        Ok(HeaderNames {
            deprecation: parse(&self.deprecation_header)?,
            sunset: parse(&self.sunset_header)?,
            link: parse(&self.link_header)?,
            notice: parse(&self.notice_header)?,
        })
    }
}

/// Parsed header names used on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderNames {
    pub deprecation: HeaderName,
    pub sunset: HeaderName,
    pub link: HeaderName,
    pub notice: HeaderName,
}

impl Default for HeaderNames {
    fn default() -> Self {
        Self {
            deprecation: HeaderName::from_static("deprecation"),
            sunset: HeaderName::from_static("sunset"),
            link: axum::http::header::LINK,
            notice: HeaderName::from_static("x-deprecation-notice"),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_deprecation_header() -> String {
    "Deprecation".to_string()
}

fn default_sunset_header() -> String {
    "Sunset".to_string()
}

fn default_link_header() -> String {
    "Link".to_string()
}

fn default_notice_header() -> String {
    "X-Deprecation-Notice".to_string()
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Whether to collect Prometheus metrics
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Prefix for metric names
    #[serde(default = "default_metrics_prefix")]
    pub prefix: String,

    /// Constant labels added to every metric
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: default_metrics_prefix(),
            labels: HashMap::new(),
        }
    }
}

fn default_metrics_prefix() -> String {
    "api_sunset".to_string()
}
