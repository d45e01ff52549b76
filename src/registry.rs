//! Registry of sunset endpoints and request matching.

use axum::http::Method;
use chrono::{DateTime, Utc};
use globset::GlobMatcher;
use serde::Serialize;
use tracing::debug;

use crate::config::{ApiSunsetConfig, EndpointSunset, GlobalSettings, HeaderNames};
use crate::error::{ConfigError, Result};
use crate::headers::DeprecationHeaders;
use crate::timeline::Period;

#[derive(Debug, Clone)]
enum PathMatcher {
    /// Exact path, also matching sub-paths below it.
    Literal(String),
    Glob(GlobMatcher),
}

impl PathMatcher {
    fn for_endpoint(endpoint: &EndpointSunset) -> Result<Self> {
        if endpoint.is_pattern() {
            let glob = globset::Glob::new(&endpoint.path).map_err(|source| {
                ConfigError::InvalidPattern {
                    id: endpoint.id.clone(),
                    pattern: endpoint.path.clone(),
                    source,
                }
            })?;
            Ok(PathMatcher::Glob(glob.compile_matcher()))
        } else {
            Ok(PathMatcher::Literal(endpoint.path.clone()))
        }
    }

    fn is_exact(&self, path: &str) -> bool {
        matches!(self, PathMatcher::Literal(p) if p == path)
    }

    fn is_match(&self, path: &str) -> bool {
        match self {
            PathMatcher::Literal(p) => {
                path == p
                    || (p.ends_with('/') && path.starts_with(p.as_str()))
                    || path
                        .strip_prefix(p.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
            PathMatcher::Glob(matcher) => matcher.is_match(path),
        }
    }
}

/// A validated endpoint together with its precomputed headers.
#[derive(Debug, Clone)]
pub struct RegisteredEndpoint {
    endpoint: EndpointSunset,
    headers: DeprecationHeaders,
    methods: Vec<Method>,
    matcher: PathMatcher,
}

impl RegisteredEndpoint {
    pub fn endpoint(&self) -> &EndpointSunset {
        &self.endpoint
    }

    pub fn headers(&self) -> &DeprecationHeaders {
        &self.headers
    }

    fn matches_method(&self, method: &Method) -> bool {
        self.methods.is_empty() || self.methods.contains(method)
    }

    fn overlaps(&self, other: &RegisteredEndpoint) -> bool {
        self.endpoint.path == other.endpoint.path
            && (self.methods.is_empty()
                || other.methods.is_empty()
                || self.methods.iter().any(|m| other.methods.contains(m)))
    }
}

/// Sunset declarations keyed by path and method.
#[derive(Debug, Clone)]
pub struct SunsetRegistry {
    settings: GlobalSettings,
    names: HeaderNames,
    entries: Vec<RegisteredEndpoint>,
}

impl SunsetRegistry {
    /// Create an empty registry.
    pub fn new(settings: GlobalSettings) -> Result<Self> {
        let names = settings.header_names()?;
        Ok(Self {
            settings,
            names,
            entries: Vec::new(),
        })
    }

    /// Build a registry holding every endpoint of `config`.
    pub fn from_config(config: &ApiSunsetConfig) -> Result<Self> {
        let mut registry = Self::new(config.settings.clone())?;
        registry.register_all(config.endpoints.iter().cloned())?;
        Ok(registry)
    }

    /// Register one endpoint.
    ///
    /// Fails if the id is taken, or if the same path is already registered
    /// for an overlapping set of methods.
    pub fn register(&mut self, endpoint: EndpointSunset) -> Result<()> {
        endpoint.validate()?;

        let candidate = RegisteredEndpoint {
            headers: DeprecationHeaders::for_endpoint(&endpoint, &self.names)?,
            methods: endpoint.parsed_methods()?,
            matcher: PathMatcher::for_endpoint(&endpoint)?,
            endpoint,
        };

        if self.entries.iter().any(|e| e.endpoint.id == candidate.endpoint.id) {
            return Err(ConfigError::DuplicateId(candidate.endpoint.id));
        }
        if let Some(existing) = self.entries.iter().find(|e| e.overlaps(&candidate)) {
            return Err(ConfigError::DuplicatePath {
                path: candidate.endpoint.path,
                existing: existing.endpoint.id.clone(),
            });
        }

        debug!(
            endpoint_id = %candidate.endpoint.id,
            path = %candidate.endpoint.path,
            sunset_on = ?candidate.endpoint.sunset_on,
            "Registered sunset endpoint"
        );
        self.entries.push(candidate);
        Ok(())
    }

    /// Register several endpoints, stopping at the first error.
    pub fn register_all(&mut self, endpoints: impl IntoIterator<Item = EndpointSunset>) -> Result<()> {
        for endpoint in endpoints {
            self.register(endpoint)?;
        }
        Ok(())
    }

    /// Find the declaration for a request.
    ///
    /// Exact paths take precedence over sub-path and glob matches, which are
    /// tried in registration order.
    pub fn find(&self, path: &str, method: &Method) -> Option<&RegisteredEndpoint> {
        self.entries
            .iter()
            .find(|e| e.matcher.is_exact(path) && e.matches_method(method))
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|e| e.matcher.is_match(path) && e.matches_method(method))
            })
    }

    pub fn settings(&self) -> &GlobalSettings {
        &self.settings
    }

    pub fn header_names(&self) -> &HeaderNames {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredEndpoint> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Describe every endpoint as of `as_of`.
    pub fn report(&self, as_of: DateTime<Utc>) -> Vec<EndpointStatus> {
        self.entries
            .iter()
            .map(|entry| {
                let endpoint = &entry.endpoint;
                let (period, behavior) = endpoint.find_period_behavior(as_of);
                EndpointStatus {
                    id: endpoint.id.clone(),
                    path: endpoint.path.clone(),
                    period,
                    behavior: behavior.name(),
                    days_until_sunset: endpoint.timeline().days_until_sunset(as_of),
                    headers: if behavior.include_headers {
                        entry.headers.to_vec()
                    } else {
                        Vec::new()
                    },
                }
            })
            .collect()
    }
}

/// Point-in-time status of one endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointStatus {
    pub id: String,
    pub path: String,
    pub period: Period,
    pub behavior: &'static str,
    pub days_until_sunset: Option<i64>,
    pub headers: Vec<(String, String)>,
}
