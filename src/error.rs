//! Configuration-time errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, validating, or registering sunset configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("endpoint id cannot be empty")]
    EmptyId,

    #[error("endpoint path cannot be empty for id: {0}")]
    EmptyPath(String),

    #[error("endpoint {id} has invalid path pattern {pattern:?}: {source}")]
    InvalidPattern {
        id: String,
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("endpoint {id} has invalid method {method:?}")]
    InvalidMethod { id: String, method: String },

    #[error("endpoint {0} already has a sunset configuration")]
    DuplicateId(String),

    #[error("path {path} is already registered by endpoint {existing} with overlapping methods")]
    DuplicatePath { path: String, existing: String },

    #[error("invalid header name {0:?}")]
    InvalidHeaderName(String),

    #[error("value for header {name} is not a valid header value: {value:?}")]
    InvalidHeaderValue { name: String, value: String },

    #[error(
        "only `sunset_on` and `alternative_url` are supported as message placeholders, \
         found `{{{placeholder}}}` in {template:?}"
    )]
    UnknownPlaceholder {
        placeholder: String,
        template: String,
    },

    #[error("unbalanced brace in message template {0:?}")]
    UnbalancedBrace(String),

    #[error("invalid status code {code} for {behavior} behavior")]
    InvalidStatusCode { behavior: &'static str, code: u16 },

    #[error("invalid duration {0:?}, expected seconds or groups like `7d`, `12h`, `30m`")]
    InvalidDuration(String),

    #[error("endpoint {0} configures grace periods but has no sunset_on")]
    GraceWithoutSunset(String),

    #[error("deprecated_at is after sunset_on for endpoint: {0}")]
    DeprecatedAfterSunset(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
