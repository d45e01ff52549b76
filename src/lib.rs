//! API Sunset Middleware
//!
//! Tower middleware that manages the end of life of HTTP endpoints: it adds
//! RFC 8594 `Sunset` headers, `Deprecation` headers and `Link` relations to
//! responses, and switches behavior as the sunset date approaches and passes.
//!
//! # Features
//!
//! - **Sunset Headers**: RFC 8594 compliant Sunset headers
//! - **Deprecation Headers**: `Deprecation: @<timestamp>` or `Deprecation: true`
//! - **Periods**: upcoming, pre-sunset grace, post-sunset grace and sunset,
//!   each with its own behavior (pass, warn, error, redirect, respond)
//! - **Usage Tracking**: Prometheus metrics for sunset endpoint usage
//!
//! # Example Configuration
//!
//! ```yaml
//! endpoints:
//!   - id: legacy-users-api
//!     path: /api/v1/users
//!     methods: [GET, POST]
//!     deprecated_at: "2024-01-01T00:00:00Z"
//!     sunset_on: "2025-06-01T00:00:00Z"
//!     alternative_url: https://docs.example.com/migration
//!     periods:
//!       pre_sunset_grace_period: 30d
//!       pre_sunset_grace:
//!         type: warn
//!         message: "Removed on {sunset_on}, see {alternative_url}"
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use api_sunset::{ApiSunsetConfig, SunsetLayer};
//! use axum::{routing::get, Router};
//!
//! # fn build() -> Result<Router, api_sunset::ConfigError> {
//! let config = ApiSunsetConfig::from_file("api-sunset.yaml".as_ref())?;
//! let app = Router::new()
//!     .route("/api/v1/users", get(|| async { "users" }))
//!     .layer(SunsetLayer::from_config(&config)?);
//! # Ok(app)
//! # }
//! ```

pub mod behavior;
pub mod config;
pub mod error;
pub mod headers;
pub mod metrics;
pub mod middleware;
pub mod registry;
pub mod template;
pub mod timeline;

pub use behavior::{BehaviorAction, PeriodBehavior};
pub use config::{ApiSunsetConfig, EndpointSunset};
pub use error::ConfigError;
pub use middleware::{Clock, FixedClock, SunsetLayer, SunsetService, SystemClock};
pub use registry::SunsetRegistry;
pub use timeline::Period;
