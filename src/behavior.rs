//! What the middleware does while an endpoint is in a given period.

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::EndpointSunset;
use crate::error::ConfigError;
use crate::template::MessageTemplate;
use crate::timeline::Period;

/// Behavior assumed during one period of the sunset timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "BehaviorSpec", into = "BehaviorSpec")]
pub struct PeriodBehavior {
    pub action: BehaviorAction,

    /// Whether `Deprecation`, `Sunset` and `Link` headers are attached.
    /// The notice header of `warn` is sent either way.
    pub include_headers: bool,
}

fn default_true() -> bool {
    true
}

/// Action taken when a request hits an endpoint during a period.
#[derive(Debug, Clone)]
pub enum BehaviorAction {
    /// Run the endpoint as usual.
    Pass,

    /// Run the endpoint, but warn developers through logs and a notice header.
    Warn { message: MessageTemplate },

    /// Answer with `{"detail": <message>}` instead of running the endpoint.
    Error {
        message: MessageTemplate,
        status_code: u16,
    },

    /// Redirect to another URL.
    Redirect { url: String, status_code: u16 },

    /// Answer with a fixed body.
    Respond {
        status_code: u16,
        body: String,
        content_type: String,
    },
}

/// Serialized form of a [`PeriodBehavior`]: one flat map per behavior, with
/// every key other than the ones listed rejected.
#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", deny_unknown_fields)]
enum BehaviorSpec {
    Pass {
        #[serde(default = "default_true")]
        include_headers: bool,
    },
    Warn {
        message: MessageTemplate,
        #[serde(default = "default_true")]
        include_headers: bool,
    },
    Error {
        message: MessageTemplate,
        #[serde(default = "default_gone_code")]
        status_code: u16,
        #[serde(default = "default_true")]
        include_headers: bool,
    },
    Redirect {
        url: String,
        #[serde(default = "default_redirect_code")]
        status_code: u16,
        #[serde(default = "default_true")]
        include_headers: bool,
    },
    Respond {
        status_code: u16,
        body: String,
        #[serde(default = "default_content_type")]
        content_type: String,
        #[serde(default = "default_true")]
        include_headers: bool,
    },
}

impl From<BehaviorSpec> for PeriodBehavior {
    fn from(spec: BehaviorSpec) -> Self {
        let (action, include_headers) = match spec {
            BehaviorSpec::Pass { include_headers } => (BehaviorAction::Pass, include_headers),
            BehaviorSpec::Warn {
                message,
                include_headers,
            } => (BehaviorAction::Warn { message }, include_headers),
            BehaviorSpec::Error {
                message,
                status_code,
                include_headers,
            } => (
                BehaviorAction::Error {
                    message,
                    status_code,
                },
                include_headers,
            ),
            BehaviorSpec::Redirect {
                url,
                status_code,
                include_headers,
            } => (BehaviorAction::Redirect { url, status_code }, include_headers),
            BehaviorSpec::Respond {
                status_code,
                body,
                content_type,
                include_headers,
            } => (
                BehaviorAction::Respond {
                    status_code,
                    body,
                    content_type,
                },
                include_headers,
            ),
        };
        Self {
            action,
            include_headers,
        }
    }
}

impl From<PeriodBehavior> for BehaviorSpec {
    fn from(behavior: PeriodBehavior) -> Self {
        let include_headers = behavior.include_headers;
        match behavior.action {
            BehaviorAction::Pass => BehaviorSpec::Pass { include_headers },
            BehaviorAction::Warn { message } => BehaviorSpec::Warn {
                message,
                include_headers,
            },
            BehaviorAction::Error {
                message,
                status_code,
            } => BehaviorSpec::Error {
                message,
                status_code,
                include_headers,
            },
            BehaviorAction::Redirect { url, status_code } => BehaviorSpec::Redirect {
                url,
                status_code,
                include_headers,
            },
            BehaviorAction::Respond {
                status_code,
                body,
                content_type,
            } => BehaviorSpec::Respond {
                status_code,
                body,
                content_type,
                include_headers,
            },
        }
    }
}

fn default_gone_code() -> u16 {
    410
}

fn default_redirect_code() -> u16 {
    307
}

fn default_content_type() -> String {
    "application/json".to_string()
}

/// Result of applying a behavior to one request.
#[derive(Debug)]
pub enum Outcome {
    /// Forward to the inner service, optionally with a notice for the response.
    Continue { notice: Option<String> },
    /// Short-circuit with this response.
    Respond(Response),
}

impl PeriodBehavior {
    pub fn new(action: BehaviorAction) -> Self {
        Self {
            action,
            include_headers: true,
        }
    }

    pub fn pass() -> Self {
        Self::new(BehaviorAction::Pass)
    }

    /// Default behavior once an endpoint is fully sunset.
    pub fn gone() -> Self {
        Self::new(BehaviorAction::Error {
            message: MessageTemplate::sunset_notice(),
            status_code: default_gone_code(),
        })
    }

    pub fn without_headers(mut self) -> Self {
        self.include_headers = false;
        self
    }

    /// Short name used in logs and metric labels.
    pub fn name(&self) -> &'static str {
        self.action.name()
    }

    /// Check status codes and header-bound values.
    pub fn validate(&self, endpoint: &EndpointSunset) -> Result<(), ConfigError> {
        match &self.action {
            BehaviorAction::Pass => {}
            BehaviorAction::Warn { message } => {
                let notice = render(message, endpoint);
                if HeaderValue::from_str(&notice).is_err() {
                    return Err(ConfigError::InvalidHeaderValue {
                        name: "notice".to_string(),
                        value: notice,
                    });
                }
            }
            BehaviorAction::Error { status_code, .. } => {
                check_status("error", *status_code, |s| s.is_client_error() || s.is_server_error())?;
            }
            BehaviorAction::Redirect { url, status_code } => {
                check_status("redirect", *status_code, |s| s.is_redirection())?;
                if HeaderValue::from_str(url).is_err() {
                    return Err(ConfigError::InvalidHeaderValue {
                        name: header::LOCATION.to_string(),
                        value: url.clone(),
                    });
                }
            }
            BehaviorAction::Respond {
                status_code,
                content_type,
                ..
            } => {
                check_status("respond", *status_code, |_| true)?;
                if HeaderValue::from_str(content_type).is_err() {
                    return Err(ConfigError::InvalidHeaderValue {
                        name: header::CONTENT_TYPE.to_string(),
                        value: content_type.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Apply this behavior for a request to `endpoint` during `period`.
    pub fn behave_with(&self, endpoint: &EndpointSunset, period: Period) -> Outcome {
        match &self.action {
            BehaviorAction::Pass => Outcome::Continue { notice: None },

            BehaviorAction::Warn { message } => {
                let notice = render(message, endpoint);
                warn!(
                    endpoint_id = %endpoint.id,
                    path = %endpoint.path,
                    %period,
                    "{}",
                    notice
                );
                Outcome::Continue {
                    notice: Some(notice),
                }
            }

            BehaviorAction::Error {
                message,
                status_code,
            } => {
                let status = StatusCode::from_u16(*status_code).unwrap_or(StatusCode::GONE);
                let body = serde_json::json!({ "detail": render(message, endpoint) });
                Outcome::Respond((status, Json(body)).into_response())
            }

            BehaviorAction::Redirect { url, status_code } => {
                let status =
                    StatusCode::from_u16(*status_code).unwrap_or(StatusCode::TEMPORARY_REDIRECT);
                let mut response = Response::new(Body::empty());
                *response.status_mut() = status;
                if let Ok(location) = HeaderValue::from_str(url) {
                    response.headers_mut().insert(header::LOCATION, location);
                }
                Outcome::Respond(response)
            }

            BehaviorAction::Respond {
                status_code,
                body,
                content_type,
            } => {
                let status =
                    StatusCode::from_u16(*status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                let mut response = Response::new(Body::from(body.clone()));
                *response.status_mut() = status;
                if let Ok(value) = HeaderValue::from_str(content_type) {
                    response.headers_mut().insert(header::CONTENT_TYPE, value);
                }
                Outcome::Respond(response)
            }
        }
    }
}

impl BehaviorAction {
    pub fn name(&self) -> &'static str {
        match self {
            BehaviorAction::Pass => "pass",
            BehaviorAction::Warn { .. } => "warn",
            BehaviorAction::Error { .. } => "error",
            BehaviorAction::Redirect { .. } => "redirect",
            BehaviorAction::Respond { .. } => "respond",
        }
    }
}

fn render(message: &MessageTemplate, endpoint: &EndpointSunset) -> String {
    message.render(endpoint.sunset_on.as_ref(), endpoint.alternative_url.as_deref())
}

fn check_status(
    behavior: &'static str,
    code: u16,
    allowed: impl Fn(StatusCode) -> bool,
) -> Result<(), ConfigError> {
    match StatusCode::from_u16(code) {
        Ok(status) if allowed(status) => Ok(()),
        _ => Err(ConfigError::InvalidStatusCode { behavior, code }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PeriodSchedule;

    fn endpoint() -> EndpointSunset {
        EndpointSunset {
            id: "legacy".to_string(),
            path: "/api/v1/deprecated".to_string(),
            methods: vec![],
            deprecated_at: None,
            sunset_on: Some("2024-01-01T12:00:00Z".parse().unwrap()),
            alternative_url: Some("https://api.example.com/v2".to_string()),
            documentation_url: None,
            periods: PeriodSchedule::default(),
        }
    }

    fn template(s: &str) -> MessageTemplate {
        MessageTemplate::parse(s).unwrap()
    }

    #[test]
    fn test_pass_continues() {
        let outcome = PeriodBehavior::pass().behave_with(&endpoint(), Period::Upcoming);
        assert!(matches!(outcome, Outcome::Continue { notice: None }));
    }

    #[test]
    fn test_warn_continues_with_notice() {
        let behavior = PeriodBehavior::new(BehaviorAction::Warn {
            message: template("Migrate to {alternative_url}"),
        });
        match behavior.behave_with(&endpoint(), Period::PreSunsetGrace) {
            Outcome::Continue { notice } => {
                assert_eq!(notice.as_deref(), Some("Migrate to https://api.example.com/v2"));
            }
            Outcome::Respond(_) => panic!("warn must not short-circuit"),
        }
    }

    #[test]
    fn test_error_responds_with_detail() {
        let behavior = PeriodBehavior::gone();
        match behavior.behave_with(&endpoint(), Period::Sunset) {
            Outcome::Respond(response) => {
                assert_eq!(response.status(), StatusCode::GONE);
                assert_eq!(
                    response.headers()[header::CONTENT_TYPE],
                    "application/json"
                );
            }
            Outcome::Continue { .. } => panic!("error must short-circuit"),
        }
    }

    #[test]
    fn test_redirect_sets_location() {
        let behavior = PeriodBehavior::new(BehaviorAction::Redirect {
            url: "/api/v2/deprecated".to_string(),
            status_code: 307,
        });
        match behavior.behave_with(&endpoint(), Period::PostSunsetGrace) {
            Outcome::Respond(response) => {
                assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
                assert_eq!(response.headers()[header::LOCATION], "/api/v2/deprecated");
            }
            Outcome::Continue { .. } => panic!("redirect must short-circuit"),
        }
    }

    #[test]
    fn test_respond_uses_content_type() {
        let behavior = PeriodBehavior::new(BehaviorAction::Respond {
            status_code: 503,
            body: "<h1>gone fishing</h1>".to_string(),
            content_type: "text/html".to_string(),
        });
        match behavior.behave_with(&endpoint(), Period::Sunset) {
            Outcome::Respond(response) => {
                assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
            }
            Outcome::Continue { .. } => panic!("respond must short-circuit"),
        }
    }

    #[test]
    fn test_parse_behaviors_from_yaml() {
        let behavior: PeriodBehavior = serde_yaml::from_str(
            r#"
type: error
message: "Sunset on {sunset_on}"
include_headers: false
"#,
        )
        .unwrap();
        assert!(!behavior.include_headers);
        match behavior.action {
            BehaviorAction::Error { status_code, .. } => assert_eq!(status_code, 410),
            other => panic!("expected error behavior, got {}", other.name()),
        }

        let behavior: PeriodBehavior = serde_yaml::from_str("type: redirect\nurl: /v2\n").unwrap();
        assert!(behavior.include_headers);
        assert!(matches!(
            behavior.action,
            BehaviorAction::Redirect { status_code: 307, .. }
        ));

        let behavior: PeriodBehavior = serde_yaml::from_str("type: pass\n").unwrap();
        assert_eq!(behavior.name(), "pass");
    }

    #[test]
    fn test_unknown_behavior_keys_rejected() {
        let result: Result<PeriodBehavior, _> =
            serde_yaml::from_str("type: error\nmessage: gone\nerror_code: 404\n");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("error_code"), "{err}");

        let result: Result<PeriodBehavior, _> =
            serde_yaml::from_str("type: pass\ninclude_header: false\n");
        assert!(result.is_err());

        let result: Result<PeriodBehavior, _> =
            serde_yaml::from_str("type: redirect\nurl: /v2\nmessage: moved\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_behavior_serializes_flat() {
        let behavior = PeriodBehavior::gone().without_headers();
        let value = serde_json::to_value(&behavior).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["status_code"], 410);
        assert_eq!(value["include_headers"], false);

        let back: PeriodBehavior = serde_json::from_value(value).unwrap();
        assert!(!back.include_headers);
        assert_eq!(back.name(), "error");
    }

    #[test]
    fn test_validate_status_codes() {
        let e = endpoint();
        let bad_redirect = PeriodBehavior::new(BehaviorAction::Redirect {
            url: "/v2".to_string(),
            status_code: 200,
        });
        assert!(matches!(
            bad_redirect.validate(&e),
            Err(ConfigError::InvalidStatusCode { behavior: "redirect", code: 200 })
        ));

        let bad_error = PeriodBehavior::new(BehaviorAction::Error {
            message: template("nope"),
            status_code: 302,
        });
        assert!(bad_error.validate(&e).is_err());

        assert!(PeriodBehavior::gone().validate(&e).is_ok());
    }
}
