//! Message templates for period behaviors.
//!
//! A template may reference `{sunset_on}` and `{alternative_url}`. Doubled
//! braces (`{{`, `}}`) render as literal braces. Anything else inside braces
//! is rejected when the template is parsed, so rendering never fails.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::error::ConfigError;

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{|\}\}|\{([^{}]*)\}|[{}]").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    SunsetOn,
    AlternativeUrl,
}

/// A parsed message template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl MessageTemplate {
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut last = 0;

        for caps in TOKEN.captures_iter(source) {
            let Some(token) = caps.get(0) else {
                continue;
            };
            literal.push_str(&source[last..token.start()]);
            last = token.end();

            match token.as_str() {
                "{{" => literal.push('{'),
                "}}" => literal.push('}'),
                "{" | "}" => return Err(ConfigError::UnbalancedBrace(source.to_string())),
                _ => {
                    let name = caps.get(1).map_or("", |m| m.as_str()).trim();
                    let segment = match name {
                        "sunset_on" => Segment::SunsetOn,
                        "alternative_url" => Segment::AlternativeUrl,
                        other => {
                            return Err(ConfigError::UnknownPlaceholder {
                                placeholder: other.to_string(),
                                template: source.to_string(),
                            })
                        }
                    };
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(segment);
                }
            }
        }

        literal.push_str(&source[last..]);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// `This endpoint was sunset on {sunset_on}.`
    pub(crate) fn sunset_notice() -> Self {
        Self {
            source: "This endpoint was sunset on {sunset_on}.".to_string(),
            segments: vec![
                Segment::Literal("This endpoint was sunset on ".to_string()),
                Segment::SunsetOn,
                Segment::Literal(".".to_string()),
            ],
        }
    }

    /// The template as written in configuration.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Render the template. Missing values render as empty strings.
    pub fn render(
        &self,
        sunset_on: Option<&DateTime<Utc>>,
        alternative_url: Option<&str>,
    ) -> String {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::SunsetOn => {
                    if let Some(sunset) = sunset_on {
                        out.push_str(&sunset.format("%Y-%m-%d %H:%M:%S%:z").to_string());
                    }
                }
                Segment::AlternativeUrl => out.push_str(alternative_url.unwrap_or_default()),
            }
        }
        out
    }
}

impl TryFrom<String> for MessageTemplate {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MessageTemplate> for String {
    fn from(template: MessageTemplate) -> Self {
        template.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sunset() -> DateTime<Utc> {
        "2024-01-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_render_placeholders() {
        let template =
            MessageTemplate::parse("API will sunset on {sunset_on}. Please use {alternative_url}")
                .unwrap();
        assert_eq!(
            template.render(Some(&sunset()), Some("https://api.example.com/v2")),
            "API will sunset on 2024-01-01 12:00:00+00:00. Please use https://api.example.com/v2"
        );
    }

    #[test]
    fn test_missing_values_render_empty() {
        let template = MessageTemplate::parse("[{alternative_url}]").unwrap();
        assert_eq!(template.render(None, None), "[]");
    }

    #[test]
    fn test_plain_message() {
        let template = MessageTemplate::parse("Gone for good.").unwrap();
        assert_eq!(template.render(Some(&sunset()), None), "Gone for good.");
    }

    #[test]
    fn test_escaped_braces() {
        let template = MessageTemplate::parse("{{\"sunset\": \"{sunset_on}\"}}").unwrap();
        assert_eq!(
            template.render(Some(&sunset()), None),
            "{\"sunset\": \"2024-01-01 12:00:00+00:00\"}"
        );
    }

    #[test]
    fn test_unknown_placeholder_rejected() {
        let err = MessageTemplate::parse("Here is an {incompatible} placeholder.").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnknownPlaceholder { ref placeholder, .. } if placeholder == "incompatible"
        ));
        assert!(err
            .to_string()
            .starts_with("only `sunset_on` and `alternative_url` are supported"));
    }

    #[test]
    fn test_unbalanced_brace_rejected() {
        assert!(matches!(
            MessageTemplate::parse("oops { here"),
            Err(ConfigError::UnbalancedBrace(_))
        ));
        assert!(matches!(
            MessageTemplate::parse("oops } here"),
            Err(ConfigError::UnbalancedBrace(_))
        ));
    }

    #[test]
    fn test_sunset_notice_matches_parsed_form() {
        let parsed = MessageTemplate::parse("This endpoint was sunset on {sunset_on}.").unwrap();
        assert_eq!(MessageTemplate::sunset_notice(), parsed);
    }

    #[test]
    fn test_deserialize_from_yaml() {
        let template: MessageTemplate = serde_yaml::from_str("\"Use {alternative_url}\"").unwrap();
        assert_eq!(template.as_str(), "Use {alternative_url}");
        assert!(serde_yaml::from_str::<MessageTemplate>("\"{nope}\"").is_err());
    }
}
