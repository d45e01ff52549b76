//! Header generation for API deprecation.
//!
//! Implements standard headers for API deprecation:
//! - Deprecation header (RFC 9745)
//! - Sunset header (RFC 8594)
//! - Link header pointing at the replacement and the deprecation policy

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use chrono::{DateTime, NaiveDateTime, Utc};

use crate::config::{EndpointSunset, HeaderNames};
use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
struct HeaderEntry {
    name: HeaderName,
    value: HeaderValue,
    /// Link-style headers may legitimately carry several values.
    multi: bool,
}

/// The deprecation header set of one endpoint.
///
/// Computed once when the endpoint is registered; applying it to a response
/// is idempotent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeprecationHeaders {
    entries: Vec<HeaderEntry>,
}

impl DeprecationHeaders {
    /// Build headers for a deprecated endpoint.
    pub fn for_endpoint(endpoint: &EndpointSunset, names: &HeaderNames) -> Result<Self> {
        let mut headers = Self::default();

        // Deprecation: @<unix seconds> or true
        let deprecation = match &endpoint.deprecated_at {
            Some(at) => format!("@{}", at.timestamp()),
            None => "true".to_string(),
        };
        headers.push(&names.deprecation, &deprecation, false)?;

        // Sunset: <HTTP-date>
        if let Some(sunset_on) = &endpoint.sunset_on {
            headers.push(&names.sunset, &format_http_date(sunset_on), false)?;
        }

        if let Some(url) = &endpoint.alternative_url {
            headers.push(&names.link, &format_link(url, "sunset"), true)?;
        }

        if let Some(url) = &endpoint.documentation_url {
            headers.push(&names.link, &format_link(url, "deprecation"), true)?;
        }

        Ok(headers)
    }

    fn push(&mut self, name: &HeaderName, value: &str, multi: bool) -> Result<()> {
        let value = HeaderValue::from_str(value).map_err(|_| ConfigError::InvalidHeaderValue {
            name: name.to_string(),
            value: value.to_string(),
        })?;
        self.entries.push(HeaderEntry {
            name: name.clone(),
            value,
            multi,
        });
        Ok(())
    }

    /// Attach the headers to `target`.
    ///
    /// Single-valued headers are replaced. Multi-valued headers are appended
    /// unless an identical value is already present, either as its own field
    /// line or as one element of a comma-separated field.
    pub fn apply_to(&self, target: &mut HeaderMap) {
        for entry in &self.entries {
            if entry.multi {
                let wanted = entry.value.as_bytes();
                let present = target
                    .get_all(&entry.name)
                    .iter()
                    .any(|existing| split_list(existing.as_bytes()).any(|e| e == wanted));
                if !present {
                    target.append(entry.name.clone(), entry.value.clone());
                }
            } else {
                target.insert(entry.name.clone(), entry.value.clone());
            }
        }
    }

    /// Iterate over name/value pairs in emission order.
    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &HeaderValue)> {
        self.entries.iter().map(|e| (&e.name, &e.value))
    }

    /// Headers as displayable string pairs.
    pub fn to_vec(&self) -> Vec<(String, String)> {
        self.iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Split a list-valued header field on top-level commas.
///
/// Commas inside `<...>` URI references and quoted strings do not separate
/// elements. Elements are trimmed of surrounding whitespace.
fn split_list(field: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut elements = Vec::new();
    let mut start = 0;
    let mut in_uri = false;
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, &b) in field.iter().enumerate() {
        if in_quotes {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_quotes = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'<' => in_uri = true,
            b'>' => in_uri = false,
            b'"' if !in_uri => in_quotes = true,
            b',' if !in_uri => {
                elements.push(&field[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    elements.push(&field[start..]);

    elements
        .into_iter()
        .map(<[u8]>::trim_ascii)
        .filter(|element| !element.is_empty())
}

fn format_link(url: &str, rel: &str) -> String {
    format!("<{}>; rel=\"{}\"", url, rel)
}

/// Format a datetime as an HTTP date (RFC 9110 IMF-fixdate).
/// Example: Sun, 06 Nov 1994 08:49:37 GMT
pub fn format_http_date(dt: &DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parse an HTTP date, falling back to RFC 3339.
pub fn parse_http_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Some(without_tz) = s.strip_suffix(" GMT") {
        if let Ok(naive) = NaiveDateTime::parse_from_str(without_tz, "%a, %d %b %Y %H:%M:%S") {
            return Some(naive.and_utc());
        }
    }

    s.parse::<DateTime<Utc>>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PeriodSchedule;
    use axum::http::header::LINK;

    fn test_endpoint() -> EndpointSunset {
        EndpointSunset {
            id: "test".to_string(),
            path: "/api/v1/deprecated".to_string(),
            methods: vec![],
            deprecated_at: Some("2023-06-01T00:00:00Z".parse().unwrap()),
            sunset_on: Some("2024-01-01T00:00:00Z".parse().unwrap()),
            alternative_url: Some("/api/v2/deprecated".to_string()),
            documentation_url: None,
            periods: PeriodSchedule::default(),
        }
    }

    fn build(endpoint: &EndpointSunset) -> HeaderMap {
        let headers = DeprecationHeaders::for_endpoint(endpoint, &HeaderNames::default()).unwrap();
        let mut map = HeaderMap::new();
        headers.apply_to(&mut map);
        map
    }

    #[test]
    fn test_deprecation_header_timestamp() {
        let map = build(&test_endpoint());
        assert_eq!(map["deprecation"], "@1685577600");
    }

    #[test]
    fn test_deprecation_header_without_date() {
        let mut endpoint = test_endpoint();
        endpoint.deprecated_at = None;
        let map = build(&endpoint);
        assert_eq!(map["deprecation"], "true");
    }

    #[test]
    fn test_sunset_header() {
        let map = build(&test_endpoint());
        assert_eq!(map["sunset"], "Mon, 01 Jan 2024 00:00:00 GMT");
    }

    #[test]
    fn test_sunset_header_only_when_configured() {
        let mut endpoint = test_endpoint();
        endpoint.sunset_on = None;
        let map = build(&endpoint);
        assert!(!map.contains_key("sunset"));
        assert!(map.contains_key("deprecation"));
    }

    #[test]
    fn test_link_header() {
        let map = build(&test_endpoint());
        assert_eq!(map[LINK], "</api/v2/deprecated>; rel=\"sunset\"");
    }

    #[test]
    fn test_link_headers_with_documentation() {
        let mut endpoint = test_endpoint();
        endpoint.documentation_url = Some("https://docs.example.com/policy".to_string());
        let map = build(&endpoint);
        let links: Vec<_> = map.get_all(LINK).iter().collect();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0], "</api/v2/deprecated>; rel=\"sunset\"");
        assert_eq!(links[1], "<https://docs.example.com/policy>; rel=\"deprecation\"");
    }

    #[test]
    fn test_no_link_without_urls() {
        let mut endpoint = test_endpoint();
        endpoint.alternative_url = None;
        let map = build(&endpoint);
        assert!(!map.contains_key(LINK));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let headers =
            DeprecationHeaders::for_endpoint(&test_endpoint(), &HeaderNames::default()).unwrap();
        let mut map = HeaderMap::new();
        map.append(LINK, HeaderValue::from_static("</next>; rel=\"next\""));
        map.insert("deprecation", HeaderValue::from_static("garbage"));

        headers.apply_to(&mut map);
        let once = map.clone();
        headers.apply_to(&mut map);

        assert_eq!(map, once);
        assert_eq!(map.get_all("deprecation").iter().count(), 1);
        assert_eq!(map["deprecation"], "@1685577600");
        assert_eq!(map.get_all("sunset").iter().count(), 1);
        let links: Vec<_> = map.get_all(LINK).iter().collect();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0], "</next>; rel=\"next\"");
    }

    #[test]
    fn test_apply_skips_link_inside_joined_field() {
        let headers =
            DeprecationHeaders::for_endpoint(&test_endpoint(), &HeaderNames::default()).unwrap();
        let mut map = HeaderMap::new();
        map.insert(
            LINK,
            HeaderValue::from_static("</p/2>; rel=\"next\", </api/v2/deprecated>; rel=\"sunset\""),
        );

        headers.apply_to(&mut map);

        let links: Vec<_> = map.get_all(LINK).iter().collect();
        assert_eq!(links.len(), 1);
        assert_eq!(
            links[0],
            "</p/2>; rel=\"next\", </api/v2/deprecated>; rel=\"sunset\""
        );
    }

    #[test]
    fn test_split_list_respects_uris_and_quotes() {
        let field = br#"<https://a.example/x,y>; rel="next", <https://b.example/>; title="a, b",,"#;
        let elements: Vec<_> = split_list(field).collect();
        assert_eq!(
            elements,
            vec![
                &br#"<https://a.example/x,y>; rel="next""#[..],
                &br#"<https://b.example/>; title="a, b""#[..],
            ]
        );
    }

    #[test]
    fn test_custom_header_names() {
        let names = HeaderNames {
            sunset: HeaderName::from_static("x-api-sunset"),
            ..HeaderNames::default()
        };
        let headers = DeprecationHeaders::for_endpoint(&test_endpoint(), &names).unwrap();
        let pairs = headers.to_vec();
        assert!(pairs.iter().any(|(n, _)| n == "x-api-sunset"));
        assert!(!pairs.iter().any(|(n, _)| n == "sunset"));
    }

    #[test]
    fn test_invalid_link_value_rejected() {
        let mut endpoint = test_endpoint();
        endpoint.alternative_url = Some("https://example.com/\nevil".to_string());
        assert!(matches!(
            DeprecationHeaders::for_endpoint(&endpoint, &HeaderNames::default()),
            Err(ConfigError::InvalidHeaderValue { .. })
        ));
    }

    #[test]
    fn test_http_date_round_trip() {
        let dt: DateTime<Utc> = "2025-06-01T12:00:00Z".parse().unwrap();
        let formatted = format_http_date(&dt);
        assert_eq!(formatted, "Sun, 01 Jun 2025 12:00:00 GMT");
        assert_eq!(parse_http_date(&formatted), Some(dt));
    }

    #[test]
    fn test_parse_http_date_fallbacks() {
        assert!(parse_http_date("2025-06-01T12:00:00Z").is_some());
        assert!(parse_http_date("not a date").is_none());
    }
}
