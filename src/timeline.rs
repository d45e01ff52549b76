//! Sunset timeline classification.
//!
//! The time around `sunset_on` is split into four periods:
//!
//! ```text
//!    upcoming        pre-sunset grace          post-sunset grace        sunset
//! ............|<---- pre_sunset_grace ---->|<---- post_sunset_grace ---->|..........
//!                                      sunset_on
//! ```
//!
//! Intervals are half open: a boundary instant belongs to the later period.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

/// One of the four periods of an endpoint's sunset timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    /// Before the pre-sunset grace period starts.
    Upcoming,
    /// Between `sunset_on - pre_sunset_grace` and `sunset_on`.
    PreSunsetGrace,
    /// Between `sunset_on` and `sunset_on + post_sunset_grace`.
    PostSunsetGrace,
    /// After the post-sunset grace period ends.
    Sunset,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Upcoming => "upcoming",
            Period::PreSunsetGrace => "pre_sunset_grace",
            Period::PostSunsetGrace => "post_sunset_grace",
            Period::Sunset => "sunset",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The instants that delimit the periods of one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SunsetTimeline {
    pub sunset_on: Option<DateTime<Utc>>,
    pub pre_sunset_grace: TimeDelta,
    pub post_sunset_grace: TimeDelta,
}

impl SunsetTimeline {
    pub fn new(
        sunset_on: Option<DateTime<Utc>>,
        pre_sunset_grace: TimeDelta,
        post_sunset_grace: TimeDelta,
    ) -> Self {
        Self {
            sunset_on,
            pre_sunset_grace,
            post_sunset_grace,
        }
    }

    /// Classify `as_of` into a period.
    ///
    /// Without a sunset date the endpoint stays in [`Period::Upcoming`] forever.
    pub fn period_at(&self, as_of: DateTime<Utc>) -> Period {
        let Some(sunset_on) = self.sunset_on else {
            return Period::Upcoming;
        };

        // A boundary outside chrono's range can never be crossed.
        let grace_starts = sunset_on.checked_sub_signed(self.pre_sunset_grace);
        let grace_ends = sunset_on.checked_add_signed(self.post_sunset_grace);

        let period = if grace_starts.is_some_and(|start| as_of < start) {
            Period::Upcoming
        } else if as_of < sunset_on {
            Period::PreSunsetGrace
        } else if grace_ends.map_or(true, |end| as_of < end) {
            Period::PostSunsetGrace
        } else {
            Period::Sunset
        };

        trace!(%as_of, %sunset_on, %period, "classified instant on sunset timeline");
        period
    }

    /// Whole days from `as_of` until the sunset date, rounded down, so any
    /// instant past the sunset gives a negative count.
    pub fn days_until_sunset(&self, as_of: DateTime<Utc>) -> Option<i64> {
        const SECONDS_PER_DAY: i64 = 86_400;
        self.sunset_on
            .map(|sunset| (sunset - as_of).num_seconds().div_euclid(SECONDS_PER_DAY))
    }
}

/// Serde support for grace period lengths.
///
/// Accepts an integer number of seconds or a string such as `7d`, `1d12h`,
/// `90m`. Units: `w`, `d`, `h`, `m`, `s`.
pub mod duration {
    use chrono::TimeDelta;
    use regex::Regex;
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::sync::LazyLock;

    use crate::error::ConfigError;

    static WHOLE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(?:\d+[wdhms])+$").expect("static regex"));
    static GROUP: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(\d+)([wdhms])").expect("static regex"));

    const UNITS: [(char, i64); 5] = [
        ('w', 7 * 24 * 3600),
        ('d', 24 * 3600),
        ('h', 3600),
        ('m', 60),
        ('s', 1),
    ];

    /// Parse a duration string.
    pub fn parse(input: &str) -> Result<TimeDelta, ConfigError> {
        let text: String = input.chars().filter(|c| !c.is_whitespace()).collect();
        let invalid = || ConfigError::InvalidDuration(input.to_string());

        if let Ok(seconds) = text.parse::<i64>() {
            return if seconds >= 0 {
                TimeDelta::try_seconds(seconds).ok_or_else(invalid)
            } else {
                Err(invalid())
            };
        }

        if !WHOLE.is_match(&text) {
            return Err(invalid());
        }

        let mut total: i64 = 0;
        for caps in GROUP.captures_iter(&text) {
            let amount: i64 = caps[1].parse().map_err(|_| invalid())?;
            let unit = caps[2].chars().next().ok_or_else(invalid)?;
            let scale = UNITS
                .iter()
                .find(|(u, _)| *u == unit)
                .map(|(_, s)| *s)
                .ok_or_else(invalid)?;
            total = amount
                .checked_mul(scale)
                .and_then(|secs| total.checked_add(secs))
                .ok_or_else(invalid)?;
        }

        TimeDelta::try_seconds(total).ok_or_else(invalid)
    }

    /// Render a duration with the largest units first, e.g. `1d12h`.
    pub fn format(delta: &TimeDelta) -> String {
        let mut remaining = delta.num_seconds();
        if remaining <= 0 {
            return "0s".to_string();
        }

        let mut out = String::new();
        for (unit, scale) in UNITS {
            let amount = remaining / scale;
            if amount > 0 {
                out.push_str(&format!("{amount}{unit}"));
                remaining -= amount * scale;
            }
        }
        out
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(delta: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(delta))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeDelta, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Seconds(secs) => i64::try_from(secs)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .ok_or_else(|| de::Error::custom(format!("duration of {secs} seconds is too large"))),
            Raw::Text(text) => parse(&text).map_err(de::Error::custom),
        }
    }
}
