//! Rate-limit expressions such as `20/minute`, `10 per second` or `100/2 hours`.

use std::{fmt, str::FromStr, time::Duration};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateLimitSpecError {
    #[error("empty rate limit expression")]
    Empty,
    #[error("expected `N/unit` or `N per unit`, got {0:?}")]
    Format(String),
    #[error("invalid number in rate limit {0:?}")]
    Number(String),
    #[error("rate limit numbers must be at least 1 in {0:?}")]
    Zero(String),
    #[error("unknown time unit in rate limit {0:?}")]
    Unit(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
}

impl TimeUnit {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "second" | "seconds" => Some(Self::Second),
            "minute" | "minutes" => Some(Self::Minute),
            "hour" | "hours" => Some(Self::Hour),
            "day" | "days" => Some(Self::Day),
            _ => None,
        }
    }

    pub fn as_secs(self) -> u64 {
        match self {
            Self::Second => 1,
            Self::Minute => 60,
            Self::Hour => 3_600,
            Self::Day => 86_400,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
        }
    }
}

/// `max_requests` allowed per `multiple` x `unit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct RateLimitSpec {
    pub max_requests: u32,
    pub multiple: u32,
    pub unit: TimeUnit,
}

impl RateLimitSpec {
    pub const fn per_minute(max_requests: u32) -> Self {
        Self { max_requests, multiple: 1, unit: TimeUnit::Minute }
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.unit.as_secs() * u64::from(self.multiple))
    }
}

impl FromStr for RateLimitSpec {
    type Err = RateLimitSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().to_ascii_lowercase();
        if raw.is_empty() {
            return Err(RateLimitSpecError::Empty);
        }
        let (count, window) = raw
            .split_once('/')
            .or_else(|| raw.split_once(" per "))
            .ok_or_else(|| RateLimitSpecError::Format(s.to_string()))?;

        let max_requests = parse_positive(count.trim(), s)?;
        let mut parts = window.split_whitespace();
        let (multiple, unit) = match (parts.next(), parts.next(), parts.next()) {
            (Some(unit), None, None) => (1, unit),
            (Some(n), Some(unit), None) => (parse_positive(n, s)?, unit),
            _ => return Err(RateLimitSpecError::Format(s.to_string())),
        };
        let unit = TimeUnit::parse(unit).ok_or_else(|| RateLimitSpecError::Unit(s.to_string()))?;
        Ok(Self { max_requests, multiple, unit })
    }
}

impl TryFrom<String> for RateLimitSpec {
    type Error = RateLimitSpecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for RateLimitSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} per {} {}", self.max_requests, self.multiple, self.unit.as_str())
    }
}

/// Rate-limited routes; each maps to its own expression in the settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteKey {
    Chat,
    RouteOptions,
}

impl RouteKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::RouteOptions => "route_options",
        }
    }
}

fn parse_positive(raw: &str, expr: &str) -> Result<u32, RateLimitSpecError> {
    match raw.parse::<u32>() {
        Ok(0) => Err(RateLimitSpecError::Zero(expr.to_string())),
        Ok(n) => Ok(n),
        Err(_) => Err(RateLimitSpecError::Number(expr.to_string())),
    }
}
