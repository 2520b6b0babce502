//! Configuration: poll loop settings, per-resource timeouts and provider settings.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{ProviderError, WaitError};

/// Default timeout of a resource operation when nothing more specific applies.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Public Aiven API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.aiven.io";

/// Environment variable holding the API token.
pub const TOKEN_ENV: &str = "AIVEN_TOKEN";

/// Environment variable overriding the API endpoint.
pub const BASE_URL_ENV: &str = "AIVEN_WEB_URL";

/// How the sleep between two polls evolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Sleep `poll_interval` between every poll.
    Fixed,
    /// Start at `min_poll_interval` and double up to `poll_interval`.
    #[default]
    Exponential,
}

/// Settings of one poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitConfig {
    /// Time before the first poll.
    pub initial_delay: Duration,
    /// Time between polls; the ceiling when backing off.
    pub poll_interval: Duration,
    /// Floor of the time between polls.
    pub min_poll_interval: Duration,
    /// Absolute deadline of the wait, measured from its start.
    pub timeout: Duration,
    /// Consecutive target observations needed before the wait succeeds.
    pub required_consecutive_successes: u32,
    /// Sleep policy between polls.
    pub backoff: Backoff,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            poll_interval: Duration::from_secs(10),
            min_poll_interval: Duration::from_millis(100),
            timeout: DEFAULT_TIMEOUT,
            required_consecutive_successes: 1,
            backoff: Backoff::Exponential,
        }
    }
}

impl WaitConfig {
    /// Default settings with the given deadline.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }

    /// Set the delay before the first poll.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the (maximum) interval between polls.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the minimum interval between polls.
    ///
    /// Raises `poll_interval` as well if it would fall below the new floor.
    pub fn with_min_poll_interval(mut self, interval: Duration) -> Self {
        self.min_poll_interval = interval;
        if self.poll_interval < interval {
            self.poll_interval = interval;
        }
        self
    }

    /// Set the deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set how many consecutive target observations end the wait.
    pub fn with_required_consecutive_successes(mut self, count: u32) -> Self {
        self.required_consecutive_successes = count;
        self
    }

    /// Set the sleep policy.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Check the invariants of this configuration.
    pub fn validate(&self) -> Result<(), WaitError> {
        if self.timeout.is_zero() {
            return Err(WaitError::InvalidConfig(
                "timeout must be greater than zero".to_string(),
            ));
        }
        if self.poll_interval < self.min_poll_interval {
            return Err(WaitError::InvalidConfig(format!(
                "poll interval {:?} is below the minimum poll interval {:?}",
                self.poll_interval, self.min_poll_interval
            )));
        }
        if self.required_consecutive_successes == 0 {
            return Err(WaitError::InvalidConfig(
                "at least one successful observation is required".to_string(),
            ));
        }
        Ok(())
    }

    /// The sleep following one that lasted `previous`.
    pub(crate) fn next_interval(&self, previous: Option<Duration>) -> Duration {
        match (self.backoff, previous) {
            (Backoff::Fixed, _) => self.poll_interval,
            (Backoff::Exponential, None) => self.min_poll_interval.max(Duration::from_millis(1)),
            (Backoff::Exponential, Some(previous)) => previous
                .saturating_mul(2)
                .clamp(self.min_poll_interval, self.poll_interval),
        }
    }
}

/// Operation timeouts of one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceTimeouts {
    /// Deadline of create waits.
    pub create: Duration,
    /// Deadline of read waits.
    pub read: Duration,
    /// Deadline of update waits.
    pub update: Duration,
    /// Deadline of delete waits.
    pub delete: Duration,
}

impl Default for ResourceTimeouts {
    fn default() -> Self {
        Self {
            create: DEFAULT_TIMEOUT,
            read: DEFAULT_TIMEOUT,
            update: DEFAULT_TIMEOUT,
            delete: DEFAULT_TIMEOUT,
        }
    }
}

impl ResourceTimeouts {
    /// Services (all service types).
    pub fn service() -> Self {
        Self::default()
    }

    /// Kafka topics.
    pub fn kafka_topic() -> Self {
        Self {
            create: Duration::from_secs(5 * 60),
            read: Duration::from_secs(10 * 60),
            delete: Duration::from_secs(2 * 60),
            ..Self::default()
        }
    }

    /// Databases.
    pub fn database() -> Self {
        Self {
            delete: Duration::from_secs(2 * 60),
            ..Self::default()
        }
    }

    /// AWS and Azure privatelinks.
    pub fn privatelink() -> Self {
        Self::default()
    }

    /// Static IP addresses.
    pub fn static_ip() -> Self {
        Self::default()
    }

    /// Apply a user supplied `timeouts` object such as `{"create": "30m"}`.
    ///
    /// Missing or null entries keep their defaults.
    pub fn with_overrides(mut self, value: Option<&serde_json::Value>) -> Result<Self, ProviderError> {
        let Some(serde_json::Value::Object(map)) = value else {
            return Ok(self);
        };
        for (key, raw) in map {
            let Some(text) = raw.as_str() else {
                if raw.is_null() {
                    continue;
                }
                return Err(ProviderError::Validation(format!(
                    "timeouts.{key} must be a duration string"
                )));
            };
            let duration = parse_duration(text)?;
            match key.as_str() {
                "create" => self.create = duration,
                "read" => self.read = duration,
                "update" => self.update = duration,
                "delete" => self.delete = duration,
                "default" => {
                    self.create = duration;
                    self.read = duration;
                    self.update = duration;
                    self.delete = duration;
                },
                other => {
                    return Err(ProviderError::Validation(format!(
                        "unknown timeout '{other}'"
                    )))
                },
            }
        }
        Ok(self)
    }
}

/// Longest duration [`parse_duration`] accepts, about 292 years.
pub const MAX_DURATION: Duration = Duration::from_nanos(i64::MAX as u64);

/// Parse a Go style duration such as `"20m"`, `"1h30m"` or `"1.5s"`.
pub fn parse_duration(text: &str) -> Result<Duration, ProviderError> {
    let invalid = || ProviderError::Validation(format!("invalid duration '{text}'"));
    let mut rest = text.trim();
    if rest.is_empty() {
        return Err(invalid());
    }
    if rest == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = 0f64;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        if number_len == 0 {
            return Err(invalid());
        }
        let value: f64 = rest[..number_len].parse().map_err(|_| invalid())?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let seconds = match &rest[..unit_len] {
            "h" => 3600.0,
            "m" => 60.0,
            "s" => 1.0,
            "ms" => 0.001,
            _ => return Err(invalid()),
        };
        rest = &rest[unit_len..];
        total += value * seconds;
    }
    if !total.is_finite() || total > MAX_DURATION.as_secs_f64() {
        return Err(invalid());
    }
    Duration::try_from_secs_f64(total).map_err(|_| invalid())
}

/// Provider level settings supplied by `configure`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProviderConfig {
    /// API token; falls back to `AIVEN_TOKEN`.
    #[serde(default)]
    pub api_token: Option<String>,
    /// API endpoint; falls back to `AIVEN_WEB_URL`, then the public API.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Extra user agent suffix.
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl ProviderConfig {
    /// Parse the provider configuration object; `null` yields the defaults.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ProviderError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(value)?)
    }

    /// The token to authenticate with.
    pub fn resolve_token(&self) -> Option<String> {
        self.api_token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty()))
    }

    /// The API endpoint to talk to, without trailing slash.
    pub fn resolve_base_url(&self) -> String {
        self.base_url
            .clone()
            .or_else(|| std::env::var(BASE_URL_ENV).ok())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wait_config_validate() {
        assert!(WaitConfig::default().validate().is_ok());
        assert!(WaitConfig::new(Duration::ZERO).validate().is_err());

        let config = WaitConfig {
            poll_interval: Duration::from_secs(1),
            min_poll_interval: Duration::from_secs(2),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(WaitError::InvalidConfig(_))));

        let config = WaitConfig::default().with_required_consecutive_successes(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_poll_interval_raises_ceiling() {
        let config = WaitConfig::default().with_min_poll_interval(Duration::from_secs(20));
        assert_eq!(config.poll_interval, Duration::from_secs(20));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_exponential_interval() {
        let config = WaitConfig::default()
            .with_min_poll_interval(Duration::from_secs(2))
            .with_poll_interval(Duration::from_secs(10));
        let first = config.next_interval(None);
        assert_eq!(first, Duration::from_secs(2));
        let second = config.next_interval(Some(first));
        assert_eq!(second, Duration::from_secs(4));
        let third = config.next_interval(Some(Duration::from_secs(8)));
        assert_eq!(third, Duration::from_secs(10));
    }

    #[test]
    fn test_fixed_interval() {
        let config = WaitConfig::default()
            .with_backoff(Backoff::Fixed)
            .with_poll_interval(Duration::from_secs(3));
        assert_eq!(config.next_interval(None), Duration::from_secs(3));
        assert_eq!(
            config.next_interval(Some(Duration::from_secs(3))),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("20m").unwrap(), Duration::from_secs(1200));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert!(parse_duration("").is_err());
        assert!(parse_duration("20").is_err());
        assert!(parse_duration("m20").is_err());
        assert!(parse_duration("5d").is_err());
        assert!(parse_duration("99999999999999999999999h").is_err());
        assert!(parse_duration("1e400s").is_err());
        assert!(parse_duration("2562048h").is_err());
        assert_eq!(parse_duration("2562047h").unwrap(), Duration::from_secs(2562047 * 3600));

        let raw = json!({"create": "99999999999999999999999h"});
        assert!(ResourceTimeouts::service().with_overrides(Some(&raw)).is_err());
    }

    #[test]
    fn test_resource_timeouts_defaults() {
        let topic = ResourceTimeouts::kafka_topic();
        assert_eq!(topic.create, Duration::from_secs(300));
        assert_eq!(topic.read, Duration::from_secs(600));
        assert_eq!(topic.delete, Duration::from_secs(120));
        assert_eq!(ResourceTimeouts::service().create, DEFAULT_TIMEOUT);
        assert_eq!(ResourceTimeouts::database().delete, Duration::from_secs(120));
    }

    #[test]
    fn test_resource_timeouts_overrides() {
        let raw = json!({"create": "30m", "delete": null});
        let timeouts = ResourceTimeouts::service()
            .with_overrides(Some(&raw))
            .unwrap();
        assert_eq!(timeouts.create, Duration::from_secs(1800));
        assert_eq!(timeouts.delete, DEFAULT_TIMEOUT);

        let raw = json!({"destroy": "1m"});
        assert!(ResourceTimeouts::service().with_overrides(Some(&raw)).is_err());

        let raw = json!({"create": 5});
        assert!(ResourceTimeouts::service().with_overrides(Some(&raw)).is_err());

        assert_eq!(
            ResourceTimeouts::static_ip().with_overrides(None).unwrap(),
            ResourceTimeouts::static_ip()
        );
    }

    #[test]
    fn test_provider_config_from_value() {
        let config = ProviderConfig::from_value(json!({
            "api_token": "secret",
            "base_url": "https://api.example.com/"
        }))
        .unwrap();
        assert_eq!(config.resolve_token().as_deref(), Some("secret"));
        assert_eq!(config.resolve_base_url(), "https://api.example.com");

        let config = ProviderConfig::from_value(serde_json::Value::Null).unwrap();
        assert_eq!(config, ProviderConfig::default());

        assert!(ProviderConfig::from_value(json!({"api_token": 7})).is_err());
    }
}
