use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use reqwest::Url;
use serde::Deserialize;

#[derive(Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Base URL of the image API.
    pub api_url: String,
    /// Search term sent with every random-photo request.
    pub query: String,
    /// Client access key. Fetches fail with a configuration error while unset.
    pub access_key: Option<String>,
    /// How many fetched photos are kept for backward navigation.
    pub cache_capacity: usize,
    /// Auto-advance period while playing.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Per-request timeout for the image API.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Start playing as soon as the session is up.
    pub autoplay: bool,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        let url = Url::parse(&self.api_url)
            .with_context(|| format!("api-url {:?} is not a valid url", self.api_url))?;
        ensure!(
            matches!(url.scheme(), "http" | "https"),
            "api-url must use http or https"
        );
        ensure!(!self.query.trim().is_empty(), "query must not be empty");
        ensure!(
            self.cache_capacity > 0,
            "cache-capacity must be greater than zero"
        );
        ensure!(!self.interval.is_zero(), "interval must be positive");
        ensure!(
            !self.request_timeout.is_zero(),
            "request-timeout must be positive"
        );
        Ok(self)
    }

    /// The access key, if one is set and not blank.
    pub fn access_key(&self) -> Option<&str> {
        self.access_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            api_url: "https://api.unsplash.com".into(),
            query: "pelican".into(),
            access_key: None,
            cache_capacity: 5,
            interval: Duration::from_millis(2000),
            request_timeout: Duration::from_secs(10),
            autoplay: false,
        }
    }
}

// Hand-written so the access key never reaches the logs.
impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("api_url", &self.api_url)
            .field("query", &self.query)
            .field(
                "access_key",
                &self.access_key().map(|_| "<redacted>"),
            )
            .field("cache_capacity", &self.cache_capacity)
            .field("interval", &humantime::format_duration(self.interval))
            .field(
                "request_timeout",
                &humantime::format_duration(self.request_timeout),
            )
            .field("autoplay", &self.autoplay)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_slideshow_constants() {
        let cfg = Configuration::default();
        assert_eq!(cfg.cache_capacity, 5);
        assert_eq!(cfg.interval, Duration::from_secs(2));
        assert!(cfg.access_key().is_none());
        assert!(cfg.validated().is_ok());
    }

    #[test]
    fn blank_access_key_counts_as_missing() {
        let cfg = Configuration {
            access_key: Some("   ".into()),
            ..Configuration::default()
        };
        assert!(cfg.access_key().is_none());
    }

    #[test]
    fn debug_output_redacts_key() {
        let cfg = Configuration {
            access_key: Some("secret-key".into()),
            ..Configuration::default()
        };
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("secret-key"));
        assert!(dbg.contains("<redacted>"));
    }
}
