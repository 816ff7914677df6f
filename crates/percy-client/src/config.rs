//! Client configuration sourced from environment variables.
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `PERCY_API` | API base URL | `https://percy.io/api/v1` |
//! | `PERCY_TOKEN` | project token | none, checked on access |
//! | `PERCY_DEFAULT_WIDTHS` | comma-separated snapshot widths | none |
//! | `PERCY_ENABLE` | `1` enables uploads, anything else disables | `1` |

use std::fmt;

use percy_env::{parse_count, EnvSource, ProcessEnv};
use tracing::warn;

use crate::error::{PercyError, Result};

/// Production API endpoint.
pub const DEFAULT_API_URL: &str = "https://percy.io/api/v1";

/// Percy client configuration.
#[derive(Clone)]
pub struct Config {
    api_url: String,
    access_token: Option<String>,
    default_widths: Vec<u32>,
    enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: DEFAULT_API_URL.to_string(),
            access_token: None,
            default_widths: Vec::new(),
            enabled: true,
        }
    }
}

impl Config {
    /// Config with defaults and no token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new config from the process environment.
    pub fn from_env() -> Self {
        Self::from_source(&ProcessEnv)
    }

    /// Create a config from an injected environment source.
    pub fn from_source(env: &dyn EnvSource) -> Self {
        Config {
            api_url: env
                .var("PERCY_API")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            access_token: env.var("PERCY_TOKEN"),
            default_widths: env
                .var("PERCY_DEFAULT_WIDTHS")
                .map(|raw| parse_widths(&raw))
                .unwrap_or_default(),
            // Only an unset flag defaults to enabled; an empty one disables.
            enabled: env.raw_var("PERCY_ENABLE").map_or(true, |flag| flag == "1"),
        }
    }

    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    /// Set authentication token
    pub fn with_access_token(mut self, token: &str) -> Self {
        self.access_token = Some(token.to_string());
        self
    }

    pub fn with_default_widths(mut self, widths: Vec<u32>) -> Self {
        self.default_widths = widths;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Project token.
    ///
    /// # Errors
    ///
    /// [`PercyError::Auth`] when no token is configured. The check happens
    /// here rather than at construction so a disabled client never needs one.
    pub fn access_token(&self) -> Result<&str> {
        self.access_token
            .as_deref()
            .ok_or_else(|| PercyError::Auth("PERCY_TOKEN is not set".to_string()))
    }

    pub fn default_widths(&self) -> &[u32] {
        &self.default_widths
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_url", &self.api_url)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("default_widths", &self.default_widths)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Parse a comma-separated width list. Invalid entries are dropped with a
/// warning.
pub fn parse_widths(raw: &str) -> Vec<u32> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let width = parse_count(entry);
            if width.is_none() {
                warn!(entry = %entry, "ignoring invalid PERCY_DEFAULT_WIDTHS entry");
            }
            width
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use percy_env::MapEnv;

    #[test]
    fn defaults_without_environment() {
        let config = Config::from_source(&MapEnv::new());
        assert_eq!(config.api_url(), DEFAULT_API_URL);
        assert!(config.default_widths().is_empty());
        assert!(config.enabled());
    }

    #[test]
    fn missing_token_fails_only_on_access() {
        let config = Config::from_source(&MapEnv::new());
        assert!(matches!(config.access_token(), Err(PercyError::Auth(_))));

        let config = config.with_access_token("abc");
        assert_eq!(config.access_token().unwrap(), "abc");
    }

    #[test]
    fn reads_environment_values() {
        let env = MapEnv::from_pairs([
            ("PERCY_API", "http://localhost:9090/api/v1"),
            ("PERCY_TOKEN", "secret"),
            ("PERCY_DEFAULT_WIDTHS", "375, 1280"),
            ("PERCY_ENABLE", "0"),
        ]);
        let config = Config::from_source(&env);
        assert_eq!(config.api_url(), "http://localhost:9090/api/v1");
        assert_eq!(config.access_token().unwrap(), "secret");
        assert_eq!(config.default_widths(), &[375, 1280]);
        assert!(!config.enabled());
    }

    #[test]
    fn enable_flag_only_defaults_when_unset() {
        assert!(Config::from_source(&MapEnv::new()).enabled());
        assert!(Config::from_source(&MapEnv::from_pairs([("PERCY_ENABLE", "1")])).enabled());
        assert!(!Config::from_source(&MapEnv::from_pairs([("PERCY_ENABLE", "")])).enabled());
        assert!(!Config::from_source(&MapEnv::from_pairs([("PERCY_ENABLE", "true")])).enabled());
    }

    #[test]
    fn invalid_widths_are_dropped() {
        assert_eq!(parse_widths("320,wide,,-5,1024"), vec![320, 1024]);
        assert!(parse_widths("").is_empty());
    }

    #[test]
    fn debug_redacts_token() {
        let config = Config::new().with_access_token("super-secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn api_url_override_drops_trailing_slash() {
        let config = Config::new().with_api_url("http://127.0.0.1:8080/api/v1/");
        assert_eq!(config.api_url(), "http://127.0.0.1:8080/api/v1");
    }
}
