//! Injected key/value lookup for environment variables.
//!
//! Resolution never reads `std::env` directly; it goes through an
//! [`EnvSource`] so tests can swap in a [`MapEnv`] and mutate it between
//! resolutions.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Read-only view of environment variables.
pub trait EnvSource: Send + Sync {
    /// Raw value of `key`, exactly as stored.
    fn raw_var(&self, key: &str) -> Option<String>;

    /// Value of `key`, with empty strings treated as unset.
    fn var(&self, key: &str) -> Option<String> {
        self.raw_var(key).filter(|value| !value.is_empty())
    }

    /// Whether `key` is set to a non-empty value.
    fn is_set(&self, key: &str) -> bool {
        self.var(key).is_some()
    }

    /// Whether `key` is set to exactly `expected`.
    fn equals(&self, key: &str, expected: &str) -> bool {
        self.var(key).as_deref() == Some(expected)
    }
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn raw_var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// In-memory environment.
///
/// Clones share the same map, so a test can hand one clone to an
/// `Environment` and keep mutating the other.
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(key, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let env = Self::new();
        for (key, value) in pairs {
            env.set(key, value);
        }
        env
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.lock().insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) {
        self.lock().remove(key);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.vars.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EnvSource for MapEnv {
    fn raw_var(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }
}

/// Parse a count such as a shard total.
///
/// Only non-empty, all-ASCII-digit strings that fit in a `u32` parse;
/// anything else is treated as absent rather than an error.
pub fn parse_count(raw: &str) -> Option<u32> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_values_read_as_unset() {
        let env = MapEnv::from_pairs([("PERCY_BRANCH", "")]);
        assert_eq!(env.raw_var("PERCY_BRANCH").as_deref(), Some(""));
        assert_eq!(env.var("PERCY_BRANCH"), None);
        assert!(!env.is_set("PERCY_BRANCH"));
    }

    #[test]
    fn clones_share_state() {
        let env = MapEnv::new();
        let view = env.clone();
        env.set("DRONE", "true");
        assert!(view.equals("DRONE", "true"));
        env.remove("DRONE");
        assert!(!view.is_set("DRONE"));
    }

    #[test]
    fn parse_count_accepts_digits_only() {
        assert_eq!(parse_count("3"), Some(3));
        assert_eq!(parse_count("007"), Some(7));
        assert_eq!(parse_count(""), None);
        assert_eq!(parse_count("-1"), None);
        assert_eq!(parse_count("3 "), None);
        assert_eq!(parse_count("three"), None);
        assert_eq!(parse_count("99999999999999999999"), None);
    }
}
