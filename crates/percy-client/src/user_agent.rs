//! `User-Agent` header sent with every API request.

use std::sync::OnceLock;

use percy_env::CiProvider;
use regex::Regex;

use crate::config::Config;

const CLIENT_NAME: &str = "percy-client-rust";

fn api_version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w+$").unwrap_or_else(|e| unreachable!("static regex: {e}")))
}

/// API version taken from the last path segment of the API URL, e.g. `v1`.
pub fn api_version(api_url: &str) -> Option<&str> {
    api_version_regex().find(api_url).map(|m| m.as_str())
}

/// Build the user agent, e.g.
/// `Percy/v1 percy-client-rust/0.1.0 (rust; travis)`.
pub fn user_agent(config: &Config, ci: Option<CiProvider>) -> String {
    let mut client = Vec::with_capacity(2);
    if let Some(version) = api_version(config.api_url()) {
        client.push(format!("Percy/{version}"));
    }
    client.push(format!("{CLIENT_NAME}/{}", env!("CARGO_PKG_VERSION")));

    let mut environment = vec!["rust"];
    if let Some(ci) = ci {
        environment.push(ci.name());
    }

    format!("{} ({})", client.join(" "), environment.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn includes_api_version_and_ci() {
        let agent = user_agent(&Config::new(), Some(CiProvider::Travis));
        assert_eq!(
            agent,
            format!(
                "Percy/v1 percy-client-rust/{} (rust; travis)",
                env!("CARGO_PKG_VERSION")
            )
        );
    }

    #[test]
    fn omits_ci_outside_ci() {
        let agent = user_agent(&Config::new(), None);
        assert!(agent.ends_with("(rust)"));
    }

    #[test]
    fn api_version_is_last_word() {
        assert_eq!(api_version("http://localhost/api/v2"), Some("v2"));
        assert_eq!(api_version("http://localhost/"), None);
    }
}
