//! Tracing initialisation for the `percy` binary.
//!
//! Logs go to stderr so `percy env` output on stdout stays machine-readable.

use std::io;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose events follow the `--verbose` level; everything else logs
/// warnings only.
const PERCY_TARGETS: [&str; 3] = ["percy", "percy_client", "percy_env"];

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` wins over `level` when set. With `json`, events are written as
/// newline-delimited JSON including their target. Only the first call takes
/// effect.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    let json_layer = json.then(|| fmt::layer().json().with_writer(io::stderr));
    let text_layer = (!json).then(|| fmt::layer().with_target(false).with_writer(io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .ok();
}

fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    let mut directives = String::from("warn");
    for target in PERCY_TARGETS {
        directives.push_str(&format!(",{target}={level}"));
    }
    directives
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_scope_level_to_percy_crates() {
        let directives = default_directives(Level::DEBUG);
        assert_eq!(
            directives,
            "warn,percy=debug,percy_client=debug,percy_env=debug"
        );
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn repeated_init_is_harmless() {
        init_tracing(false, Level::INFO);
        init_tracing(true, Level::DEBUG);
    }
}
