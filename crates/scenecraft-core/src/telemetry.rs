//! Tracing setup shared by the `scenecraft` and `scenecraftd` binaries.
//!
//! Log lines go to stderr; stdout belongs to command output (sanitized
//! scripts, validation JSON) so it can be piped.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose chatter is capped at `warn` unless `RUST_LOG` says otherwise.
const NOISY_DEPENDENCIES: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "h2", "tower_http"];

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(level: Level) -> String {
    let mut directives = vec![level.as_str().to_ascii_lowercase()];
    if level > Level::WARN {
        directives.extend(NOISY_DEPENDENCIES.iter().map(|name| format!("{}=warn", name)));
    }
    directives.join(",")
}

/// Install the global subscriber.
///
/// `json` selects newline-delimited JSON output. `RUST_LOG` overrides
/// `level` entirely. Only the first call in a process takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(level)));
    let layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry.with(layer.json()).try_init().ok();
    } else {
        registry.with(layer).try_init().ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_quiets_dependencies_when_verbose() {
        let filter = default_filter(Level::DEBUG);
        assert!(filter.starts_with("debug,"));
        assert!(filter.contains("hyper=warn"));
        assert!(filter.parse::<EnvFilter>().is_ok());
    }

    #[test]
    fn test_default_filter_plain_at_warn() {
        assert_eq!(default_filter(Level::WARN), "warn");
        assert_eq!(default_filter(Level::ERROR), "error");
    }
}
