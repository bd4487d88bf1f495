//! Tracing setup with a log level that can be changed at runtime.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use crate::config::LoggingConfig;

static LEVEL_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// Installs the global subscriber. `RUST_LOG` wins over `logging.level`.
///
/// Calling this more than once keeps the first subscriber.
pub fn init_tracing(logging: &LoggingConfig) {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(&logging.level));

    let (filter_layer, handle) = reload::Layer::new(filter);
    if LEVEL_HANDLE.set(handle).is_err() {
        return;
    }

    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_target(true))
        .try_init();
}

/// Replaces the active filter. No-op before [`init_tracing`].
pub fn apply_logging_level(level: &str) -> bool {
    LEVEL_HANDLE
        .get()
        .is_some_and(|handle| handle.modify(|filter| *filter = EnvFilter::new(level)).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_reload_requires_init() {
        assert!(!apply_logging_level("debug"));

        init_tracing(&LoggingConfig::default());
        assert!(apply_logging_level("didgate_auth=debug,info"));
        assert!(apply_logging_level("warn"));

        // a second init keeps the installed subscriber and its handle
        init_tracing(&LoggingConfig {
            level: "trace".into(),
        });
        assert!(apply_logging_level("info"));
    }
}
