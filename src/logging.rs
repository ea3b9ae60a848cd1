//! Structured logging setup.
//!
//! The teacher configures `tracing`/`tracing-subscriber` ad hoc per binary;
//! this crate centralizes it in one `init` entry point so the Orchestrator
//! (and tests, via `tracing-test`) get consistent JSON-formatted log lines on
//! stderr, matching `original_source`'s `backoff_logger.setup_logging`.

use tracing_subscriber::EnvFilter;

/// Initialize global JSON logging. `default_level` is used when
/// `RUST_LOG` is unset. Safe to call once per process; a second call is a
/// no-op error that callers may ignore.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_does_not_panic_when_called_repeatedly() {
        init("info");
        init("debug");
    }

    #[tracing_test::traced_test]
    #[test]
    fn init_leaves_tracing_events_capturable() {
        tracing::info!("logging wired up");
        assert!(logs_contain("logging wired up"));
    }
}
