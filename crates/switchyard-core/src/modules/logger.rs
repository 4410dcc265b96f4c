//! Logging setup and convenience wrappers.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_ENV: &str = "SWITCHYARD_LOG";
const LOG_FILE_PREFIX: &str = "switchyard.log";

/// Install the global subscriber.
///
/// Filter comes from `SWITCHYARD_LOG`, then `RUST_LOG`, then `default_directive`.
/// When `log_dir` is given, a daily-rolling file sink is added next to
/// stderr; keep the returned guard alive to flush it.
pub fn init_logger(default_directive: &str, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer().with_writer(writer).with_ansi(false);
            if let Err(e) =
                tracing_subscriber::registry().with(filter).with(stderr_layer).with(file_layer).try_init()
            {
                eprintln!("Logger already initialized: {}", e);
            }
            Some(guard)
        },
        None => {
            if let Err(e) = tracing_subscriber::registry().with(filter).with(stderr_layer).try_init()
            {
                eprintln!("Logger already initialized: {}", e);
            }
            None
        },
    }
}

/// Log info message.
pub(crate) fn log_info(message: &str) {
    tracing::info!("{}", message);
}

/// Log warning message.
pub(crate) fn log_warn(message: &str) {
    tracing::warn!("{}", message);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_file_sink_returns_guard_and_reinit_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let guard = init_logger("debug", Some(dir.path()));
        assert!(guard.is_some());
        log_info("[Test] first line");

        // A second install fails quietly instead of panicking.
        assert!(init_logger("info", None).is_none());
        log_warn("[Test] still logging");
    }
}
