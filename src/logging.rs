use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_DIR: &str = "logs";
const DEFAULT_DIRECTIVE: &str = "partner_export=info";

/// Initializes logging with a console layer and a daily-rotated JSON file
/// under `logs/`. Keep the returned guard alive so buffered lines are flushed.
pub fn init_logging() -> WorkerGuard {
    ensure_log_dir(Path::new(LOG_DIR));

    let file_appender = tracing_appender::rolling::daily(LOG_DIR, "partner_export.log");
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);
    let console_layer = fmt::layer().with_writer(std::io::stdout);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    guard
}

/// Create the log directory, warning on stderr when that fails. The
/// subscriber is not installed yet at this point.
fn ensure_log_dir(dir: &Path) -> bool {
    match fs::create_dir_all(dir) {
        Ok(()) => true,
        Err(e) => {
            eprintln!("warning: cannot create log directory '{}': {}", dir.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_ensure_log_dir() {
        let tmp = tempdir().unwrap();
        assert!(ensure_log_dir(&tmp.path().join("logs")));

        let blocker = tmp.path().join("not-a-dir");
        fs::write(&blocker, "x").unwrap();
        assert!(!ensure_log_dir(&blocker.join("logs")));
    }
}
