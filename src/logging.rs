//! Logging configuration with journald support on Linux.
//!
//! Tracing output goes to systemd's journal when it is reachable. Otherwise
//! it goes to a daily rolling file when a log directory is configured, and
//! to stderr when it is not.

use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the logging system. Call once at startup.
///
/// Log level is controlled via the `TRAINER_SPRITE_LOG` environment variable,
/// using `EnvFilter` syntax (`debug`, `trainer_sprite=trace,info`, ...).
/// Defaults to `info`.
pub fn init(log_dir: Option<PathBuf>) -> Result<()> {
    let env_filter = env_filter();

    #[cfg(target_os = "linux")]
    {
        if let Ok(journald_layer) = tracing_journald::layer() {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(journald_layer)
                .try_init()?;

            tracing::info!("Logging initialized with journald backend");
            return Ok(());
        }
    }

    let Some(log_dir) = log_dir else {
        return init_stderr_with(env_filter);
    };

    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "trainer-sprite.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The writer stops flushing once the guard drops, so it lives as long as the process.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .try_init()?;

    tracing::info!("Logging initialized with file backend at {:?}", log_dir);
    Ok(())
}

/// Log to stderr only, bypassing journald. For command-line tools whose
/// stdout is machine readable.
pub fn init_stderr() -> Result<()> {
    init_stderr_with(env_filter())
}

fn init_stderr_with(env_filter: EnvFilter) -> Result<()> {
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()?;
    Ok(())
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("TRAINER_SPRITE_LOG").unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stderr_init_installs_once() {
        init_stderr().unwrap();
        // A global subscriber is already set
        assert!(init_stderr().is_err());
    }
}
