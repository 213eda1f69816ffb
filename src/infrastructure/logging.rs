//! Logging system configuration and initialization
//!
//! Console output (plain or JSON) plus an optional daily-rotated log file.
//! `RUST_LOG` overrides the configured level; otherwise dependency noise
//! (SQL statements, HTTP internals) is held back unless the level is `trace`.

use anyhow::{Context, Result, anyhow};
use once_cell::sync::Lazy;
use std::sync::Mutex;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

// Keeps the non-blocking file writers alive for the life of the process
static LOG_GUARDS: Lazy<Mutex<Vec<WorkerGuard>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Targets held at `warn` unless tracing at `trace`
const NOISY_TARGETS: &[&str] = &["sqlx", "reqwest", "hyper", "hyper_util", "h2", "rustls", "html5ever", "selectors"];

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize the logging system with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(&LoggingConfig::default())
}

/// Build the env filter for a configured level
pub fn build_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter = EnvFilter::try_new(level).with_context(|| format!("invalid log level '{level}'"))?;
    if !level.to_lowercase().contains("trace") {
        for target in NOISY_TARGETS {
            filter = filter.add_directive(format!("{target}=warn").parse()?);
        }
    }
    Ok(filter)
}

/// Initialize logging with custom configuration
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    if !config.console_output && !config.file_output {
        return Err(anyhow!("No logging output configured"));
    }

    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.console_output {
        let console = fmt::layer()
            .with_writer(std::io::stderr)
            .with_timer(ChronoUtc::rfc_3339())
            .with_target(false);
        layers.push(if config.json_format {
            console.json().boxed()
        } else {
            console.boxed()
        });
    }

    if config.file_output {
        std::fs::create_dir_all(&config.log_dir)
            .with_context(|| format!("Failed to create log directory {}", config.log_dir.display()))?;

        let appender = rolling::daily(&config.log_dir, &config.file_name_prefix);
        let (writer, guard) = non_blocking(appender);
        if let Ok(mut guards) = LOG_GUARDS.lock() {
            guards.push(guard);
        }

        let file = fmt::layer()
            .with_writer(writer)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(false);
        layers.push(if config.json_format {
            file.json().with_target(true).boxed()
        } else {
            file.with_target(false).boxed()
        });
    }

    Registry::default()
        .with(layers)
        .with(build_filter(&config.level)?)
        .try_init()
        .map_err(|e| anyhow!("failed to initialize tracing: {e}"))?;

    info!(
        level = %config.level,
        json = config.json_format,
        file_output = config.file_output,
        log_dir = %config.log_dir.display(),
        "Logging system initialized"
    );
    Ok(())
}
