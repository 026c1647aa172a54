//! # Structured Logging Module
//!
//! Environment-aware structured logging that outputs to both console and
//! files for debugging long-running executions and the relay worker.

use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;

use chrono::Utc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// Safe to call more than once; only the first call installs the subscriber.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);

        let log_dir = PathBuf::from("log");
        if !log_dir.exists() {
            if let Err(e) = fs::create_dir_all(&log_dir) {
                eprintln!("failed to create log directory: {e}");
                return;
            }
        }

        let pid = process::id();
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let log_filename = format!("{environment}.{pid}.{timestamp}.log");

        let file_appender = tracing_appender::rolling::never(&log_dir, &log_filename);
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(true)
                    .with_filter(EnvFilter::new(log_level.clone())),
            )
            .with(
                fmt::layer()
                    .with_writer(file_writer)
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(false)
                    .json()
                    .with_filter(EnvFilter::new(log_level)),
            );

        // A global subscriber may already be set by a test harness.
        if subscriber.try_init().is_err() {
            tracing::debug!("global tracing subscriber already initialized");
        }

        tracing::info!(
            pid = pid,
            environment = %environment,
            log_file = %log_filename,
            "structured logging initialized"
        );

        // The guard must live for the process lifetime or the file layer
        // stops flushing.
        std::mem::forget(guard);
    });
}

/// Get current environment from environment variables.
fn get_environment() -> String {
    std::env::var("FLOWSYNC_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment.
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}
