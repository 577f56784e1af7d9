//! ---
//! arb_section: "01-core-functionality"
//! arb_subsection: "module"
//! arb_type: "source"
//! arb_scope: "code"
//! arb_description: "Shared primitives and utilities for the bootstrap tooling."
//! arb_version: "v0.1.0"
//! arb_owner: "ops"
//! ---
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "ARB_DEPLOY_LOG";

/// Keeps the file writer's background worker alive. Buffered events are
/// flushed when this is dropped, so hold it until the process is done logging.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug, Default)]
pub struct TracingGuard {
    _file: Option<WorkerGuard>,
}

/// Available console log formats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    StructuredJson,
    #[default]
    Pretty,
}

/// Initialize the tracing subscriber based on configuration and environment variables.
///
/// * `ARB_DEPLOY_LOG` overrides the filter (e.g. `info`, `debug,arb_deploy_host=trace`).
///   When unset the standard `RUST_LOG` variable is honoured, finally defaulting to `info`.
/// * Console output goes to stderr, written synchronously so nothing is lost
///   when a short command exits.
/// * When `logging.directory` is set, a daily rolling JSON file is written there as well.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<TracingGuard> {
    let mut file_guard = None;
    let file_layer = match &config.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory).with_context(|| {
                format!("unable to create log directory {}", directory.display())
            })?;
            let prefix = config
                .file_prefix
                .clone()
                .unwrap_or_else(|| service_name.to_owned());
            let file_appender = daily(directory, format!("{prefix}.log"));
            let (file_writer, worker) = tracing_appender::non_blocking(file_appender);
            file_guard = Some(worker);
            Some(
                fmt::layer()
                    .with_target(true)
                    .with_timer(fmt::time::UtcTime::rfc_3339())
                    .json()
                    .with_writer(file_writer)
                    .boxed(),
            )
        }
        None => None,
    };

    let filter = match std::env::var(LOG_ENV) {
        Ok(directive) => EnvFilter::try_new(directive).unwrap_or_else(|err| {
            eprintln!(
                "invalid {} directive ({}); defaulting to info logging",
                LOG_ENV, err
            );
            EnvFilter::new("info")
        }),
        Err(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let console_layer = match config.format {
        LogFormat::StructuredJson => fmt::layer()
            .with_target(false)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(false)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .ok();

    info!(
        service = %service_name,
        log_dir = ?config.directory,
        format = ?config.format,
        "tracing initialised"
    );
    Ok(TracingGuard { _file: file_guard })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn log_format_uses_kebab_case() {
        #[derive(Deserialize)]
        struct Holder {
            format: LogFormat,
        }
        let holder: Holder = toml::from_str("format = \"structured-json\"").unwrap();
        assert_eq!(holder.format, LogFormat::StructuredJson);
    }

    #[test]
    fn file_events_are_flushed_when_guard_drops() {
        let dir = tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let config = LoggingConfig {
            directory: Some(log_dir.clone()),
            ..LoggingConfig::default()
        };
        let guard = init_tracing("arb-deploy-test", &config).unwrap();
        assert!(log_dir.is_dir());

        info!("last event before exit");
        drop(guard);

        let written: String = std::fs::read_dir(&log_dir)
            .unwrap()
            .map(|entry| std::fs::read_to_string(entry.unwrap().path()).unwrap())
            .collect();
        assert!(written.contains("last event before exit"), "{written}");
    }
}
