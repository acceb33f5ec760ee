//! Logging bootstrap.
//!
//! - Text or JSON output, RFC 3339 (UTC) timestamps.
//! - EnvFilter: explicit directive, else RUST_LOG, else "info".
//! - `log` records are bridged into `tracing`.

use std::env;

use anyhow::Context;
use tracing::Subscriber;
use tracing_subscriber::{fmt, layer::SubscriberExt, registry::LookupSpan, EnvFilter, Layer, Registry};

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter directive such as "info,tierpad=debug". None reads RUST_LOG.
    pub env_filter: Option<String>,
    pub json: bool,
    /// Print target, file and line.
    pub with_targets_and_lines: bool,
    pub with_threads: bool,
    /// ANSI colors, text format only.
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            json: false,
            with_targets_and_lines: true,
            with_threads: false,
            ansi: false,
        }
    }
}

/// Held by `main` for the life of the process.
#[derive(Debug)]
pub struct LoggingGuard {
    _private: (),
}

const DEFAULT_DIRECTIVE: &str = "info";

/// An explicit directive must parse; RUST_LOG falls back to the default.
fn build_filter(directive: Option<&str>) -> anyhow::Result<EnvFilter> {
    match directive {
        Some(s) => EnvFilter::try_new(s).with_context(|| format!("invalid log filter `{s}`")),
        None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))),
    }
}

/// Events go to stderr so command output on stdout stays machine-readable.
fn output_layer<S>(cfg: &LoggingConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(cfg.with_targets_and_lines)
        .with_file(cfg.with_targets_and_lines)
        .with_line_number(cfg.with_targets_and_lines)
        .with_thread_ids(cfg.with_threads)
        .with_thread_names(cfg.with_threads);

    match cfg.json {
        true => layer.json().flatten_event(true).with_ansi(false).boxed(),
        false => layer.compact().with_ansi(cfg.ansi).boxed(),
    }
}

/// Install the global subscriber. Call once at startup.
pub fn init(cfg: LoggingConfig) -> anyhow::Result<LoggingGuard> {
    let filter = build_filter(cfg.env_filter.as_deref())?;
    // `log` records from dependencies; a second bridge install is harmless
    let _ = tracing_log::LogTracer::init();

    let subscriber = Registry::default().with(filter).with(output_layer(&cfg));
    tracing::subscriber::set_global_default(subscriber).context("global subscriber already set")?;
    Ok(LoggingGuard { _private: () })
}

/// LOG_JSON, LOG_ANSI, LOG_THREADS (true|false) and RUST_LOG.
pub fn init_from_env() -> anyhow::Result<LoggingGuard> {
    let flag = |name: &str, default: bool| env::var(name).map(|v| v == "true").unwrap_or(default);
    init(LoggingConfig {
        env_filter: None,
        json: flag("LOG_JSON", false),
        ansi: flag("LOG_ANSI", false),
        with_threads: flag("LOG_THREADS", false),
        ..LoggingConfig::default()
    })
}
