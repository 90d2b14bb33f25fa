//! Subscriber initialization

use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, Registry};

use super::config::{LogFormat, LoggingConfig};

/// Boxed layer over the bare registry, e.g. the host's OpenTelemetry layer.
pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(thiserror::Error, Debug)]
pub enum TelemetryError {
    #[error("invalid log filter directive '{directive}': {source}")]
    InvalidFilter {
        directive: String,
        #[source]
        source: ParseError,
    },

    #[error("a global tracing subscriber is already installed: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

/// `RUST_LOG` when set and non-blank, otherwise `cfg.level`.
///
/// # Errors
/// Returns [`TelemetryError::InvalidFilter`] when the chosen directive does not parse.
pub fn build_filter(cfg: &LoggingConfig) -> Result<EnvFilter, TelemetryError> {
    let directive = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(from_env) if !from_env.trim().is_empty() => from_env,
        _ => cfg.level.clone(),
    };
    EnvFilter::try_new(&directive)
        .map_err(|source| TelemetryError::InvalidFilter { directive, source })
}

fn fmt_layer(cfg: &LoggingConfig) -> BoxedLayer {
    let layer = tracing_subscriber::fmt::layer()
        .with_ansi(cfg.ansi)
        .with_target(cfg.with_target);
    match cfg.format {
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

/// Installs the global subscriber: filter, fmt layer, then `extra` if given.
///
/// # Errors
/// [`TelemetryError::InvalidFilter`] for a bad directive, or
/// [`TelemetryError::AlreadyInitialized`] when a global subscriber already exists.
pub fn init_logging(cfg: &LoggingConfig, extra: Option<BoxedLayer>) -> Result<(), TelemetryError> {
    let mut layers: Vec<BoxedLayer> = vec![build_filter(cfg)?.boxed(), fmt_layer(cfg)];
    layers.extend(extra);

    tracing_subscriber::registry().with(layers).try_init()?;
    tracing::debug!(format = ?cfg.format, "logging initialized");
    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn filter_falls_back_to_configured_level() {
        temp_env::with_var_unset("RUST_LOG", || {
            let cfg = LoggingConfig {
                level: "problemkit=debug".to_owned(),
                ..LoggingConfig::default()
            };
            let filter = build_filter(&cfg).unwrap();
            assert!(filter.to_string().contains("problemkit=debug"));
        });
    }

    #[test]
    fn rust_log_wins_over_configuration() {
        temp_env::with_var("RUST_LOG", Some("warn"), || {
            let filter = build_filter(&LoggingConfig::default()).unwrap();
            assert_eq!(filter.to_string(), "warn");
        });
    }
}
