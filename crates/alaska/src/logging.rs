//! Process-wide log setup.
//!
//! Library code logs through the `log` facade and opens `tracing` spans on
//! scheduler operations. [`init_logging`] installs one `tracing` subscriber
//! for both and forwards `log` records into it.

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::{LogFormat, LoggingConfig};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter '{directive}': {reason}")]
    Filter { directive: String, reason: String },

    #[error("A global tracing subscriber is already installed")]
    SubscriberInstalled(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("A global logger is already installed")]
    LoggerInstalled(#[from] log::SetLoggerError),
}

/// Installs the global subscriber. `RUST_LOG` overrides `config.level`.
///
/// Fails if a subscriber or logger was installed before.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| LoggingError::Filter {
            directive: config.level.clone(),
            reason: e.to_string(),
        })?,
    };

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Text => fmt::layer().with_target(true).boxed(),
        LogFormat::Json => fmt::layer().json().with_current_span(true).boxed(),
    };

    let subscriber = Registry::default().with(fmt_layer).with(filter);
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;

    log::debug!("Logging initialized ({:?})", config.format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_invalid_filter_directive() {
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig {
            level: "alaska=notalevel".to_string(),
            format: LogFormat::Text,
        };
        assert!(matches!(
            init_logging(&config),
            Err(LoggingError::Filter { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_second_init_fails() {
        let config = LoggingConfig::default();
        // Another test may already have installed one.
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}
