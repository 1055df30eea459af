//! Logging initialisation via tracing-subscriber.
//!
//! Call [`init`] once at startup, after block settings are resolved.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::error::BlockError;

/// Initialise the global tracing subscriber.
///
/// `level` accepts standard level strings: `"error"`, `"warn"`, `"info"`,
/// `"debug"`, `"trace"`.
///
/// If `prefer_level` is `true`, `level` takes precedence and `RUST_LOG` is
/// only consulted when `level` is invalid. If `prefer_level` is `false`,
/// `RUST_LOG` takes precedence and `level` is the fallback.
pub fn init(level: &str, prefer_level: bool) -> Result<(), BlockError> {
    let filter = if prefer_level {
        EnvFilter::try_new(level)
            .or_else(|_| EnvFilter::try_from_default_env())
            .map_err(|e| BlockError::Config(format!("invalid log level '{level}': {e}")))?
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level))
            .map_err(|e| BlockError::Config(format!("invalid log level '{level}': {e}")))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| BlockError::Config(format!("failed to set subscriber: {e}")))
}

/// Parse a log level string into a [`LevelFilter`], returning an error on
/// unrecognised values. Useful for validating settings before initialising.
pub fn parse_level(level: &str) -> Result<LevelFilter, BlockError> {
    if level.is_empty() {
        return Err(BlockError::Config("log level must not be empty".into()));
    }
    level
        .parse::<LevelFilter>()
        .map_err(|_| BlockError::Config(format!("unrecognised log level: '{level}'")))
}
