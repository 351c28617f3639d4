//! Structured logging bootstrap.

use fairorder_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive, e.g. `info` or `fairorder_engine=debug`.
    pub filter: String,

    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

/// Install the global tracing subscriber.
///
/// Safe to call more than once; subsequent calls are no-ops.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|err| Error::invalid_configuration(format!("bad log filter: {err}")))?;

    let result = if config.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    // Already-installed subscriber is fine; tests init repeatedly.
    let _ = result;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_parses() {
        assert!(init_logging(&LogConfig::default()).is_ok());
    }

    #[test]
    fn bad_filter_is_invalid_configuration() {
        let config = LogConfig {
            filter: "fairorder_engine=notalevel".to_string(),
            json: false,
        };
        assert!(matches!(
            init_logging(&config),
            Err(Error::InvalidConfiguration(_))
        ));
    }
}
