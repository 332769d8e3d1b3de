//! Error types for server startup and I/O.
//!
//! Nothing that happens inside a room is an error: bad references and broken
//! preconditions are ignored where they occur. These types only cover the
//! things that can stop the process from starting or serving.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io { path: String, source: io::Error },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("socket error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;

    #[test]
    fn test_config_errors_stop_the_server() {
        let missing = GameConfig::from_file("/nonexistent/house-of-last-light.json").unwrap_err();
        let error = ServerError::from(missing);
        assert!(matches!(error, ServerError::Config(ConfigError::Io { .. })));
        assert!(error.to_string().starts_with("failed to read config file"));

        let invalid: ServerError = GameConfig::from_json("{ not json").unwrap_err().into();
        assert!(matches!(invalid, ServerError::Config(ConfigError::Parse(_))));
    }
}
