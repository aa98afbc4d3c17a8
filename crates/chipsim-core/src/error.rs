//! Error handling for chipsim
//!
//! Provides error types for all layers of the toolkit:
//! - Configuration errors (loading/validation of simulation definitions)
//! - Session errors (calls rejected by an external scripting session)
//! - Mesh and layout errors (meshing engine, layout files)
//! - Parse errors (solver output files)
//!
//! Missing solver output is not an error; parsers report it as `None`.

use thiserror::Error;

/// Configuration error type
///
/// Represents problems with a simulation definition file.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A required configuration key is missing.
    #[error("Missing configuration key: {0}")]
    MissingKey(String),

    /// A configuration value is not acceptable.
    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue {
        /// The offending key.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The configuration file format is not supported.
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),
}

/// Main error type for chipsim
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An external scripting session rejected a call
    #[error("Session call '{method}' failed: {message}")]
    Session {
        /// The method that was invoked.
        method: String,
        /// The message reported by the session.
        message: String,
    },

    /// The meshing engine reported a failure
    #[error("Mesh engine error: {0}")]
    Mesh(String),

    /// A layout file could not be read
    #[error("Layout error: {0}")]
    Layout(String),

    /// A solver output file is malformed
    #[error("Failed to parse {file} at line {line}: {reason}")]
    Parse {
        /// The file being parsed.
        file: String,
        /// The 1-based line number.
        line: usize,
        /// What went wrong.
        reason: String,
    },

    /// A matrix that must be inverted is singular or not square
    #[error("Matrix from {0} cannot be inverted")]
    SingularMatrix(String),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Create a session error for a failed call
    pub fn session(method: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Session {
            method: method.into(),
            message: message.into(),
        }
    }

    /// Check if this error came from an external session
    pub fn is_session_error(&self) -> bool {
        matches!(self, Error::Session { .. })
    }

    /// Check if this is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::session("CreateBox", "object exists");
        assert_eq!(err.to_string(), "Session call 'CreateBox' failed: object exists");

        let err = Error::Parse {
            file: "capacitance.dat".to_string(),
            line: 3,
            reason: "not a number".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to parse capacitance.dat at line 3: not a number"
        );
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingKey("sif_names".to_string());
        assert_eq!(err.to_string(), "Missing configuration key: sif_names");

        let err = ConfigError::InvalidValue {
            key: "gds_scaling".to_string(),
            reason: "must be positive".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value for 'gds_scaling': must be positive"
        );
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = ConfigError::UnsupportedFormat("yaml".to_string()).into();
        assert!(err.is_config_error());
        assert!(!err.is_session_error());

        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
