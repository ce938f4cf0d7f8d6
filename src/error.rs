use thiserror::Error;

/// Unified error type covering all possible error scenarios
#[derive(Error, Debug)]
pub enum Rv32GenError {
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("File operation error: {message}")]
    File { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Listing check failed at line {line}: {message}")]
    Listing { line: usize, message: String },

    #[error("JSON serialization/deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("System error: {message}")]
    System { message: String },
}

impl Rv32GenError {
    pub fn file<S: Into<String>>(message: S) -> Self {
        Self::File {
            message: message.into(),
        }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn listing<S: Into<String>>(line: usize, message: S) -> Self {
        Self::Listing {
            line,
            message: message.into(),
        }
    }

    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }
}

/// Simplified Result type alias
pub type Result<T> = std::result::Result<T, Rv32GenError>;
