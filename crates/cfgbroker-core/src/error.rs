//! Error types shared by sources, loaders and the broker

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading, initializing or querying configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Non-success HTTP status from Vault or the instance metadata endpoint
    #[error("{context} failed with status {status}: {body}")]
    Transport {
        context: String,
        status: u16,
        body: String,
    },

    /// The request never produced a response (connection refused, DNS, ...)
    #[error("{context} failed: {source}")]
    Request {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    /// Key exists remotely but was deliberately not fetched
    #[error("Config value not available: {0}")]
    NotAvailable(String),

    /// Scalar lookup resolved to an object
    #[error("Possibly unsafe get of object at '{0}', values might be missing. Use get_object instead")]
    UnsafeObjectGet(String),

    /// Object lookup found a value that is not an object
    #[error("Config value at '{0}' is not an object")]
    NotAnObject(String),

    #[error("Config value at '{key}' is not a valid {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    #[error("Missing config key: {0}")]
    MissingKey(String),

    /// Malformed source data
    #[error("Failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Config file {} extends itself", .0.display())]
    ExtendsCycle(PathBuf),

    #[error("Error when loading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Vault configuration error: {0}")]
    VaultConfig(String),

    #[error("Source already initialized: {0}")]
    AlreadyInitialized(String),

    #[error("Vault has already been included in this config broker")]
    VaultAlreadyIncluded,
}

impl ConfigError {
    /// Create a parse error for a file or endpoint
    pub fn parse(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create an I/O error tied to the path that caused it
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// HTTP status carried by a transport error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this is a 4xx transport error
    pub fn is_client_error(&self) -> bool {
        matches!(self.status(), Some(s) if s / 100 == 4)
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
