use std::fmt;

use thiserror::Error;

/// Classification of a failed host request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostErrorKind {
    Unauthorized,
    Forbidden,
    NotFound,
    Unknown,
}

impl HostErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for HostErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not found",
            Self::Unknown => "unknown error",
        };
        f.write_str(text)
    }
}

#[derive(Error, Debug)]
pub enum CitreeError {
    #[error("Host request to {url} failed ({kind}): {detail}")]
    HostCommunication {
        url: String,
        kind: HostErrorKind,
        detail: String,
    },

    #[error("Source '{source_name}' does not support '{operation}'")]
    CapabilityUnsupported {
        source_name: String,
        operation: String,
    },

    #[error("Cache loader returned no value for key: {0}")]
    CacheIntegrity(String),

    #[error("Invalid configuration file {path}: {reason}")]
    ConfigValidation { path: String, reason: String },

    #[error("All sources failed for '{operation}': {}", errors.join("; "))]
    AggregationExhausted {
        operation: String,
        errors: Vec<String>,
    },

    #[error("git {command} failed: {detail}")]
    Git { command: String, detail: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CitreeError {
    pub fn unsupported(source_name: &str, operation: &str) -> Self {
        Self::CapabilityUnsupported {
            source_name: source_name.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Error class of a host communication failure, if this is one.
    pub fn host_kind(&self) -> Option<HostErrorKind> {
        match self {
            Self::HostCommunication { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CitreeError>;
