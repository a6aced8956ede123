use thiserror::Error;

use crate::tls::TlsError;

/// Which of the two backing stores an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Coordination,
    Record,
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreKind::Coordination => write!(f, "coordination"),
            StoreKind::Record => write!(f, "record"),
        }
    }
}

#[derive(Error, Debug)]
pub enum CronError {
    #[error("{store} store unavailable: {message}")]
    StoreUnavailable { store: StoreKind, message: String },

    #[error("Job already exists: {0}")]
    DuplicateJob(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] TlsError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CronError {
    pub fn coordination(message: impl Into<String>) -> Self {
        CronError::StoreUnavailable {
            store: StoreKind::Coordination,
            message: message.into(),
        }
    }

    pub fn record(message: impl Into<String>) -> Self {
        CronError::StoreUnavailable {
            store: StoreKind::Record,
            message: message.into(),
        }
    }

    /// Returns the failing store for `StoreUnavailable`, `None` otherwise.
    pub fn store(&self) -> Option<StoreKind> {
        match self {
            CronError::StoreUnavailable { store, .. } => Some(*store),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CronError>;
