use std::fmt;
use thiserror::Error;

/// The two remote systems this service talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteSystem {
    Crm,
    Board,
}

impl fmt::Display for RemoteSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteSystem::Crm => write!(f, "CRM"),
            RemoteSystem::Board => write!(f, "board service"),
        }
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("{system} request failed: {source}")]
    Transport {
        system: RemoteSystem,
        #[source]
        source: reqwest::Error,
    },

    #[error("{system} authentication failed: {message}")]
    Auth {
        system: RemoteSystem,
        message: String,
    },

    #[error("{system} rejected {operation} ({status}): {message}")]
    RemoteRejection {
        system: RemoteSystem,
        operation: String,
        status: String,
        message: String,
    },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("A sync run is already in progress")]
    SyncInProgress,

    #[error("Sync task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Transport,
    Remote,
    Validation,
    Configuration,
    Internal,
}

impl SyncError {
    pub fn transport(system: RemoteSystem, source: reqwest::Error) -> Self {
        SyncError::Transport { system, source }
    }

    pub fn rejection(
        system: RemoteSystem,
        operation: impl Into<String>,
        status: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        SyncError::RemoteRejection {
            system,
            operation: operation.into(),
            status: status.into(),
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        SyncError::ValidationError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            SyncError::Transport { .. } | SyncError::Auth { .. } => ErrorCategory::Transport,
            SyncError::RemoteRejection { .. } => ErrorCategory::Remote,
            SyncError::ValidationError { .. } => ErrorCategory::Validation,
            SyncError::ConfigError { .. }
            | SyncError::MissingConfigError { .. }
            | SyncError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            SyncError::IoError(_)
            | SyncError::SerializationError(_)
            | SyncError::SyncInProgress
            | SyncError::TaskFailed(_) => ErrorCategory::Internal,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Transport => "Check network access and the configured credentials",
            ErrorCategory::Remote => "Inspect the remote system's message; the record may need manual attention",
            ErrorCategory::Validation => "Correct the CRM record's stage, type, or name",
            ErrorCategory::Configuration => "Fix the configuration file or environment variables",
            ErrorCategory::Internal => "Retry; if it persists, check the log file",
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
