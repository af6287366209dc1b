use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::JobStatus;

#[derive(Error, Debug)]
pub enum AlaskaError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Cannot {action} job '{job_id}' in state '{status}'")]
    InvalidTransition {
        job_id: String,
        status: JobStatus,
        action: &'static str,
    },

    #[error("Cannot start job '{job_id}' while job '{running}' of the same project is running")]
    StepBlocked { job_id: String, running: String },

    #[error("Queue invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

impl AlaskaError {
    pub fn validation(message: impl Into<String>) -> Self {
        AlaskaError::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: &str) -> Self {
        AlaskaError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AlaskaError::Transport(_) => ErrorKind::Transport,
            AlaskaError::Validation { .. } => ErrorKind::Validation,
            AlaskaError::NotFound { .. } => ErrorKind::NotFound,
            AlaskaError::InvalidTransition { .. } | AlaskaError::StepBlocked { .. } => {
                ErrorKind::InvalidTransition
            }
            AlaskaError::InvariantViolation(_) => ErrorKind::InvariantViolation,
            AlaskaError::Database(_) => ErrorKind::Database,
            AlaskaError::Config(_) => ErrorKind::Config,
            AlaskaError::Encode(_) => ErrorKind::Encode,
        }
    }

    /// Whether the caller may retry the whole operation.
    ///
    /// Invariant violations point at a serialization bug in the queue owner
    /// and are never recoverable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Transport | ErrorKind::Validation | ErrorKind::InvalidTransition
        )
    }

    /// The structured payload returned across the worker/caller boundary.
    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            kind: self.kind(),
            message: self.to_string(),
            recoverable: self.is_recoverable(),
        }
    }
}

impl From<rusqlite::Error> for AlaskaError {
    fn from(e: rusqlite::Error) -> Self {
        AlaskaError::Database(crate::db::DatabaseError::Sqlite(e))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transport,
    Validation,
    NotFound,
    InvalidTransition,
    InvariantViolation,
    Database,
    Config,
    Encode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
    pub recoverable: bool,
}

/// Failure talking to an external collaborator (provisioning, storage,
/// visualization sessions).
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("Request to '{endpoint}' failed: {reason}")]
    RequestFailed { endpoint: String, reason: String },

    #[error("Unexpected response from '{endpoint}': {reason}")]
    BadResponse { endpoint: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Environment variable {0} is not set")]
    MissingEnv(&'static str),
}

pub type Result<T> = std::result::Result<T, AlaskaError>;
