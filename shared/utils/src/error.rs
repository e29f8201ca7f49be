use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum BomSyncError {
    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Aborts the save that triggered the sync.
    #[error("{title}: {}", messages.join("; "))]
    Blocked { title: String, messages: Vec<String> },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl BomSyncError {
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn blocked(title: impl Into<String>, messages: Vec<String>) -> Self {
        Self::Blocked {
            title: title.into(),
            messages,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Database { .. } => "DATABASE_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Blocked { .. } => "SYNC_BLOCKED",
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Internal { .. } => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Blocking errors use 417, the status the host framework answers
    /// validation failures with.
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::Database { .. } => 500,
            Self::Validation { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::Blocked { .. } => 417,
            Self::Configuration { .. } => 500,
            Self::Internal { .. } => 500,
        }
    }
}

pub type BomSyncResult<T> = Result<T, BomSyncError>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub message: String,
    pub title: Option<String>,
    pub messages: Vec<String>,
}

impl From<BomSyncError> for ErrorResponse {
    fn from(error: BomSyncError) -> Self {
        let (title, messages) = match &error {
            BomSyncError::Blocked { title, messages } => (Some(title.clone()), messages.clone()),
            _ => (None, Vec::new()),
        };

        Self {
            error: error.to_string(),
            code: error.error_code().to_string(),
            message: error.to_string(),
            title,
            messages,
        }
    }
}

// Conversion from common error types
impl From<sqlx::Error> for BomSyncError {
    fn from(error: sqlx::Error) -> Self {
        Self::database(error.to_string())
    }
}

impl From<serde_json::Error> for BomSyncError {
    fn from(error: serde_json::Error) -> Self {
        Self::validation("JSON", error.to_string())
    }
}

impl From<config::ConfigError> for BomSyncError {
    fn from(error: config::ConfigError) -> Self {
        Self::configuration(error.to_string())
    }
}

/// Repository failures arrive as `anyhow` chains; keep the full chain.
impl From<anyhow::Error> for BomSyncError {
    fn from(error: anyhow::Error) -> Self {
        Self::database(format!("{:#}", error))
    }
}

impl From<validator::ValidationErrors> for BomSyncError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::validation("document", crate::validation::format_validation_errors(&errors))
    }
}
