//! Error types for NRS.gui.
//!
//! One error enum shared by the library and the GUI service. Graph
//! operations, config loading and the editor API all report through it.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Main error type for NRS.gui.
#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid input, e.g. a node name the validator rejected
    ///
    /// # Example
    /// ```
    /// use nrs_libs::AppError;
    /// let error = AppError::BadRequest("Node name '' is not acceptable".to_string());
    /// ```
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A node, variable or link that does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The change collides with existing state (duplicate name, duplicate link)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unexpected failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Invalid or unreadable configuration
    ///
    /// # Example
    /// ```
    /// use nrs_libs::AppError;
    /// let error = AppError::ConfigError("server.port cannot be 0".to_string());
    /// ```
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl AppError {
    /// HTTP status this error maps to
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::ConfigError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_)
            | AppError::IoError(_)
            | AppError::YamlError(_)
            | AppError::JsonError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Lets axum handlers return `Result<_, AppError>` directly.
///
/// The body is always `{"error": "<message>"}`.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = match self {
            AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::Internal(msg)
            | AppError::ConfigError(msg) => msg,
            other => other.to_string(),
        };

        (status, Json(json!({ "error": error_message }))).into_response()
    }
}
