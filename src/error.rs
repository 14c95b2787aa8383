use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::inference::GenerationError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    /// Body refused by the extractor for a reason other than bad JSON.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("Ollama service is not available: {0}")]
    BackendUnavailable(String),

    /// `activity` reads like "generating", "modifying".
    #[error("Error {activity} LinkedIn post: {source}")]
    Generation {
        activity: &'static str,
        #[source]
        source: GenerationError,
    },

    #[error("Error rendering prompt: {0}")]
    Template(#[from] minijinja::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Rejected { status, .. } => *status,
            ApiError::Generation { source, .. } if source.is_timeout() => {
                StatusCode::GATEWAY_TIMEOUT
            }
            ApiError::BackendUnavailable(_)
            | ApiError::Generation { .. }
            | ApiError::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Records a failed request. Generation failures are left out, the
    /// handler already logged them with their request id.
    pub fn log(&self, route: &str) {
        let status = self.status_code().as_u16();
        match self {
            ApiError::Generation { .. } => {}
            _ if self.status_code().is_server_error() => {
                error!(target = "api", route, status, "{}", self);
            }
            _ => warn!(target = "api", route, status, "{}", self),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
