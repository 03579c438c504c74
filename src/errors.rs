use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::prompt::PromptError;
use crate::providers::ProviderError;

/// User-facing error taxonomy for the API surface. Stage-1 generation
/// failures surface here; stage-2 and secondary persistence failures are
/// swallowed upstream and never reach a client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing required fields: selfieBase64, scene, playerName")]
    MissingFields,
    #[error("Selfie payload too large")]
    PayloadTooLarge,
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("Internal server error")]
    Internal,
}

impl From<PromptError> for ApiError {
    fn from(err: PromptError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingFields | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Provider(err) => match err {
                ProviderError::Unauthorized => StatusCode::UNAUTHORIZED,
                ProviderError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                ProviderError::SafetyFiltered | ProviderError::Unprocessable(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                ProviderError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                ProviderError::NoImage | ProviderError::Upstream(_) => StatusCode::BAD_GATEWAY,
            },
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
