use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Video;

pub type ApiResult<T> = Result<T, ApiError>;
pub type TwitchResult<T> = Result<T, TwitchError>;

pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong";

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub errors: Vec<String>,
}

/// Failures talking to Twitch. None of these are shown to API callers.
#[derive(Debug, Error)]
pub enum TwitchError {
    #[error("OAuth grant failed - status code: {status}")]
    AuthGrant { status: StatusCode },
    #[error("error returned from twitch API - status code: {status}")]
    UpstreamApi { status: StatusCode },
    #[error("failed to decode twitch response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("twitch transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// A pagination run that stopped early. `partial` keeps every video
/// collected before `source` occurred.
#[derive(Debug, Error)]
#[error("video fetch stopped after {} videos: {source}", .partial.len())]
pub struct FetchError {
    pub partial: Vec<Video>,
    #[source]
    pub source: TwitchError,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed: {}", .errors.join(", "))]
    Validation { errors: Vec<String> },
    #[error("{message}")]
    NotFound { message: String },
    #[error("upstream error: {message}")]
    Upstream { message: String },
}

impl ApiError {
    pub fn validation(errors: Vec<String>) -> Self {
        Self::Validation { errors }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(self) -> ErrorResponse {
        let errors = match self {
            Self::Validation { errors } => errors,
            Self::NotFound { message } => vec![message],
            // upstream detail stays in the server logs
            Self::Upstream { .. } => vec![GENERIC_ERROR_MESSAGE.to_string()],
        };
        ErrorResponse { errors }
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        Self::upstream(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self.body())).into_response()
    }
}
