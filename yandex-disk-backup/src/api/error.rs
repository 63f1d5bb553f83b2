use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::utils::errors::{AgentError, ErrorKind};

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Agent(err) => match err {
                AgentError::NotFound(_) => StatusCode::NOT_FOUND,
                AgentError::Authentication(_) => StatusCode::UNAUTHORIZED,
                AgentError::InsufficientStorage(_) => StatusCode::INSUFFICIENT_STORAGE,
                AgentError::Config(_) => StatusCode::BAD_REQUEST,
                AgentError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
                _ => match err.kind() {
                    ErrorKind::Agent => StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorKind::Unreachable => StatusCode::SERVICE_UNAVAILABLE,
                },
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::BadRequest(_) => ErrorKind::Agent,
            ApiError::Agent(err) => err.kind(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!("Request failed ({}): {}", status, self);
        }
        (
            status,
            Json(json!({ "error": self.to_string(), "kind": self.kind() })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AgentError::NotFound("a.tar".into()), StatusCode::NOT_FOUND),
            (AgentError::Authentication("x".into()), StatusCode::UNAUTHORIZED),
            (
                AgentError::InsufficientStorage("x".into()),
                StatusCode::INSUFFICIENT_STORAGE,
            ),
            (AgentError::Config("x".into()), StatusCode::BAD_REQUEST),
            (AgentError::Folder("/B".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (AgentError::Cancelled, StatusCode::INTERNAL_SERVER_ERROR),
            (AgentError::Connection("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (AgentError::RateLimited("x".into()), StatusCode::TOO_MANY_REQUESTS),
            (AgentError::Remote("x".into()), StatusCode::SERVICE_UNAVAILABLE),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
        assert_eq!(
            ApiError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
