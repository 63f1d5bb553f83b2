//! Errors returned by the Yandex Disk REST layer.

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiskError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Insufficient storage: {0}")]
    InsufficientStorage(String),

    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Yandex Disk API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Stream error: {0}")]
    Stream(#[from] std::io::Error),

    #[error("Transfer cancelled")]
    Cancelled,
}

/// Error document returned by the API on non-2xx responses.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl DiskError {
    /// Classify a failed response by its status code and error document.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
        let code = parsed.error.clone().unwrap_or_default();
        let message = parsed
            .message
            .or(parsed.description)
            .or(parsed.error)
            .unwrap_or_else(|| format!("HTTP {status}"));

        match status {
            401 | 403 => DiskError::Unauthorized(message),
            404 => DiskError::NotFound(message),
            409 if code == "DiskPathDoesntExistsError" => DiskError::NotFound(message),
            409 => DiskError::AlreadyExists(message),
            429 => DiskError::TooManyRequests(message),
            507 => DiskError::InsufficientStorage(message),
            _ => DiskError::Api { status, message },
        }
    }
}

impl From<reqwest::Error> for DiskError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DiskError::Decode(err.to_string())
        } else {
            DiskError::Connection(err.to_string())
        }
    }
}
