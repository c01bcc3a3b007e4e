use std::collections::HashMap;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tunevault_storage::StorageError;

/// Everything a handler can fail with. Each variant maps to one status and
/// one wire message; `Validation` carries the full accumulated field map
/// instead of a single message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    Validation(HashMap<String, String>),
    BadRequest(String),
    NotFound,
    EditConflict,
    AuthenticationRequired,
    InvalidAuthenticationToken,
    InvalidCredentials,
    InactiveAccount,
    NotPermitted,
    RateLimited,
    /// A store operation exceeded its bound. The client sees a generic 500;
    /// the log entry stays distinct so timeouts are visible operationally.
    StoreTimeout,
    Internal(String),
}

#[derive(Serialize)]
struct Envelope<T: Serialize> {
    error: T,
}

const INTERNAL_MESSAGE: &str =
    "the server encountered a problem and could not process your request";

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Validation(errors) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Json(Envelope { error: errors }))
                    .into_response()
            }
            Self::BadRequest(message) => message_response(StatusCode::BAD_REQUEST, &message),
            Self::NotFound => message_response(
                StatusCode::NOT_FOUND,
                "the requested resource could not be found",
            ),
            Self::EditConflict => message_response(
                StatusCode::CONFLICT,
                "unable to update the record due to an edit conflict, please try again",
            ),
            Self::AuthenticationRequired => message_response(
                StatusCode::UNAUTHORIZED,
                "you must be authenticated to access this resource",
            ),
            Self::InvalidAuthenticationToken => {
                let mut response = message_response(
                    StatusCode::UNAUTHORIZED,
                    "invalid or missing authentication token",
                );
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                response
            }
            Self::InvalidCredentials => message_response(
                StatusCode::UNAUTHORIZED,
                "invalid authentication credentials",
            ),
            Self::InactiveAccount => message_response(
                StatusCode::FORBIDDEN,
                "your user account must be activated to access this resource",
            ),
            Self::NotPermitted => message_response(
                StatusCode::FORBIDDEN,
                "your user account doesn't have the necessary permissions to access this resource",
            ),
            Self::RateLimited => {
                message_response(StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded")
            }
            Self::StoreTimeout => {
                tracing::error!("storage operation timed out; outcome unknown");
                message_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE)
            }
            Self::Internal(detail) => {
                tracing::error!(error = %detail, "unexpected error while handling request");
                message_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE)
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::RecordNotFound => Self::NotFound,
            StorageError::EditConflict => Self::EditConflict,
            StorageError::Timeout => Self::StoreTimeout,
            other => Self::Internal(other.to_string()),
        }
    }
}

fn message_response(status: StatusCode, message: &str) -> Response {
    (status, Json(Envelope { error: message })).into_response()
}

/// Converts a caught handler panic into the standard 500 envelope. Wired as
/// the outermost layer so a panicking handler can never tear down the
/// connection with a partial response.
pub(crate) fn panic_response(panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned());
    tracing::error!(error = %detail, "recovered from panic in request handler");
    message_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE)
}

/// 404 for routes outside the table.
pub(crate) async fn not_found() -> ApiError {
    ApiError::NotFound
}

pub(crate) fn validation_failed(errors: HashMap<String, String>) -> ApiError {
    ApiError::Validation(errors)
}
