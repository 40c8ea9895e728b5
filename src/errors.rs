use std::collections::HashMap;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::db::StoreError;

pub const MAX_BODY_BYTES: usize = 1_048_576;

/// Client-facing error taxonomy. Every failure path in the API funnels into
/// one of these variants; the JSON envelope and status code are produced in
/// exactly one place, `into_response`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("one or more fields failed validation")]
    FailedValidation(HashMap<String, String>),
    #[error("the requested resource could not be found")]
    NotFound,
    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,
    #[error("invalid authentication credentials")]
    InvalidCredentials,
    #[error("invalid or missing authentication token")]
    InvalidAuthenticationToken,
    #[error("you must be authenticated to access this resource")]
    AuthenticationRequired,
    #[error("your user account must be activated to access this resource")]
    InactiveAccount,
    #[error("your user account doesn't have the necessary permissions to access this resource")]
    NotPermitted,
    #[error("body must not be larger than {MAX_BODY_BYTES} bytes")]
    PayloadTooLarge,
    #[error("rate limit exceeded")]
    RateLimitExceeded,
    #[error("the server encountered a problem and could not process your request")]
    Internal(#[source] anyhow::Error),
}

impl ApiError {
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        ApiError::Internal(err.into())
    }

    /// Shortcut for a validation failure on a single field.
    pub fn field(field: &str, message: &str) -> Self {
        ApiError::FailedValidation(HashMap::from([(field.to_string(), message.to_string())]))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::FailedValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::EditConflict => StatusCode::CONFLICT,
            ApiError::InvalidCredentials
            | ApiError::InvalidAuthenticationToken
            | ApiError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            ApiError::InactiveAccount | ApiError::NotPermitted => StatusCode::FORBIDDEN,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Full detail is logged here; the client only ever sees the generic
        // message for internal failures.
        if let ApiError::Internal(err) = &self {
            error!(error = ?err, "internal server error");
        }

        let body = match &self {
            ApiError::FailedValidation(errors) => json!({ "error": errors }),
            other => json!({ "error": other.to_string() }),
        };

        let mut response = (self.status(), Json(body)).into_response();
        if matches!(self, ApiError::InvalidAuthenticationToken) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound,
            StoreError::EditConflict => ApiError::EditConflict,
            StoreError::DuplicateEmail => {
                ApiError::field("email", "a user with this email address already exists")
            }
            other => ApiError::Internal(other.into()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge;
        }
        match rejection {
            JsonRejection::JsonSyntaxError(_) => {
                ApiError::BadRequest("body contains badly-formed JSON".into())
            }
            JsonRejection::JsonDataError(err) => ApiError::BadRequest(err.body_text()),
            JsonRejection::MissingJsonContentType(_) => {
                ApiError::BadRequest("Content-Type header must be application/json".into())
            }
            other => ApiError::BadRequest(other.body_text()),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

// An unparseable id segment is treated the same as an unknown record.
impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        ApiError::NotFound
    }
}
