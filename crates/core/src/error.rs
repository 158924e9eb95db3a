use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not Found")] NotFound,
    #[error("{0}")] Validation(String),
    #[error("Bad Request: {0}")] BadRequest(String),
    #[error("Payload Too Large")] PayloadTooLarge,
    #[error("Rate limit exceeded: {limit}")] RateLimited { limit: String, retry_after_secs: u64 },
    /// The source is logged when the response is built and never sent to the client.
    #[error("Internal Server Error")] Internal(#[source] anyhow::Error),
}

impl ApiError {
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        ApiError::Internal(err.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound => "not_found",
            ApiError::Validation(_) => "validation_error",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::PayloadTooLarge => "payload_too_large",
            ApiError::RateLimited { .. } => "rate_limited",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> { error: ErrorObj<'a> }
#[derive(Serialize)]
struct ErrorObj<'a> { code: &'a str, message: &'a str }

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        match &self {
            ApiError::Internal(source) => tracing::error!(error = %format!("{source:#}"), "unhandled failure"),
            ApiError::RateLimited { limit, retry_after_secs } => {
                tracing::warn!(%limit, retry_after_secs, "rate limit exceeded")
            }
            _ => {}
        }
        let msg = self.to_string();
        let mut res = (status, Json(ErrorBody { error: ErrorObj { code, message: &msg } })).into_response();
        if let ApiError::RateLimited { retry_after_secs, .. } = self {
            res.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        res
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
