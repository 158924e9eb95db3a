//! Request body validation.
//!
//! Bodies are parsed as untyped JSON first and then checked field by field, so
//! a missing or mistyped field is reported as a 400 naming that field instead
//! of a generic deserialization failure.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    Json,
};
use iot_core::error::{ApiError, ApiResult};
use serde_json::{Map, Value};

/// Builds a validated value out of an untyped JSON body.
pub trait FromBody: Sized {
    fn from_body(body: &Value) -> ApiResult<Self>;
}

/// Extractor that only yields bodies which passed `T::from_body`.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: FromBody,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(body) = Json::<Value>::from_request(req, state).await.map_err(json_rejection)?;
        T::from_body(&body).map(ValidatedJson).map_err(|e| {
            tracing::warn!(error = %e, "request validation failed");
            e
        })
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::PayloadTooLarge;
    }
    tracing::warn!(error = %rejection.body_text(), "unreadable request body");
    ApiError::BadRequest(rejection.body_text())
}

fn invalid(path: &str, reason: impl std::fmt::Display) -> ApiError {
    ApiError::Validation(format!("{path}: {reason}"))
}

/// Last segment of a dotted field path (`from.lat` -> `lat`).
fn key_of(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

pub fn body_object(body: &Value) -> ApiResult<&Map<String, Value>> {
    body.as_object()
        .ok_or_else(|| ApiError::Validation("request body must be a JSON object".into()))
}

pub fn require<'a>(obj: &'a Map<String, Value>, path: &str) -> ApiResult<&'a Value> {
    match obj.get(key_of(path)) {
        Some(Value::Null) | None => Err(invalid(path, "field required")),
        Some(v) => Ok(v),
    }
}

pub fn require_str<'a>(obj: &'a Map<String, Value>, path: &str) -> ApiResult<&'a str> {
    require(obj, path)?.as_str().ok_or_else(|| invalid(path, "must be a string"))
}

pub fn require_object<'a>(obj: &'a Map<String, Value>, path: &str) -> ApiResult<&'a Map<String, Value>> {
    require(obj, path)?.as_object().ok_or_else(|| invalid(path, "must be an object"))
}

pub fn require_number_in(obj: &Map<String, Value>, path: &str, min: f64, max: f64) -> ApiResult<f64> {
    let n = require(obj, path)?.as_f64().ok_or_else(|| invalid(path, "must be a number"))?;
    if !(min..=max).contains(&n) {
        return Err(invalid(path, format!("must be between {min} and {max}")));
    }
    Ok(n)
}

/// Trims surrounding whitespace; the trimmed text must be non-blank and at most
/// `max_chars` characters long.
pub fn trimmed_text(value: &str, path: &str, max_chars: usize) -> ApiResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid(path, "cannot be empty or only whitespace"));
    }
    if trimmed.chars().count() > max_chars {
        return Err(invalid(path, format!("must be at most {max_chars} characters")));
    }
    Ok(trimmed.to_string())
}
