//! Last-resort error handling around the whole router.

use std::any::Any;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use iot_core::error::ApiError;

/// Panic handler for `CatchPanicLayer`: logs the payload, answers with a generic 500.
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "non-string panic payload".to_string()
    };
    ApiError::internal(anyhow::anyhow!("handler panicked: {detail}")).into_response()
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// `RequestBodyLimitLayer` rejects oversized `Content-Length` requests with a
/// plain-text 413 before any extractor runs; this rewrites those into the JSON error body.
pub async fn payload_too_large_as_json(res: Response) -> Response {
    if res.status() != StatusCode::PAYLOAD_TOO_LARGE || is_json(&res) {
        return res;
    }
    ApiError::PayloadTooLarge.into_response()
}

fn is_json(res: &Response) -> bool {
    res.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[tokio::test]
    async fn test_panic_payload_not_exposed() {
        let res = handle_panic(Box::new("token=abc123".to_string()));
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("Internal Server Error"));
        assert!(!body.contains("abc123"));
    }

    #[tokio::test]
    async fn test_not_found_is_json() {
        let res = not_found().await.into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_plain_413_becomes_json() {
        let plain = Response::builder()
            .status(StatusCode::PAYLOAD_TOO_LARGE)
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Body::from("length limit exceeded"))
            .unwrap();
        let res = payload_too_large_as_json(plain).await;
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"]["code"], "payload_too_large");
    }

    #[tokio::test]
    async fn test_other_responses_pass_through() {
        let ok = Response::builder().status(StatusCode::OK).body(Body::from("fine")).unwrap();
        let res = payload_too_large_as_json(ok).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"fine");
    }
}
