use std::{net::SocketAddr, sync::Arc};
use axum::body::Body;
use axum::http::{self, header::HeaderName, HeaderValue};
use axum::Router;
use iot_core::config::AppConfig;
use iot_model::{PlaceholderProvider, ReplyProvider};
use tower::{limit::GlobalConcurrencyLimitLayer, ServiceBuilder};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::error_boundary::{handle_panic, not_found, payload_too_large_as_json};
use crate::{cors::build_cors, observability::REQUEST_ID_HEADER, routes, state::AppState};

#[derive(Clone)]
struct MakeRequestUuid;
impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string()).ok().map(RequestId::new)
    }
}

pub fn build_app(cfg: Arc<AppConfig>) -> AppStateAndRouter {
    build_app_with_provider(cfg, Arc::new(PlaceholderProvider))
}

/// Layer order, outermost first: CORS, request id, trace, panic boundary,
/// JSON 413 rewrite, body limit, concurrency limit, then the per-route rate limits.
/// The concurrency semaphore is shared by every route.
pub fn build_app_with_provider(cfg: Arc<AppConfig>, provider: Arc<dyn ReplyProvider>) -> AppStateAndRouter {
    let state = AppState::new(provider, cfg.clone());
    let cors = build_cors(&cfg);
    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    let trace = TraceLayer::new_for_http()
        .make_span_with(|req: &http::Request<Body>| {
            let method = req.method().clone();
            let uri = req.uri().path().to_string();
            let request_id = req
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            tracing::info_span!("request", %method, %uri, %request_id, status = tracing::field::Empty)
        })
        .on_response(|res: &http::Response<_>, latency: std::time::Duration, span: &tracing::Span| {
            let status = res.status().as_u16();
            span.record("status", tracing::field::display(status));
            tracing::info!(parent: span, status, latency_ms = latency.as_millis(), "request.completed");
        });

    let limits = ServiceBuilder::new()
        .layer(RequestBodyLimitLayer::new(cfg.http.max_request_size_bytes))
        .layer(GlobalConcurrencyLimitLayer::new(cfg.http.concurrency_limit));

    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(request_id_header.clone(), MakeRequestUuid))
        .layer(trace)
        .layer(PropagateRequestIdLayer::new(request_id_header))
        .layer(CatchPanicLayer::custom(handle_panic));

    let router = Router::new()
        .nest("/api", routes::routes(&state))
        .fallback(not_found)
        .with_state(state.clone())
        .layer(limits)
        .layer(axum::middleware::map_response(payload_too_large_as_json))
        .layer(middleware)
        .layer(cors);
    AppStateAndRouter { state, router }
}

#[derive(Clone)]
pub struct AppStateAndRouter { pub state: AppState, pub router: Router }

pub fn server_addr(cfg: &AppConfig) -> anyhow::Result<SocketAddr> {
    Ok(format!("{}:{}", cfg.app.host, cfg.app.port).parse()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_addr() {
        let mut cfg = AppConfig::default();
        cfg.app.host = "127.0.0.1".into();
        cfg.app.port = 8080;
        assert_eq!(server_addr(&cfg).unwrap(), "127.0.0.1:8080".parse().unwrap());
        cfg.app.host = "not a host".into();
        assert!(server_addr(&cfg).is_err());
    }
}
