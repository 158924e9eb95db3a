use axum::middleware;
use axum::{
    extract::State,
    Json,
};
use axum::{
    routing::{get, post},
    Router,
};
use iot_core::error::{ApiError, ApiResult};
use iot_core::rate::RouteKey;
use serde::Serialize;

use crate::rate_limit::enforce_rate_limit;
use crate::schemas::{ChatRequest, ChatResponse, GeoPoint, RouteOption, RouteOptionsRequest, RouteOptionsResponse};
use crate::state::AppState;
use crate::validation::ValidatedJson;

/// Routes mounted under `/api`. Rate limits run before body extraction, so an
/// over-limit request never reaches validation or the handler.
pub fn routes(state: &AppState) -> Router<AppState> {
    let chat_routes = Router::new()
        .route("/chat", post(chat))
        .route_layer(middleware::from_fn_with_state(state.route_limit(RouteKey::Chat), enforce_rate_limit));

    let route_option_routes = Router::new()
        .route("/route-options", post(route_options))
        .route_layer(middleware::from_fn_with_state(
            state.route_limit(RouteKey::RouteOptions),
            enforce_rate_limit,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(chat_routes)
        .merge(route_option_routes)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn chat(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    // length only: prompt text stays out of the logs
    tracing::info!(prompt_len = req.prompt.chars().count(), "received chat prompt");

    let reply = state
        .provider
        .generate_reply(&req.prompt)
        .await
        .map_err(|e| ApiError::Internal(anyhow::Error::new(e).context("reply provider failed")))?;
    Ok(Json(ChatResponse { reply }))
}

async fn route_options(ValidatedJson(req): ValidatedJson<RouteOptionsRequest>) -> Json<RouteOptionsResponse> {
    let options = estimate_route_options(&req.from, &req.to);
    tracing::info!(options = options.len(), "computed route options");
    Json(RouteOptionsResponse { options })
}

/// Travel modes with their assumed average speed in km/h.
const TRAVEL_MODES: [(&str, f64); 2] = [("walking", 5.0), ("driving", 40.0)];

/// Straight-line estimate until a routing service is wired in.
pub fn estimate_route_options(from: &GeoPoint, to: &GeoPoint) -> Vec<RouteOption> {
    let km = from.distance_km(to);
    TRAVEL_MODES
        .iter()
        .map(|(id, kmh)| RouteOption {
            id: (*id).to_string(),
            eta_mins: ((km / kmh * 60.0).ceil() as u32).max(1),
        })
        .collect()
}
