use axum::http::HeaderValue;
use iot_core::config::AppConfig;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

/// Credentialed CORS for the configured origins. Methods and headers are
/// mirrored from the preflight, which is how "allow all" works once
/// credentials are on. A `*` entry mirrors any origin.
pub fn build_cors(cfg: &AppConfig) -> CorsLayer {
    let origins = cfg.cors_origins_list();
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        }))
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}
