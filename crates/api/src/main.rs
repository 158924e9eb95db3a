use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};
use iot_core::config::AppConfig;
use iot_api::app::{build_app, server_addr};
use iot_api::observability::init_tracing;
use iot_api::shutdown::shutdown_signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Arc::new(AppConfig::load()?);
    init_tracing(&cfg);
    warn_on_open_cors(&cfg);

    let addr = server_addr(&cfg)?;
    let app = build_app(cfg.clone());
    let listener = TcpListener::bind(addr).await?;
    info!(
        %addr,
        env = %cfg.app.env,
        rate_limit_enabled = app.state.limiter.is_enabled(),
        chat_limit = %cfg.rate_limit.chat,
        route_options_limit = %cfg.rate_limit.route_options,
        "starting server"
    );

    let make_svc = app.router.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_svc).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

fn warn_on_open_cors(cfg: &AppConfig) {
    let origins = cfg.cors_origins_list();
    if cfg.is_production() && origins.iter().any(|o| o == "*") {
        warn!("CORS_ORIGINS contains '*' in production; any site can make credentialed requests");
    }
    if origins.is_empty() {
        warn!("CORS_ORIGINS is empty; browsers will block all cross-origin calls");
    }
}
