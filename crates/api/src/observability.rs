use tracing_subscriber::{fmt, EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use iot_core::config::AppConfig;

pub fn init_tracing(cfg: &AppConfig) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Option<Layer> is a no-op layer when None, so both formats share one registry type
    let (json, text) = match cfg.logging.log_format.as_str() {
        "json" => (Some(fmt::layer().json().with_target(false)), None),
        _ => (None, Some(fmt::layer().with_target(false))),
    };
    tracing_subscriber::registry().with(env_filter).with(json).with(text).init();
}

pub const REQUEST_ID_HEADER: &str = "x-request-id";
