use std::sync::Arc;
use iot_core::config::AppConfig;
use iot_core::rate::RouteKey;
use iot_model::ReplyProvider;

use crate::rate_limit::{RateLimiter, RouteLimit};

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn ReplyProvider>,
    pub limiter: Arc<RateLimiter>,
    pub cfg: Arc<AppConfig>,
}

impl AppState {
    pub fn new(provider: Arc<dyn ReplyProvider>, cfg: Arc<AppConfig>) -> Self {
        let limiter = Arc::new(RateLimiter::from_config(&cfg.rate_limit));
        Self { provider, limiter, cfg }
    }

    /// Limiter state for one route, using that route's configured expression.
    pub fn route_limit(&self, route: RouteKey) -> RouteLimit {
        RouteLimit::new(self.limiter.clone(), route, self.cfg.rate_limit.spec_for(route))
    }
}
