use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use iot_core::config::RateLimitSection;
use iot_core::error::{ApiError, ApiResult};
use iot_core::rate::{RateLimitSpec, RouteKey};

/// Fixed window opened by the first request of a client on a route.
#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    started: Instant,
    period: Duration,
}

impl Window {
    fn open(now: Instant, period: Duration) -> Self {
        Self { count: 0, started: now, period }
    }

    fn expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started) >= self.period
    }
}

/// Whole seconds until the rejected client's window resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAfter(pub u64);

pub struct RateLimiter {
    enabled: bool,
    max_tracked: usize,
    epoch: Instant,
    /// Millis after `epoch` before which no sweep runs, even when over `max_tracked`.
    next_prune_ms: AtomicU64,
    windows: DashMap<(IpAddr, RouteKey), Window>,
}

impl RateLimiter {
    pub fn new(enabled: bool, max_tracked: usize) -> Self {
        Self {
            enabled,
            max_tracked,
            epoch: Instant::now(),
            next_prune_ms: AtomicU64::new(0),
            windows: DashMap::new(),
        }
    }

    pub fn from_config(cfg: &RateLimitSection) -> Self {
        Self::new(cfg.enabled, cfg.max_tracked_clients)
    }

    pub fn is_enabled(&self) -> bool { self.enabled }

    pub fn tracked(&self) -> usize { self.windows.len() }

    pub fn check(&self, ip: IpAddr, route: RouteKey, spec: &RateLimitSpec) -> Result<(), RetryAfter> {
        self.check_at(ip, route, spec, Instant::now())
    }

    /// Counts one request at `now`. Rejected requests are not counted.
    pub fn check_at(&self, ip: IpAddr, route: RouteKey, spec: &RateLimitSpec, now: Instant) -> Result<(), RetryAfter> {
        if !self.enabled { return Ok(()); }
        let period = spec.period();
        // must run before `entry` below: retain takes every shard lock
        if self.claim_prune(now, period) { self.prune_expired(now); }

        // the entry guard holds the shard lock, so increment-and-check is atomic per key
        let mut window = self.windows.entry((ip, route)).or_insert_with(|| Window::open(now, period));
        if window.expired(now) { *window = Window::open(now, period); }
        if window.count >= spec.max_requests {
            let elapsed = now.saturating_duration_since(window.started);
            return Err(RetryAfter(ceil_secs(window.period.saturating_sub(elapsed))));
        }
        window.count += 1;
        Ok(())
    }

    /// True for at most one caller per `period`, and only once the map is over its cap.
    /// The time gate is read before `len()`, which read-locks every shard.
    fn claim_prune(&self, now: Instant, period: Duration) -> bool {
        let now_ms = millis(now.saturating_duration_since(self.epoch));
        let due = self.next_prune_ms.load(Ordering::Acquire);
        if now_ms < due || self.windows.len() < self.max_tracked {
            return false;
        }
        let next = now_ms.saturating_add(millis(period));
        self.next_prune_ms.compare_exchange(due, next, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    /// Drops windows whose period has passed; returns how many were removed.
    pub fn prune_expired(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, w| !w.expired(now));
        let removed = before.saturating_sub(self.windows.len());
        if removed > 0 { tracing::debug!(removed, "pruned expired rate limit windows"); }
        removed
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn ceil_secs(d: Duration) -> u64 {
    (d.as_secs() + u64::from(d.subsec_nanos() > 0)).max(1)
}

/// State for one route's `enforce_rate_limit` layer.
#[derive(Clone)]
pub struct RouteLimit {
    limiter: Arc<RateLimiter>,
    route: RouteKey,
    spec: RateLimitSpec,
}

impl RouteLimit {
    pub fn new(limiter: Arc<RateLimiter>, route: RouteKey, spec: RateLimitSpec) -> Self {
        Self { limiter, route, spec }
    }
}

pub async fn enforce_rate_limit(
    State(limit): State<RouteLimit>,
    peer: Option<ConnectInfo<SocketAddr>>,
    req: Request,
    next: Next,
) -> ApiResult<Response> {
    let ip = match peer {
        Some(ConnectInfo(addr)) => addr.ip(),
        None => {
            tracing::warn!(route = limit.route.as_str(), "no peer address, rate limiting as localhost");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    };
    limit.limiter.check(ip, limit.route, &limit.spec).map_err(|RetryAfter(secs)| {
        tracing::info!(%ip, route = limit.route.as_str(), "request rejected by rate limit");
        ApiError::RateLimited { limit: limit.spec.to_string(), retry_after_secs: secs }
    })?;
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr { IpAddr::V4(Ipv4Addr::new(10, 0, 0, last)) }

    #[test]
    fn test_rejects_over_limit_then_resets_next_window() {
        let limiter = RateLimiter::new(true, 100);
        let spec = RateLimitSpec::per_minute(2);
        let t0 = Instant::now();

        assert!(limiter.check_at(ip(1), RouteKey::Chat, &spec, t0).is_ok());
        assert!(limiter.check_at(ip(1), RouteKey::Chat, &spec, t0 + Duration::from_secs(1)).is_ok());
        assert_eq!(
            limiter.check_at(ip(1), RouteKey::Chat, &spec, t0 + Duration::from_secs(2)),
            Err(RetryAfter(58))
        );
        assert!(limiter.check_at(ip(1), RouteKey::Chat, &spec, t0 + Duration::from_secs(60)).is_ok());
    }

    #[test]
    fn test_rejected_requests_do_not_extend_window() {
        let limiter = RateLimiter::new(true, 100);
        let spec = RateLimitSpec::per_minute(1);
        let t0 = Instant::now();

        assert!(limiter.check_at(ip(1), RouteKey::Chat, &spec, t0).is_ok());
        for s in 1..59 {
            assert!(limiter.check_at(ip(1), RouteKey::Chat, &spec, t0 + Duration::from_secs(s)).is_err());
        }
        assert!(limiter.check_at(ip(1), RouteKey::Chat, &spec, t0 + Duration::from_secs(60)).is_ok());
        assert!(limiter.check_at(ip(1), RouteKey::Chat, &spec, t0 + Duration::from_secs(61)).is_err());
    }

    #[test]
    fn test_counters_are_per_client_and_route() {
        let limiter = RateLimiter::new(true, 100);
        let spec = RateLimitSpec::per_minute(1);
        let t0 = Instant::now();

        assert!(limiter.check_at(ip(1), RouteKey::Chat, &spec, t0).is_ok());
        assert!(limiter.check_at(ip(2), RouteKey::Chat, &spec, t0).is_ok());
        assert!(limiter.check_at(ip(1), RouteKey::RouteOptions, &spec, t0).is_ok());
        assert!(limiter.check_at(ip(1), RouteKey::Chat, &spec, t0).is_err());
        assert_eq!(limiter.tracked(), 3);
    }

    #[test]
    fn test_disabled_never_rejects() {
        let limiter = RateLimiter::new(false, 100);
        let spec = RateLimitSpec::per_minute(1);
        let t0 = Instant::now();
        for _ in 0..100 {
            assert!(limiter.check_at(ip(1), RouteKey::Chat, &spec, t0).is_ok());
        }
        assert_eq!(limiter.tracked(), 0);
    }

    #[test]
    fn test_prunes_expired_windows_when_full() {
        let limiter = RateLimiter::new(true, 2);
        let spec = RateLimitSpec::per_minute(5);
        let t0 = Instant::now();

        limiter.check_at(ip(1), RouteKey::Chat, &spec, t0).unwrap();
        limiter.check_at(ip(2), RouteKey::Chat, &spec, t0).unwrap();
        assert_eq!(limiter.tracked(), 2);

        limiter.check_at(ip(3), RouteKey::Chat, &spec, t0 + Duration::from_secs(61)).unwrap();
        assert_eq!(limiter.tracked(), 1);
    }

    #[test]
    fn test_saturated_map_sweeps_at_most_once_per_period() {
        let limiter = RateLimiter::new(true, 2);
        let spec = RateLimitSpec::per_minute(5);
        let t0 = Instant::now();
        let at = |s: u64| t0 + Duration::from_secs(s);

        limiter.check_at(ip(1), RouteKey::Chat, &spec, at(0)).unwrap();
        limiter.check_at(ip(2), RouteKey::Chat, &spec, at(30)).unwrap();
        // over the cap with nothing expired: one sweep, next one not before 90s
        limiter.check_at(ip(3), RouteKey::Chat, &spec, at(30)).unwrap();
        for n in 10..60 {
            limiter.check_at(ip(n), RouteKey::Chat, &spec, at(30)).unwrap();
        }
        assert_eq!(limiter.tracked(), 53);

        // ip(1) expired at 60s but stays until the next sweep is due
        limiter.check_at(ip(4), RouteKey::Chat, &spec, at(70)).unwrap();
        assert_eq!(limiter.tracked(), 54);

        limiter.check_at(ip(5), RouteKey::Chat, &spec, at(91)).unwrap();
        // only the windows opened at 70s and 91s are still live
        assert_eq!(limiter.tracked(), 2);
    }

    #[test]
    fn test_concurrent_clients_do_not_interfere() {
        let limiter = Arc::new(RateLimiter::new(true, 10_000));
        let spec = RateLimitSpec::per_minute(50);
        let handles: Vec<_> = (0..8u8)
            .map(|n| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    (0..60).filter(|_| limiter.check(ip(n), RouteKey::Chat, &spec).is_ok()).count()
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 50);
        }
    }
}
