//! Per-IP rate limiting middleware using governor.

use axum::{
    extract::{ConnectInfo, Request},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::keyed::DashMapStateStore,
    Quota, RateLimiter,
};
use std::{net::IpAddr, net::SocketAddr, num::NonZeroU32, sync::Arc, time::Duration};
use tracing::warn;

use crate::error::ApiError;

pub type KeyedRateLimiter =
    RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock, NoOpMiddleware>;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window_secs: u64,
    pub enabled: bool,
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 60,
            window_secs: 60,
            enabled: true,
            burst_size: 30,
        }
    }
}

impl RateLimitConfig {
    pub fn new(requests_per_window: u32, window_secs: u64) -> Self {
        Self {
            requests_per_window,
            window_secs,
            enabled: true,
            burst_size: requests_per_window / 2,
        }
    }

    pub fn strict() -> Self {
        Self {
            requests_per_window: 20,
            window_secs: 60,
            enabled: true,
            burst_size: 10,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn create_limiter(&self) -> Option<Arc<KeyedRateLimiter>> {
        if !self.enabled || self.requests_per_window == 0 {
            return None;
        }

        // 60 requests per 60s replenishes one token per second.
        let replenish_interval_ns =
            (self.window_secs as u128 * 1_000_000_000) / self.requests_per_window as u128;
        let replenish_interval = Duration::from_nanos(replenish_interval_ns as u64);
        let burst = NonZeroU32::new(self.burst_size).unwrap_or(NonZeroU32::MIN);

        let quota = Quota::with_period(replenish_interval)?.allow_burst(burst);
        Some(Arc::new(RateLimiter::dashmap(quota)))
    }
}

#[derive(Clone)]
pub struct RateLimitState {
    pub global_limiter: Option<Arc<KeyedRateLimiter>>,
    pub auth_limiter: Option<Arc<KeyedRateLimiter>>,
    pub config: RateLimitConfig,
}

impl RateLimitState {
    pub fn new() -> Self {
        let config = RateLimitConfig::default();
        let auth_config = RateLimitConfig::strict();

        Self {
            global_limiter: config.create_limiter(),
            auth_limiter: auth_config.create_limiter(),
            config,
        }
    }

    pub fn with_config(global_config: RateLimitConfig, auth_config: RateLimitConfig) -> Self {
        Self {
            global_limiter: global_config.create_limiter(),
            auth_limiter: auth_config.create_limiter(),
            config: global_config,
        }
    }

    pub fn disabled() -> Self {
        Self {
            global_limiter: None,
            auth_limiter: None,
            config: RateLimitConfig::disabled(),
        }
    }
}

impl Default for RateLimitState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct RateLimitExceeded {
    pub message: &'static str,
    pub retry_after_secs: u64,
}

impl IntoResponse for RateLimitExceeded {
    fn into_response(self) -> Response {
        let retry_after = self.retry_after_secs.to_string();
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ApiError::new(self.message, "RATE_LIMITED")),
        )
            .into_response();

        if let Ok(value) = HeaderValue::from_str(&retry_after) {
            response.headers_mut().insert(header::RETRY_AFTER, value.clone());
            response.headers_mut().insert("X-RateLimit-Reset", value);
        }

        response
    }
}

/// Peer address recorded by `into_make_service_with_connect_info`.
pub fn client_ip(req: &Request) -> IpAddr {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED))
}

pub async fn rate_limit_middleware(
    rate_limit_state: Option<axum::extract::Extension<RateLimitState>>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitExceeded> {
    let state = match rate_limit_state {
        Some(axum::extract::Extension(state)) => state,
        None => return Ok(next.run(request).await),
    };

    let limiter = match &state.global_limiter {
        Some(limiter) => limiter,
        None => return Ok(next.run(request).await),
    };

    let ip = client_ip(&request);

    match limiter.check_key(&ip) {
        Ok(_) => {
            let mut response = next.run(request).await;
            add_rate_limit_headers(&mut response, &state.config);
            Ok(response)
        }
        Err(not_until) => {
            let wait_duration = not_until.wait_time_from(DefaultClock::default().now());
            let retry_after = wait_duration.as_secs().max(1);

            warn!(ip = %ip, retry_after_secs = retry_after, "Rate limit exceeded");

            Err(RateLimitExceeded {
                message: "Too many requests, please slow down",
                retry_after_secs: retry_after,
            })
        }
    }
}

pub async fn auth_rate_limit_middleware(
    rate_limit_state: Option<axum::extract::Extension<RateLimitState>>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitExceeded> {
    let state = match rate_limit_state {
        Some(axum::extract::Extension(state)) => state,
        None => return Ok(next.run(request).await),
    };

    let limiter = match &state.auth_limiter {
        Some(limiter) => limiter,
        None => return Ok(next.run(request).await),
    };

    let ip = client_ip(&request);

    match limiter.check_key(&ip) {
        Ok(_) => {
            let mut response = next.run(request).await;
            add_rate_limit_headers(&mut response, &state.config);
            Ok(response)
        }
        Err(not_until) => {
            let wait_duration = not_until.wait_time_from(DefaultClock::default().now());
            let retry_after = wait_duration.as_secs().max(1);

            warn!(ip = %ip, retry_after_secs = retry_after, "Auth rate limit exceeded");

            Err(RateLimitExceeded {
                message: "Too many authentication attempts, please try again later",
                retry_after_secs: retry_after,
            })
        }
    }
}

fn add_rate_limit_headers(response: &mut Response, config: &RateLimitConfig) {
    if let Ok(value) = HeaderValue::from_str(&config.requests_per_window.to_string()) {
        response.headers_mut().insert("X-RateLimit-Limit", value);
    }
}
