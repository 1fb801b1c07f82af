use std::{
    collections::HashMap,
    env,
    net::{IpAddr, SocketAddr},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use axum::{
    body::Body,
    extract::{connect_info::ConnectInfo, MatchedPath, State},
    http::{header::RETRY_AFTER, HeaderName, HeaderValue, Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;

const DEFAULT_READ_LIMIT_PER_MINUTE: u32 = 100;
const DEFAULT_WRITE_LIMIT_PER_MINUTE: u32 = 20;
const DEFAULT_HEALTH_LIMIT_PER_MINUTE: u32 = 10_000;
const DEFAULT_WINDOW_SECONDS: u64 = 60;

const HEADER_RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const HEADER_RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const HEADER_RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Per-client fixed-window limiter. Each client gets one bucket per budget
/// class, so heavy status polling never eats into the contribution budget.
#[derive(Clone)]
pub struct RateLimitState {
    config: Arc<RateLimitConfig>,
    buckets: Arc<Mutex<Buckets>>,
}

struct Buckets {
    entries: HashMap<BucketKey, BucketState>,
    last_sweep: Instant,
}

impl Buckets {
    fn new(now: Instant) -> Self {
        Self {
            entries: HashMap::new(),
            last_sweep: now,
        }
    }

    /// Drop buckets whose window has run out, at most once per window.
    fn sweep(&mut self, now: Instant, window: Duration) {
        if now.duration_since(self.last_sweep) < window {
            return;
        }
        let before = self.entries.len();
        self.entries
            .retain(|_, bucket| now.duration_since(bucket.window_start) < window);
        self.last_sweep = now;

        let evicted = before - self.entries.len();
        if evicted > 0 {
            tracing::debug!(evicted, tracked = self.entries.len(), "expired rate limit buckets");
        }
    }
}

impl RateLimitState {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::new(RateLimitConfig::from_lookup(&lookup))
    }

    fn new(config: RateLimitConfig) -> Self {
        Self {
            config: Arc::new(config),
            buckets: Arc::new(Mutex::new(Buckets::new(Instant::now()))),
        }
    }

    fn check_request<B>(&self, request: &Request<B>) -> RateLimitDecision {
        let class = classify(request);
        let limit = self.config.limit_for(class);
        let key = BucketKey {
            ip: extract_client_ip(request),
            class,
        };
        let now = Instant::now();

        // A poisoned lock only means another request panicked mid-update;
        // the counters are still usable.
        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        buckets.sweep(now, self.config.window);

        let bucket = buckets.entries.entry(key).or_insert_with(|| BucketState {
            window_start: now,
            count: 0,
        });

        if now.duration_since(bucket.window_start) >= self.config.window {
            bucket.window_start = now;
            bucket.count = 0;
        }

        let remaining_window = self
            .config
            .window
            .saturating_sub(now.duration_since(bucket.window_start));
        let reset_seconds = ceil_duration_to_seconds(remaining_window).max(1);

        if bucket.count >= limit {
            return RateLimitDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset_seconds,
            };
        }

        bucket.count += 1;

        RateLimitDecision {
            allowed: true,
            limit,
            remaining: limit.saturating_sub(bucket.count),
            reset_seconds,
        }
    }
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
enum BudgetClass {
    Read,
    Write,
    Health,
}

fn classify<B>(request: &Request<B>) -> BudgetClass {
    let method = request.method();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str())
        .unwrap_or_else(|| request.uri().path());

    if path == "/health" || path == "/metrics" || method == Method::OPTIONS {
        BudgetClass::Health
    } else if is_write_method(method) {
        BudgetClass::Write
    } else {
        BudgetClass::Read
    }
}

struct RateLimitConfig {
    read_limit: u32,
    write_limit: u32,
    health_limit: u32,
    window: Duration,
}

impl RateLimitConfig {
    fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read_limit = positive_or(
            lookup,
            "RATE_LIMIT_READ_PER_MINUTE",
            DEFAULT_READ_LIMIT_PER_MINUTE,
        );
        let write_limit = positive_or(
            lookup,
            "RATE_LIMIT_WRITE_PER_MINUTE",
            DEFAULT_WRITE_LIMIT_PER_MINUTE,
        );
        let health_limit = positive_or(
            lookup,
            "RATE_LIMIT_HEALTH_PER_MINUTE",
            DEFAULT_HEALTH_LIMIT_PER_MINUTE,
        );
        let window_seconds =
            positive_or(lookup, "RATE_LIMIT_WINDOW_SECONDS", DEFAULT_WINDOW_SECONDS);

        tracing::info!(
            read_limit,
            write_limit,
            health_limit,
            window_seconds,
            "Rate limiter configured"
        );

        Self {
            read_limit,
            write_limit,
            health_limit,
            window: Duration::from_secs(window_seconds),
        }
    }

    fn limit_for(&self, class: BudgetClass) -> u32 {
        match class {
            BudgetClass::Read => self.read_limit,
            BudgetClass::Write => self.write_limit,
            BudgetClass::Health => self.health_limit,
        }
    }
}

#[derive(Hash, Eq, PartialEq)]
struct BucketKey {
    ip: String,
    class: BudgetClass,
}

struct BucketState {
    window_start: Instant,
    count: u32,
}

struct RateLimitDecision {
    allowed: bool,
    limit: u32,
    remaining: u32,
    reset_seconds: u64,
}

pub async fn rate_limit_middleware(
    State(rate_limiter): State<RateLimitState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let decision = rate_limiter.check_request(&request);

    if !decision.allowed {
        tracing::warn!(
            path = %request.uri().path(),
            limit = decision.limit,
            "rate limit exceeded"
        );
        let mut response = ApiError::too_many_requests(format!(
            "Rate limit exceeded, retry in {}s",
            decision.reset_seconds
        ))
        .into_response();
        attach_rate_limit_headers(&mut response, &decision);
        response.headers_mut().insert(
            RETRY_AFTER,
            HeaderValue::from_str(&decision.reset_seconds.to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("1")),
        );
        return response;
    }

    let mut response = next.run(request).await;
    attach_rate_limit_headers(&mut response, &decision);
    response
}

fn attach_rate_limit_headers(response: &mut Response, decision: &RateLimitDecision) {
    response.headers_mut().insert(
        HEADER_RATE_LIMIT_LIMIT,
        HeaderValue::from_str(&decision.limit.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
    response.headers_mut().insert(
        HEADER_RATE_LIMIT_REMAINING,
        HeaderValue::from_str(&decision.remaining.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
    response.headers_mut().insert(
        HEADER_RATE_LIMIT_RESET,
        HeaderValue::from_str(&decision.reset_seconds.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("1")),
    );
}

fn extract_client_ip<B>(request: &Request<B>) -> String {
    if let Some(ip) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(parse_x_forwarded_for)
    {
        return ip.to_string();
    }

    if let Some(ip) = request
        .headers()
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .and_then(parse_ip_addr)
    {
        return ip.to_string();
    }

    if let Some(connect_info) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return connect_info.0.ip().to_string();
    }

    "unknown".to_string()
}

fn parse_x_forwarded_for(raw: &str) -> Option<IpAddr> {
    raw.split(',').map(str::trim).find_map(parse_ip_addr)
}

fn parse_ip_addr(raw: &str) -> Option<IpAddr> {
    raw.parse::<IpAddr>()
        .ok()
        .or_else(|| raw.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}

fn is_write_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn positive_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + PartialOrd + Default + std::fmt::Display + Copy,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) if value > T::default() => value,
            _ => {
                tracing::warn!("Invalid value for {key} (`{raw}`), using default {default}");
                default
            }
        },
        None => default,
    }
}

fn ceil_duration_to_seconds(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
