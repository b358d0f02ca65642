//! Per-client fixed-window rate limiting for the `/api` routes.

use crate::constants::MSG_RATE_LIMITED;
use crate::error::HttpAppError;
use crate::services::{notify, Notification};
use crate::state::AppState;
use crate::utils::ip_extraction::client_ip_from_parts;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use kabox_core::AppError;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const SHARD_COUNT: usize = 16;
const MAX_BUCKETS_PER_SHARD: usize = 10_000;

#[derive(Clone)]
struct RateLimitBucket {
    count: u32,
    reset_at: Instant,
}

impl RateLimitBucket {
    fn new(window: Duration) -> Self {
        Self {
            count: 0,
            reset_at: Instant::now() + window,
        }
    }

    fn check_and_increment(&mut self, limit: u32, window: Duration) -> Result<u32, Duration> {
        let now = Instant::now();

        if now >= self.reset_at {
            self.count = 0;
            self.reset_at = now + window;
        }

        if self.count < limit {
            self.count += 1;
            Ok(limit - self.count)
        } else {
            Err(self.reset_at.saturating_duration_since(now))
        }
    }
}

/// Sharded in-memory limiter. Keys hash to one of several mutex-guarded maps.
pub struct HttpRateLimiter {
    shards: Vec<Mutex<HashMap<String, RateLimitBucket>>>,
    limit: u32,
    window: Duration,
}

impl HttpRateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        let shards = (0..SHARD_COUNT)
            .map(|_| Mutex::new(HashMap::new()))
            .collect();
        Self {
            shards,
            limit,
            window,
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    fn shard(&self, key: &str) -> &Mutex<HashMap<String, RateLimitBucket>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % self.shards.len()]
    }

    /// `Ok(remaining)` when allowed, `Err(reset_in)` when the window is used up.
    pub async fn check(&self, key: &str) -> Result<u32, Duration> {
        let mut buckets = self.shard(key).lock().await;

        if buckets.len() >= MAX_BUCKETS_PER_SHARD {
            let now = Instant::now();
            buckets.retain(|_, bucket| bucket.reset_at > now);
        }

        buckets
            .entry(key.to_string())
            .or_insert_with(|| RateLimitBucket::new(self.window))
            .check_and_increment(self.limit, self.window)
    }

    /// Drop buckets whose window has passed.
    pub async fn cleanup_expired_buckets(&self) {
        let now = Instant::now();
        let mut cleaned = 0;
        for shard in &self.shards {
            let mut buckets = shard.lock().await;
            let before = buckets.len();
            buckets.retain(|_, bucket| bucket.reset_at > now);
            cleaned += before - buckets.len();
        }
        if cleaned > 0 {
            tracing::debug!(buckets_cleaned = cleaned, "Cleaned up expired rate limit buckets");
        }
    }
}

fn set_header(headers: &mut HeaderMap, name: &'static str, value: impl ToString) {
    if let Ok(header_value) = HeaderValue::from_str(&value.to_string()) {
        headers.insert(name, header_value);
    }
}

/// Rate limiting middleware
///
/// Adds `X-RateLimit-Limit` and `X-RateLimit-Remaining` to every response and answers
/// `429` with `Retry-After` once the client's window is used up.
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip_from_parts(
        request.headers(),
        request.extensions(),
        state.config.trusted_proxy_count(),
    );
    let limiter = &state.rate_limiter;

    match limiter.check(&format!("ip:{}", ip)).await {
        Ok(remaining) => {
            let mut response = next.run(request).await;
            set_header(response.headers_mut(), "X-RateLimit-Limit", limiter.limit());
            set_header(response.headers_mut(), "X-RateLimit-Remaining", remaining);
            response
        }
        Err(reset_in) => {
            let path = request.uri().path().to_string();
            tracing::warn!(client_ip = %ip, path = %path, "Rate limit exceeded");
            notify(&state.notifier, Notification::RateLimited { ip, path });

            let mut response =
                HttpAppError(AppError::TooManyRequests(MSG_RATE_LIMITED.to_string()))
                    .into_response();
            let retry_after = reset_in.as_secs_f64().ceil().max(1.0) as u64;
            set_header(response.headers_mut(), "X-RateLimit-Limit", limiter.limit());
            set_header(response.headers_mut(), "X-RateLimit-Remaining", 0);
            set_header(response.headers_mut(), "Retry-After", retry_after);
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_window_allows_limit_then_blocks() {
        let limiter = HttpRateLimiter::new(3, Duration::from_secs(60));

        assert_eq!(limiter.check("ip:1.1.1.1").await, Ok(2));
        assert_eq!(limiter.check("ip:1.1.1.1").await, Ok(1));
        assert_eq!(limiter.check("ip:1.1.1.1").await, Ok(0));
        assert!(limiter.check("ip:1.1.1.1").await.is_err());

        // Other clients keep their own window.
        assert_eq!(limiter.check("ip:2.2.2.2").await, Ok(2));
    }

    #[tokio::test]
    async fn test_window_resets() {
        let limiter = HttpRateLimiter::new(1, Duration::from_millis(20));

        assert!(limiter.check("ip:1.1.1.1").await.is_ok());
        assert!(limiter.check("ip:1.1.1.1").await.is_err());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(limiter.check("ip:1.1.1.1").await.is_ok());
    }

    #[tokio::test]
    async fn test_cleanup_drops_expired_buckets() {
        let limiter = HttpRateLimiter::new(5, Duration::from_millis(10));
        limiter.check("ip:1.1.1.1").await.ok();
        tokio::time::sleep(Duration::from_millis(20)).await;
        limiter.cleanup_expired_buckets().await;

        for shard in &limiter.shards {
            assert!(shard.lock().await.is_empty());
        }
    }
}
