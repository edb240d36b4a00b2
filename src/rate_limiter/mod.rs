/*!
 * # Rate Limiting Module
 *
 * Fixed-window attempt counters for the public tracking search.
 *
 * Counters live behind the [`CounterStore`] trait: an in-memory `DashMap`
 * store driven by an injectable [`Clock`], or Redis `INCR` + `EXPIRE` with
 * the in-memory store as fallback when Redis is unreachable. Limiting is
 * approximate; concurrent increments across backends may over- or under-count.
 */
use async_trait::async_trait;
use axum::http::HeaderMap;
use dashmap::DashMap;
use metrics::counter;
use redis::AsyncCommands;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("Counter store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<redis::RedisError> for RateLimitError {
    fn from(err: redis::RedisError) -> Self {
        RateLimitError::StoreUnavailable(err.to_string())
    }
}

/// Time source for the in-memory store.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset_millis: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_millis: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset_millis
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + Duration::from_millis(self.offset_millis.load(Ordering::SeqCst))
    }
}

/// Counter value after an increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    pub count: u32,
    pub resets_in: Duration,
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Adds one attempt to `key`. The counter is created on the first attempt
    /// and expires `window` after that.
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount, RateLimitError>;
}

#[derive(Debug, Clone)]
struct RateLimitEntry {
    count: u32,
    window_start: Instant,
}

pub struct InMemoryCounterStore {
    entries: DashMap<String, RateLimitEntry>,
    clock: Arc<dyn Clock>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    fn increment_now(&self, key: &str, window: Duration) -> WindowCount {
        let now = self.clock.now();
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| RateLimitEntry {
                count: 0,
                window_start: now,
            });

        if now.saturating_duration_since(entry.window_start) >= window {
            entry.count = 0;
            entry.window_start = now;
        }
        entry.count = entry.count.saturating_add(1);

        let elapsed = now.saturating_duration_since(entry.window_start);
        WindowCount {
            count: entry.count,
            resets_in: window.saturating_sub(elapsed),
        }
    }

    /// Drops counters whose window has passed.
    pub fn cleanup_expired(&self, window: Duration) {
        let now = self.clock.now();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.window_start) < window);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount, RateLimitError> {
        Ok(self.increment_now(key, window))
    }
}

/// Shares counters between instances through Redis.
pub struct RedisCounterStore {
    client: Arc<redis::Client>,
    namespace: String,
    fallback: InMemoryCounterStore,
}

impl RedisCounterStore {
    pub fn new(client: Arc<redis::Client>, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            fallback: InMemoryCounterStore::new(),
        }
    }

    async fn increment_redis(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<WindowCount, redis::RedisError> {
        let mut conn = self.client.get_async_connection().await?;
        let redis_key = format!("{}:{}", self.namespace, key);
        let window_secs = window.as_secs().max(1);

        let count: i64 = conn.incr(&redis_key, 1).await?;
        if count == 1 {
            let _: Result<(), _> = conn.expire(&redis_key, window_secs as usize).await;
        } else {
            let ttl: i64 = conn.ttl(&redis_key).await.unwrap_or(-1);
            if ttl < 0 {
                let _: Result<(), _> = conn.expire(&redis_key, window_secs as usize).await;
            }
        }

        let ttl_secs = match conn.ttl::<_, i64>(&redis_key).await {
            Ok(ttl) if ttl > 0 => ttl as u64,
            _ => window_secs,
        };

        Ok(WindowCount {
            count: count.clamp(0, u32::MAX as i64) as u32,
            resets_in: Duration::from_secs(ttl_secs),
        })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount, RateLimitError> {
        match self.increment_redis(key, window).await {
            Ok(count) => Ok(count),
            Err(err) => {
                warn!("Redis rate limit error, using in-memory fallback: {}", err);
                self.fallback.increment(key, window).await
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window_duration: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 10,
            window_duration: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_time: Duration,
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, store: Arc<dyn CounterStore>) -> Self {
        Self { store, config }
    }

    pub fn in_memory(config: RateLimitConfig) -> Self {
        Self::new(config, Arc::new(InMemoryCounterStore::new()))
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Counts an attempt against `key`; rejected attempts count too.
    ///
    /// A failing store lets the attempt through.
    pub async fn check_rate_limit(&self, key: &str) -> RateLimitResult {
        let limit = self.config.requests_per_window;
        match self.store.increment(key, self.config.window_duration).await {
            Ok(WindowCount { count, resets_in }) => {
                let allowed = count <= limit;
                if !allowed {
                    counter!("delivery_rate_limit.rejected", 1);
                    debug!(key, count, "rate limit exceeded");
                }
                RateLimitResult {
                    allowed,
                    limit,
                    remaining: limit.saturating_sub(count),
                    reset_time: resets_in,
                }
            }
            Err(err) => {
                warn!("Rate limit store error, allowing request: {}", err);
                RateLimitResult {
                    allowed: true,
                    limit,
                    remaining: limit,
                    reset_time: self.config.window_duration,
                }
            }
        }
    }
}

/// Counter key for public tracking searches from one client address.
pub fn tracking_search_key(client_address: &str) -> String {
    format!("tracking_search:{}", client_address)
}

/// Client address: first `X-Forwarded-For` hop, then `X-Real-IP`, else `unknown`.
pub fn extract_client_address(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            if let Some(ip) = forwarded_str.split(',').next() {
                let ip = ip.trim();
                if !ip.is_empty() {
                    return ip.to_string();
                }
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            let ip = ip_str.trim();
            if !ip.is_empty() {
                return ip.to_string();
            }
        }
    }

    "unknown".to_string()
}
