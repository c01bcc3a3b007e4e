use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// How long a client may stay idle before its bucket is evicted.
const IDLE_TTL: Duration = Duration::from_secs(3 * 60);
/// How often the reaper sweeps for idle buckets.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_second: f64,
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 2.0,
            burst: 4,
        }
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

impl Bucket {
    fn full(capacity: u32) -> Self {
        let now = Instant::now();
        Self {
            tokens: f64::from(capacity),
            last_refill: now,
            last_seen: now,
        }
    }
}

/// Per-client token-bucket gate. Buckets are created lazily at full burst
/// capacity, refill continuously, and are evicted after [`IDLE_TTL`] of
/// inactivity so the map stays bounded under many distinct clients.
///
/// Check-and-consume serializes on the per-client mutex; the outer map lock
/// is held only to look up, insert, or evict a bucket, so the reaper and the
/// request path never block each other for a whole pass.
pub struct RateLimiter {
    config: RateLimitConfig,
    clients: RwLock<HashMap<IpAddr, Arc<Mutex<Bucket>>>>,
    reaper: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            clients: RwLock::new(HashMap::new()),
            reaper: std::sync::Mutex::new(None),
        }
    }

    #[must_use]
    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Consumes one token for `client`, refilling first based on elapsed
    /// time. Returns false when the bucket is empty. Always true in
    /// disabled mode.
    pub async fn allow(&self, client: IpAddr) -> bool {
        if !self.config.enabled {
            return true;
        }

        let bucket = self.bucket_for(client).await;
        let mut state = bucket.lock().await;
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = f64::from(self.config.burst)
            .min(state.tokens + elapsed * self.config.requests_per_second);
        state.last_refill = now;
        state.last_seen = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    async fn bucket_for(&self, client: IpAddr) -> Arc<Mutex<Bucket>> {
        {
            let clients = self.clients.read().await;
            if let Some(bucket) = clients.get(&client) {
                return Arc::clone(bucket);
            }
        }
        let mut clients = self.clients.write().await;
        Arc::clone(
            clients
                .entry(client)
                .or_insert_with(|| Arc::new(Mutex::new(Bucket::full(self.config.burst)))),
        )
    }

    /// Spawns the background reaper. Idempotent; a second call replaces a
    /// finished handle but never stacks tasks.
    pub fn start_reaper(self: &Arc<Self>) {
        let mut slot = self.reaper.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let limiter = Arc::clone(self);
        *slot = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            interval.tick().await; // first tick fires immediately
            loop {
                interval.tick().await;
                limiter.sweep().await;
            }
        }));
    }

    /// One eviction pass. Idle candidates are found under the read lock;
    /// the write lock is taken only to remove them, re-checking idleness in
    /// case a request slipped in between the two phases.
    pub async fn sweep(&self) {
        let now = Instant::now();
        let mut idle = Vec::new();
        {
            let clients = self.clients.read().await;
            for (client, bucket) in clients.iter() {
                let state = bucket.lock().await;
                if now.duration_since(state.last_seen) >= IDLE_TTL {
                    idle.push(*client);
                }
            }
        }
        if idle.is_empty() {
            return;
        }

        let mut clients = self.clients.write().await;
        for client in idle {
            let still_idle = match clients.get(&client) {
                // A held bucket lock means a request is mid-flight; keep it.
                Some(bucket) => match bucket.try_lock() {
                    Ok(state) => now.duration_since(state.last_seen) >= IDLE_TTL,
                    Err(_) => false,
                },
                None => false,
            };
            if still_idle {
                clients.remove(&client);
            }
        }
    }

    /// Stops the reaper task, if one is running.
    pub fn shutdown(&self) {
        let mut slot = self.reaper.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }

    #[cfg(test)]
    pub(crate) async fn tracked_clients(&self) -> usize {
        self.clients.read().await.len()
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.shutdown();
    }
}
