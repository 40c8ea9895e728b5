use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Mutex;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tokio::time::Instant;

use crate::config::LimiterConfig;
use crate::errors::ApiError;
use crate::state::AppState;

const IDLE_EVICTION: Duration = Duration::from_secs(3 * 60);

struct Client {
    tokens: f64,
    last_seen: Instant,
}

/// Per-client token bucket limiter keyed on source IP. Buckets refill at
/// `rps` tokens per second up to `burst`; a request with no token available
/// is rejected with 429.
pub struct RateLimiter {
    rps: f64,
    burst: f64,
    enabled: bool,
    clients: Mutex<HashMap<IpAddr, Client>>,
}

impl RateLimiter {
    pub fn new(cfg: &LimiterConfig) -> Self {
        Self {
            rps: cfg.rps,
            burst: f64::from(cfg.burst),
            enabled: cfg.enabled,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Takes one token from the client's bucket, creating a full bucket for
    /// first-time clients.
    pub fn allow(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        let client = clients.entry(ip).or_insert(Client {
            tokens: self.burst,
            last_seen: now,
        });

        let elapsed = now.duration_since(client.last_seen).as_secs_f64();
        client.tokens = self.burst.min(client.tokens + elapsed * self.rps);
        client.last_seen = now;

        if client.tokens < 1.0 {
            return false;
        }
        client.tokens -= 1.0;
        true
    }

    /// Drops buckets that have been idle long enough to be full again.
    pub fn sweep(&self) {
        let now = Instant::now();
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        clients.retain(|_, client| now.duration_since(client.last_seen) < IDLE_EVICTION);
    }

    /// Periodic sweep loop, spawned once at startup.
    pub async fn run_sweeper(&self) {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            self.sweep();
        }
    }

    #[cfg(test)]
    fn client_count(&self) -> usize {
        self.clients.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if state.limiter.enabled() {
        // ConnectInfo is absent when the router is driven without a real
        // socket, e.g. in tests; such requests are not limited.
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip());
        if let Some(ip) = peer {
            if !state.limiter.allow(ip) {
                return Err(ApiError::RateLimitExceeded);
            }
        }
    }
    Ok(next.run(request).await)
}
