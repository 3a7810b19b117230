use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::warn;

use crate::clock::SharedClock;
use crate::error::ApiError;

/// Entries are pruned once the table grows past this many clients. The
/// table never holds more than this many live windows.
const PRUNE_THRESHOLD: usize = 10_000;

struct Window {
    started: DateTime<Utc>,
    hits: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub remaining: u32,
    /// Seconds until the client's window resets.
    pub reset_secs: i64,
}

/// Fixed-window request counter keyed by client IP.
///
/// The key is the socket peer unless [`RateLimiter::trust_proxy`] is set,
/// in which case a reverse proxy's forwarding headers win.
pub struct RateLimiter {
    window: chrono::Duration,
    max: u32,
    trust_proxy: bool,
    clock: SharedClock,
    clients: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max: u32, clock: SharedClock) -> Self {
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::minutes(15));
        Self {
            window,
            max,
            trust_proxy: false,
            clock,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Honor `X-Forwarded-For` / `X-Real-IP`. Only safe behind a proxy that
    /// overwrites them.
    pub fn trust_proxy(mut self, trust: bool) -> Self {
        self.trust_proxy = trust;
        self
    }

    pub fn limit(&self) -> u32 {
        self.max
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn check(&self, client: &str) -> Decision {
        let now = self.clock.now();
        let mut clients = self.clients.lock();

        if clients.len() >= PRUNE_THRESHOLD && !clients.contains_key(client) {
            let window = self.window;
            clients.retain(|_, w| now - w.started < window);
            if clients.len() >= PRUNE_THRESHOLD {
                let oldest = clients
                    .iter()
                    .min_by_key(|(_, w)| w.started)
                    .map(|(key, _)| key.clone());
                if let Some(oldest) = oldest {
                    clients.remove(&oldest);
                }
            }
        }

        let entry = clients.entry(client.to_owned()).or_insert(Window {
            started: now,
            hits: 0,
        });
        if now - entry.started >= self.window {
            entry.started = now;
            entry.hits = 0;
        }
        entry.hits = entry.hits.saturating_add(1);

        let reset_secs = (entry.started + self.window - now).num_seconds().max(0);
        Decision {
            allowed: entry.hits <= self.max,
            remaining: self.max.saturating_sub(entry.hits),
            reset_secs,
        }
    }
}

/// The peer address, or with `trust_proxy` the first hop of X-Forwarded-For,
/// then X-Real-IP, then the peer address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(forwarded) = forwarded_ip(headers) {
            return forwarded;
        }
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".into())
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = xff.split(',').next() {
            let trimmed = first.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_owned());
            }
        }
    }
    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn set_headers(headers: &mut HeaderMap, limit: u32, decision: Decision) {
    headers.insert("ratelimit-limit", HeaderValue::from(limit));
    headers.insert("ratelimit-remaining", HeaderValue::from(decision.remaining));
    headers.insert("ratelimit-reset", HeaderValue::from(decision.reset_secs));
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(request.headers(), peer, limiter.trust_proxy);
    let decision = limiter.check(&ip);

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        warn!(%ip, "rate limit exceeded");
        let mut response = ApiError::TooManyRequests(
            "Too many requests from this IP, please try again later.".into(),
        )
        .into_response();
        response
            .headers_mut()
            .insert("retry-after", HeaderValue::from(decision.reset_secs));
        response
    };
    set_headers(response.headers_mut(), limiter.limit(), decision);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn limiter(max: u32) -> (RateLimiter, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        let limiter = RateLimiter::new(Duration::from_secs(60), max, Arc::new(clock.clone()));
        (limiter, clock)
    }

    #[test]
    fn blocks_after_max_until_window_resets() {
        let (limiter, clock) = limiter(2);
        assert!(limiter.check("1.1.1.1").allowed);
        let second = limiter.check("1.1.1.1");
        assert!(second.allowed);
        assert_eq!(second.remaining, 0);
        assert!(!limiter.check("1.1.1.1").allowed);
        assert!(limiter.check("2.2.2.2").allowed);

        clock.advance(chrono::Duration::seconds(60));
        assert!(limiter.check("1.1.1.1").allowed);
    }

    #[test]
    fn reset_counts_down_with_the_clock() {
        let (limiter, clock) = limiter(5);
        assert_eq!(limiter.check("ip").reset_secs, 60);
        clock.advance(chrono::Duration::seconds(45));
        assert_eq!(limiter.check("ip").reset_secs, 15);
    }

    #[test]
    fn client_ip_ignores_forwarded_headers_by_default() {
        let peer: SocketAddr = "10.0.0.9:5000".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("5.5.5.5"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("7.7.7.7"));
        assert_eq!(client_ip(&headers, Some(peer), false), "10.0.0.9");
        assert_eq!(client_ip(&headers, None, false), "unknown");
    }

    #[test]
    fn trusted_proxy_headers_take_precedence() {
        let peer: SocketAddr = "10.0.0.9:5000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(peer), true), "10.0.0.9");

        headers.insert("x-real-ip", HeaderValue::from_static("5.5.5.5"));
        assert_eq!(client_ip(&headers, Some(peer), true), "5.5.5.5");

        headers.insert("x-forwarded-for", HeaderValue::from_static(" 7.7.7.7, 8.8.8.8"));
        assert_eq!(client_ip(&headers, Some(peer), true), "7.7.7.7");
    }

    #[test]
    fn client_table_is_bounded_within_one_window() {
        let (limiter, _) = limiter(5);
        for i in 0..PRUNE_THRESHOLD + 50 {
            limiter.check(&format!("client-{i}"));
        }
        assert_eq!(limiter.tracked_clients(), PRUNE_THRESHOLD);
    }
}
