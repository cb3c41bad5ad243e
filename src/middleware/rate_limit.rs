//! Per-origin rate admission.
//!
//! Sliding-window log keyed by client IP. Each key owns its own window, so
//! one noisy client exhausts only its own budget. The filter runs before
//! credential verification and any gate; a rejected request never reaches a
//! handler.

use std::collections::VecDeque;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use thiserror::Error;

use crate::config::ApiConfig;
use crate::error::ApiError;

/// Prune idle keys every this many admission checks
const PRUNE_INTERVAL: u64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("rate limit exceeded")]
    RateLimited { retry_after: Duration },

    #[error("client origin unavailable")]
    UnknownOrigin,
}

pub struct AdmissionFilter {
    limit: usize,
    window: Duration,
    windows: DashMap<IpAddr, VecDeque<Instant>>,
    checks: AtomicU64,
}

impl AdmissionFilter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit as usize,
            window,
            windows: DashMap::new(),
            checks: AtomicU64::new(0),
        }
    }

    pub fn from_config(api: &ApiConfig) -> Self {
        Self::new(
            api.rate_limit_requests,
            Duration::from_secs(api.rate_limit_window_secs),
        )
    }

    pub fn admit(&self, key: IpAddr) -> Result<(), AdmissionError> {
        self.admit_at(key, Instant::now())
    }

    /// Admission decision for a request from `key` arriving at `now`
    pub fn admit_at(&self, key: IpAddr, now: Instant) -> Result<(), AdmissionError> {
        let count = self.checks.fetch_add(1, Ordering::Relaxed);
        if count > 0 && count % PRUNE_INTERVAL == 0 {
            // Must run before the entry guard below is taken
            self.prune(now);
        }

        let cutoff = now.checked_sub(self.window);
        let mut window = self.windows.entry(key).or_default();
        if let Some(cutoff) = cutoff {
            while window.front().is_some_and(|&t| t <= cutoff) {
                window.pop_front();
            }
        }

        if window.len() >= self.limit {
            let retry_after = window
                .front()
                .map(|&oldest| self.window.saturating_sub(now.saturating_duration_since(oldest)))
                .unwrap_or(self.window);
            tracing::warn!(
                client = %key,
                requests = window.len(),
                limit = self.limit,
                "rate limit exceeded"
            );
            return Err(AdmissionError::RateLimited { retry_after });
        }

        window.push_back(now);
        Ok(())
    }

    /// Drop keys with no requests inside the window
    pub fn prune(&self, now: Instant) {
        let Some(cutoff) = now.checked_sub(self.window) else {
            return;
        };
        self.windows.retain(|_, window| {
            while window.front().is_some_and(|&t| t <= cutoff) {
                window.pop_front();
            }
            !window.is_empty()
        });
        tracing::debug!(
            tracked_clients = self.tracked_clients(),
            "pruned idle rate windows"
        );
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

/// Middleware: admit by peer address, reject with 429 otherwise.
/// Requests with no known peer address are refused.
pub async fn admit_request(
    State(filter): State<Arc<AdmissionFilter>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let origin = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .ok_or(AdmissionError::UnknownOrigin)?;

    filter.admit(origin)?;
    Ok(next.run(request).await)
}
