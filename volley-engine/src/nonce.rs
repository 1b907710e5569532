//! Anti-replay nonce pool
//!
//! Nonces harvested from any target response are queued here and handed out
//! strictly first-in first-out. A popped nonce leaves the pool before it is
//! returned, so concurrent callers never observe the same one. When the pool
//! is empty a fresh nonce is fetched with a `HEAD` on the directory; the pool
//! lock is not held across that request.

use crate::error::{LoadError, LoadResult};
use crate::latency::LatencyRecorder;
use crate::protocol::{endpoint_label, DIRECTORY_PATH};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;
use volley_http::{HttpMethod, TargetClient, TargetResponse};

#[derive(Debug)]
pub struct NoncePool {
    pool: Mutex<VecDeque<String>>,
    client: TargetClient,
    directory_url: String,
    latency: Arc<LatencyRecorder>,
}

impl NoncePool {
    pub fn new(client: TargetClient, api_base: &str, latency: Arc<LatencyRecorder>) -> Self {
        Self {
            pool: Mutex::new(VecDeque::new()),
            client,
            directory_url: format!("{}{}", api_base.trim_end_matches('/'), DIRECTORY_PATH),
            latency,
        }
    }

    /// Take the oldest pooled nonce, or fetch a fresh one from the target
    pub async fn get(&self) -> LoadResult<String> {
        let pooled = self.pool.lock().pop_front();
        match pooled {
            Some(nonce) => Ok(nonce),
            None => self.fetch_fresh().await,
        }
    }

    /// Append a nonce to the back of the pool
    pub fn add(&self, nonce: impl Into<String>) {
        self.pool.lock().push_back(nonce.into());
    }

    /// Keep the nonce a response carries, if it carries one
    pub fn harvest(&self, response: &TargetResponse) {
        if let Some(nonce) = response.replay_nonce() {
            self.add(nonce);
        }
    }

    pub fn len(&self) -> usize {
        self.pool.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.lock().is_empty()
    }

    async fn fetch_fresh(&self) -> LoadResult<String> {
        debug!("Nonce pool empty, fetching from {}", self.directory_url);

        let started = Instant::now();
        let response = self.client.head(&self.directory_url).await;
        // Timed-out and refused refills still count towards the histogram
        self.latency.record(
            &endpoint_label(HttpMethod::Head, DIRECTORY_PATH),
            started.elapsed(),
        );
        let response = response?;

        // The fresh nonce goes straight to the caller, never through the pool
        response
            .replay_nonce()
            .map(str::to_string)
            .ok_or_else(|| {
                LoadError::Protocol(format!(
                    "Replay-Nonce header not supplied by {} (status {})",
                    self.directory_url, response.status
                ))
            })
    }
}
