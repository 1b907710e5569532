//! http-01 challenge responder
//!
//! Serves key authorizations for registered tokens so the target can
//! validate domains, and carries the operator rate route on the same
//! listener.

use crate::error::{LoadError, LoadResult};
use crate::rate::RateHandle;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::num::NonZeroU64;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const CHALLENGE_ROUTE: &str = "/.well-known/acme-challenge/{token}";
pub const RATE_ROUTE: &str = "/_volley/rate";

/// Shared token -> key authorization map
#[derive(Debug, Clone, Default)]
pub struct ChallengeTokens(Arc<RwLock<HashMap<String, String>>>);

impl ChallengeTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, token: impl Into<String>, key_authorization: impl Into<String>) {
        self.0.write().insert(token.into(), key_authorization.into());
    }

    /// Register a token for as long as the returned guard lives
    pub fn register_scoped(&self, token: &str, key_authorization: impl Into<String>) -> TokenGuard {
        self.register(token, key_authorization);
        TokenGuard {
            tokens: self.clone(),
            token: token.to_string(),
        }
    }

    pub fn remove(&self, token: &str) -> Option<String> {
        self.0.write().remove(token)
    }

    pub fn lookup(&self, token: &str) -> Option<String> {
        self.0.read().get(token).cloned()
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }
}

/// Removes its token from the map when dropped
#[derive(Debug)]
pub struct TokenGuard {
    tokens: ChallengeTokens,
    token: String,
}

impl Drop for TokenGuard {
    fn drop(&mut self) {
        self.tokens.remove(&self.token);
    }
}

#[derive(Clone)]
struct ResponderState {
    tokens: ChallengeTokens,
    rate: RateHandle,
}

pub fn router(tokens: ChallengeTokens, rate: RateHandle) -> Router {
    Router::new()
        .route(CHALLENGE_ROUTE, get(serve_challenge))
        .route(RATE_ROUTE, get(current_rate).put(update_rate))
        .with_state(ResponderState { tokens, rate })
}

async fn serve_challenge(
    State(state): State<ResponderState>,
    Path(token): Path<String>,
) -> impl IntoResponse {
    match state.tokens.lookup(&token) {
        Some(key_authorization) => {
            debug!(token = %token, "Answering challenge");
            (StatusCode::OK, key_authorization)
        }
        None => {
            debug!(token = %token, "Unknown challenge token");
            (StatusCode::NOT_FOUND, String::new())
        }
    }
}

async fn current_rate(State(state): State<ResponderState>) -> String {
    state.rate.get().to_string()
}

async fn update_rate(State(state): State<ResponderState>, body: String) -> impl IntoResponse {
    match body.trim().parse::<u64>().ok().and_then(NonZeroU64::new) {
        Some(rate) => {
            state.rate.set(rate);
            info!(rate = rate.get(), "Dispatch rate updated");
            (StatusCode::OK, rate.to_string())
        }
        None => {
            warn!(body = %body.trim(), "Rejected rate update");
            (
                StatusCode::BAD_REQUEST,
                "rate must be a positive integer".to_string(),
            )
        }
    }
}

/// A bound challenge listener, ready to serve
pub struct ChallengeResponder {
    listener: TcpListener,
    app: Router,
}

impl ChallengeResponder {
    /// Bind the listener; failing to bind is fatal for the run
    pub async fn bind(address: &str, tokens: ChallengeTokens, rate: RateHandle) -> LoadResult<Self> {
        let listener = TcpListener::bind(address).await.map_err(|e| {
            LoadError::Configuration(format!("cannot bind challenge responder to {address}: {e}"))
        })?;
        Ok(Self {
            listener,
            app: router(tokens, rate),
        })
    }

    pub fn local_addr(&self) -> LoadResult<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| LoadError::Configuration(format!("challenge responder address: {e}")))
    }

    /// Serve until `shutdown` is cancelled
    pub async fn serve(self, shutdown: CancellationToken) -> LoadResult<()> {
        if let Ok(address) = self.listener.local_addr() {
            info!(%address, "Challenge responder listening");
        }
        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| LoadError::Configuration(format!("challenge responder failed: {e}")))
    }
}
