//! Engine error types
//!
//! `Configuration` is fatal and only produced before the scheduler starts.
//! The other kinds are local to a single dispatch cycle.

use volley_http::HttpError;

pub type LoadResult<T> = Result<T, LoadError>;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Transport-level failure reaching the target
    #[error("Network error: {0}")]
    Network(HttpError),

    /// Well-formed exchange that lacks something the protocol requires
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Failure producing a signed envelope
    #[error("Signing error: {0}")]
    Signing(String),

    /// Startup-time misconfiguration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The cycle was cancelled by shutdown before it finished
    #[error("Cancelled during shutdown")]
    Cancelled,
}

impl From<HttpError> for LoadError {
    fn from(err: HttpError) -> Self {
        match err {
            // A body we cannot decode is the server's protocol problem, not the network's
            HttpError::InvalidJson(e) => LoadError::Protocol(format!("malformed response body: {e}")),
            other => LoadError::Network(other),
        }
    }
}

impl LoadError {
    /// Short kind name, used as a structured logging field
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::Network(_) => "network",
            LoadError::Protocol(_) => "protocol",
            LoadError::Signing(_) => "signing",
            LoadError::Configuration(_) => "configuration",
            LoadError::Cancelled => "cancelled",
        }
    }
}
