//! HTTP transport for talking to the target certificate-issuance server
//!
//! A thin wrapper over a pooled `reqwest::Client` that returns fully-read
//! responses, so callers can inspect status, headers (notably
//! `Replay-Nonce` and `Location`) and body without holding a connection.

pub mod client;
pub mod config;
pub mod errors;
pub mod types;

pub use client::{TargetClient, TargetResponse};
pub use config::HttpConfig;
pub use errors::HttpError;
pub use types::HttpMethod;

pub use reqwest::StatusCode;

/// Header carrying a fresh anti-replay nonce on every target response
pub const REPLAY_NONCE_HEADER: &str = "Replay-Nonce";

/// Header carrying the URL of a newly created resource
pub const LOCATION_HEADER: &str = "Location";
