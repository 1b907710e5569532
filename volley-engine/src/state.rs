//! Shared engine state
//!
//! One `EngineState` is built at startup and shared by every dispatch
//! cycle. Each collection in it carries its own lock; nothing here is
//! locked as a whole.

use crate::error::{LoadError, LoadResult};
use crate::latency::LatencyRecorder;
use crate::nonce::NoncePool;
use crate::rate::RateHandle;
use crate::registry::ClientRegistry;
use crate::responder::ChallengeTokens;
use crate::signing::KeyMaterial;
use std::num::NonZeroU64;
use std::sync::Arc;
use volley_config::{LoadConfig, VolleyConfig};
use volley_http::{HttpConfig, TargetClient};

#[derive(Debug)]
pub struct EngineState {
    pub load: LoadConfig,
    pub api_base: String,
    pub client: TargetClient,
    pub nonces: NoncePool,
    pub registry: ClientRegistry,
    pub challenges: ChallengeTokens,
    pub rate: RateHandle,
    pub latency: Arc<LatencyRecorder>,
    /// Key every CSR is built with
    pub certificate_key: KeyMaterial,
}

impl EngineState {
    pub fn new(config: &VolleyConfig) -> LoadResult<Self> {
        let rate = NonZeroU64::new(config.load.rate)
            .ok_or_else(|| LoadError::Configuration("rate must be positive".to_string()))?;
        let client = TargetClient::with_config(&HttpConfig::from(config.target.clone()))
            .map_err(|e| LoadError::Configuration(format!("cannot build HTTP client: {e}")))?;
        let certificate_key = KeyMaterial::generate(config.load.key_bits)?;

        let api_base = config.target.api_base_trimmed().to_string();
        let latency = Arc::new(LatencyRecorder::new());

        Ok(Self {
            load: config.load.clone(),
            nonces: NoncePool::new(client.clone(), &api_base, latency.clone()),
            api_base,
            client,
            registry: ClientRegistry::new(config.load.max_clients),
            challenges: ChallengeTokens::new(),
            rate: RateHandle::new(rate),
            latency,
            certificate_key,
        })
    }

    /// Absolute URL of a target path
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }
}
