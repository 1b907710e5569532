//! Load shape configuration: rate, population, duration and key material

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Key size of the only supported account/certificate key algorithm (Ed25519)
pub const SUPPORTED_KEY_BITS: u32 = 256;

/// Load generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Target dispatch cycles per second
    #[serde(default = "default_rate")]
    pub rate: u64,

    /// Maximum simulated client population; 0 means unbounded
    #[serde(default)]
    pub max_clients: usize,

    /// Total time the scheduler keeps launching cycles
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_run_duration"
    )]
    pub run_duration: Duration,

    /// How long in-flight cycles get to finish before they are cancelled
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_drain_timeout"
    )]
    pub drain_timeout: Duration,

    /// Fixed worker pool size; unset launches one task per cycle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Domain suffix used to mint per-client test identifiers
    #[serde(default = "default_domain_base")]
    pub domain_base: String,

    /// Signing key size in bits
    #[serde(default = "default_key_bits")]
    pub key_bits: u32,

    /// Maximum number of authorization status polls after answering a challenge
    #[serde(default = "default_authorization_polls")]
    pub authorization_polls: u32,

    /// Delay between authorization status polls
    #[serde(
        with = "crate::domains::utils::serde_duration_millis",
        default = "default_poll_interval"
    )]
    pub poll_interval: Duration,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            rate: default_rate(),
            max_clients: 0,
            run_duration: default_run_duration(),
            drain_timeout: default_drain_timeout(),
            workers: None,
            domain_base: default_domain_base(),
            key_bits: default_key_bits(),
            authorization_polls: default_authorization_polls(),
            poll_interval: default_poll_interval(),
        }
    }
}

impl Validatable for LoadConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.rate, "rate", self.domain_name())?;
        validate_positive(
            self.run_duration.as_secs(),
            "run_duration",
            self.domain_name(),
        )?;
        validate_required_string(&self.domain_base, "domain_base", self.domain_name())?;

        if self.domain_base.starts_with('.') || self.domain_base.ends_with('.') {
            return Err(self.validation_error(format!(
                "domain_base '{}' must not start or end with a dot",
                self.domain_base
            )));
        }

        if self.key_bits != SUPPORTED_KEY_BITS {
            return Err(self.validation_error(format!(
                "key_bits {} is not supported; only {} (Ed25519) is",
                self.key_bits, SUPPORTED_KEY_BITS
            )));
        }

        if let Some(workers) = self.workers {
            validate_positive(workers, "workers", self.domain_name())?;
        }

        validate_positive(
            self.authorization_polls,
            "authorization_polls",
            self.domain_name(),
        )?;

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "load"
    }
}

fn default_rate() -> u64 {
    10
}

fn default_run_duration() -> Duration {
    Duration::from_secs(60)
}

fn default_drain_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_domain_base() -> String {
    "com".to_string()
}

fn default_key_bits() -> u32 {
    SUPPORTED_KEY_BITS
}

fn default_authorization_polls() -> u32 {
    10
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(500)
}
