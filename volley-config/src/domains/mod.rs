//! Domain-specific configuration modules

pub mod load;
pub mod logging;
pub mod report;
pub mod responder;
pub mod target;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main volley configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VolleyConfig {
    /// Target server and transport
    #[serde(default)]
    pub target: target::TargetConfig,

    /// Load shape
    #[serde(default)]
    pub load: load::LoadConfig,

    /// Challenge responder listener
    #[serde(default)]
    pub responder: responder::ResponderConfig,

    /// Logging
    #[serde(default)]
    pub logging: logging::LoggingConfig,

    /// Report output
    #[serde(default)]
    pub report: report::ReportConfig,
}

impl VolleyConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.target.validate()?;
        self.load.validate()?;
        self.responder.validate()?;
        self.logging.validate()?;
        self.report.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = VolleyConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
