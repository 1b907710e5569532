//! Latency report output configuration

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Where to write the structured (JSON) latency dump, if anywhere
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_path: Option<PathBuf>,
}

impl Validatable for ReportConfig {
    fn validate(&self) -> ConfigResult<()> {
        if let Some(ref path) = self.json_path {
            if path.as_os_str().is_empty() {
                return Err(self.validation_error("json_path cannot be empty"));
            }
            if path.is_dir() {
                return Err(self.validation_error(format!(
                    "json_path {} is a directory",
                    path.display()
                )));
            }
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "report"
    }
}
