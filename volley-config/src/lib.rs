//! Domain-driven configuration management for volley
//!
//! Configuration is split by functional domain (target server, load shape,
//! challenge responder, logging, report output). Each domain carries its own
//! defaults and validation, and the loader layers `VOLLEY_*` environment
//! overrides on top of an optional YAML file.

pub mod error;
pub mod loader;
pub mod validation;

pub mod domains;

pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

pub use domains::{
    load::LoadConfig, logging::LoggingConfig, report::ReportConfig,
    responder::ResponderConfig, target::TargetConfig, VolleyConfig,
};

pub use domains::utils::{serde_duration, serde_duration_millis};
