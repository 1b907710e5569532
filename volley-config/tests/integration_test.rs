//! Integration tests for volley-config

use std::io::Write;
use std::time::Duration;
use temp_env::with_vars;
use volley_config::domains::logging::{LogFormat, LogLevel};
use volley_config::*;

#[test]
fn test_default_config_validation() {
    let config = VolleyConfig::default();
    assert!(config.validate_all().is_ok());
}

#[test]
fn test_config_loader_from_env() {
    let vars = vec![
        ("VOLLEY_API_BASE", Some("http://boulder:4000")),
        ("VOLLEY_RATE", Some("250")),
        ("VOLLEY_MAX_CLIENTS", Some("40")),
        ("VOLLEY_RUN_DURATION", Some("300")),
        ("VOLLEY_CHALLENGE_PORT", Some("5010")),
        ("VOLLEY_LOG_LEVEL", Some("debug")),
        ("VOLLEY_LOG_FORMAT", Some("json")),
        ("VOLLEY_REPORT_JSON", Some("/tmp/volley.json")),
    ];

    with_vars(vars, || {
        let config = ConfigLoader::new().from_env().unwrap();

        assert_eq!(config.target.api_base, "http://boulder:4000");
        assert_eq!(config.load.rate, 250);
        assert_eq!(config.load.max_clients, 40);
        assert_eq!(config.load.run_duration, Duration::from_secs(300));
        assert_eq!(config.responder.port, 5010);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(
            config.report.json_path.as_deref(),
            Some(std::path::Path::new("/tmp/volley.json"))
        );
    });
}

#[test]
fn test_invalid_env_value_is_rejected() {
    with_vars(vec![("VOLLEY_RATE", Some("fast"))], || {
        let result = ConfigLoader::new().from_env();
        assert!(matches!(result, Err(ConfigError::EnvError(_))));
    });
}

#[test]
fn test_env_value_failing_validation_is_rejected() {
    with_vars(vec![("VOLLEY_RATE", Some("0"))], || {
        let result = ConfigLoader::new().from_env();
        assert!(matches!(result, Err(ConfigError::DomainError { .. })));
    });
}

#[test]
fn test_yaml_config_round_trip() {
    let yaml = VolleyConfig::generate_sample();
    let parsed: VolleyConfig = serde_yaml::from_str(&yaml).unwrap();
    assert!(parsed.validate_all().is_ok());
    assert_eq!(parsed.load.rate, 10);
}

#[test]
fn test_load_from_file() {
    let yaml = r#"
target:
  api_base: "http://127.0.0.1:4000"
  timeout: 5

load:
  rate: 50
  max_clients: 10
  run_duration: 120
  workers: 16
  domain_base: "load.test"
  poll_interval: 250

responder:
  port: 5002
"#;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    with_vars(vec![("VOLLEY_RATE", None::<&str>)], || {
        let config = ConfigLoader::new().from_file(file.path()).unwrap();

        assert_eq!(config.target.timeout, Duration::from_secs(5));
        assert_eq!(config.load.rate, 50);
        assert_eq!(config.load.workers, Some(16));
        assert_eq!(config.load.domain_base, "load.test");
        assert_eq!(config.load.poll_interval, Duration::from_millis(250));
        // Untouched domains keep their defaults
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.load.drain_timeout, Duration::from_secs(10));
    });
}

#[test]
fn test_load_from_missing_file() {
    let result = ConfigLoader::new().from_file("/definitely/not/here.yaml");
    assert!(matches!(result, Err(ConfigError::FileReadError(_))));
}

#[test]
fn test_custom_prefix() {
    with_vars(vec![("LOADGEN_RATE", Some("7"))], || {
        let config = ConfigLoader::with_prefix("LOADGEN").from_env().unwrap();
        assert_eq!(config.load.rate, 7);
    });
}
