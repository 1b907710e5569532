use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use volley_config::domains::logging::LogFormat;
use volley_config::{ConfigLoader, LoggingConfig, VolleyConfig};

mod cli;
use cli::{Cli, Commands, ConfigCommands, RunArgs};

/// Load configuration from file or environment
fn load_config(config_path: Option<&PathBuf>) -> Result<VolleyConfig> {
    let loader = ConfigLoader::new();

    match config_path {
        Some(path) => {
            if path.exists() {
                info!("Loading configuration from: {:?}", path);
                loader
                    .from_file(path)
                    .context(format!("Failed to load configuration from {:?}", path))
            } else {
                warn!("Configuration file not found: {:?}. Using defaults.", path);
                loader
                    .from_env()
                    .context("Failed to load configuration from environment")
            }
        }
        None => {
            debug!("No configuration file specified. Loading from environment or defaults.");
            loader
                .from_env()
                .context("Failed to load configuration from environment")
        }
    }
}

/// Layer command-line flags over the loaded configuration
fn apply_run_overrides(config: &mut VolleyConfig, args: &RunArgs) -> Result<()> {
    if let Some(api_base) = &args.api_base {
        config.target.api_base = api_base.clone();
    }
    if let Some(rate) = args.rate {
        config.load.rate = rate;
    }
    if let Some(max_clients) = args.max_clients {
        config.load.max_clients = max_clients;
    }
    if let Some(secs) = args.duration {
        config.load.run_duration = Duration::from_secs(secs);
    }
    if let Some(workers) = args.workers {
        config.load.workers = Some(workers);
    }
    if let Some(port) = args.challenge_port {
        config.responder.port = port;
    }
    if let Some(domain_base) = &args.domain_base {
        config.load.domain_base = domain_base.clone();
    }
    if let Some(path) = &args.json_out {
        config.report.json_path = Some(path.clone());
    }

    config
        .validate_all()
        .context("Invalid configuration after command-line overrides")
}

/// Initialize tracing on stderr, keeping stdout for the report
fn init_tracing(config: &LoggingConfig, log_level: Option<&String>) -> Result<()> {
    let level = log_level
        .cloned()
        .unwrap_or_else(|| config.level.as_str().to_string());
    let env_filter = EnvFilter::try_new(&level).unwrap_or_else(|_| {
        eprintln!("Invalid log level '{}', falling back to 'info'", level);
        EnvFilter::new("info")
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    // Use try_init to avoid panic if global subscriber already set
    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    if result.is_err() {
        debug!("Global tracing subscriber already initialized, skipping");
    }

    debug!("Tracing initialized");
    Ok(())
}

async fn run_command(config: VolleyConfig) -> Result<()> {
    let stop = CancellationToken::new();
    let interrupt = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, ending run and draining");
            interrupt.cancel();
        }
    });

    let report = volley_engine::run(&config, stop)
        .await
        .context("Load run failed")?;

    print!("{}", report.render_text());

    if let Some(path) = &config.report.json_path {
        report
            .write_json(path)
            .context(format!("Failed to write JSON report to {:?}", path))?;
        info!("JSON report written to {:?}", path);
    }

    Ok(())
}

/// Handle configuration validation
fn handle_config_validate(config_file: &PathBuf) -> Result<()> {
    info!("Validating configuration file: {:?}", config_file);

    if !config_file.exists() {
        return Err(anyhow::anyhow!(
            "Configuration file not found: {:?}",
            config_file
        ));
    }

    match load_config(Some(config_file)) {
        Ok(_config) => {
            println!("✅ Configuration file is valid");
            info!("Configuration validation passed");
            Ok(())
        }
        Err(e) => {
            println!("❌ Configuration validation failed: {:#}", e);
            error!("Configuration validation failed: {:#}", e);
            Err(e)
        }
    }
}

/// Handle configuration generation
fn handle_config_generate(output: &Path, force: bool) -> Result<()> {
    info!("Generating sample configuration at: {:?}", output);

    if output.exists() && !force {
        return Err(anyhow::anyhow!(
            "Output file already exists: {:?}. Use --force to overwrite.",
            output
        ));
    }

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).context("Failed to create output directory")?;
    }

    fs::write(output, VolleyConfig::generate_sample())
        .context(format!("Failed to write configuration to {:?}", output))?;

    println!("✅ Configuration written to {:?}", output);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first
    let config = load_config(cli.config.as_ref())?;
    init_tracing(&config.logging, cli.log_level.as_ref())?;

    match cli.command {
        Some(Commands::Run(args)) => {
            let mut config = config;
            apply_run_overrides(&mut config, &args)?;
            info!("Volley starting");
            run_command(config).await
        }
        Some(Commands::Config { config_cmd }) => match config_cmd {
            ConfigCommands::Validate { config_file } => handle_config_validate(&config_file),
            ConfigCommands::Generate { output, force } => handle_config_generate(&output, force),
        },
        None => {
            // If no subcommand is provided, print help
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            cmd.print_help().context("Failed to print help")?;
            println!();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_overrides_apply() {
        let mut config = VolleyConfig::default();
        let args = RunArgs {
            api_base: Some("http://boulder:4000".to_string()),
            rate: Some(25),
            max_clients: Some(100),
            duration: Some(90),
            workers: Some(8),
            challenge_port: Some(5555),
            domain_base: Some("example.org".to_string()),
            json_out: Some(PathBuf::from("/tmp/volley.json")),
        };
        apply_run_overrides(&mut config, &args).unwrap();

        assert_eq!(config.target.api_base, "http://boulder:4000");
        assert_eq!(config.load.rate, 25);
        assert_eq!(config.load.max_clients, 100);
        assert_eq!(config.load.run_duration, Duration::from_secs(90));
        assert_eq!(config.load.workers, Some(8));
        assert_eq!(config.responder.port, 5555);
        assert_eq!(config.load.domain_base, "example.org");
        assert_eq!(
            config.report.json_path,
            Some(PathBuf::from("/tmp/volley.json"))
        );
    }

    #[test]
    fn test_invalid_override_rejected() {
        let mut config = VolleyConfig::default();
        let args = RunArgs {
            rate: Some(0),
            ..Default::default()
        };
        assert!(apply_run_overrides(&mut config, &args).is_err());
    }

    #[test]
    fn test_generate_then_validate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("configs").join("volley.yaml");

        handle_config_generate(&path, false).unwrap();
        assert!(path.exists());
        handle_config_validate(&path).unwrap();

        // Refuses to clobber without --force
        assert!(handle_config_generate(&path, false).is_err());
        handle_config_generate(&path, true).unwrap();
    }

    #[test]
    fn test_validate_rejects_unsupported_key_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("volley.yaml");
        std::fs::write(&path, "load:\n  key_bits: 2048\n").unwrap();

        assert!(handle_config_validate(&path).is_err());
    }

    #[test]
    fn test_validate_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(handle_config_validate(&dir.path().join("absent.yaml")).is_err());
    }
}
