//! CLI argument parsing definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Drive a target server and print a latency report
    Run(RunArgs),

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

/// Per-run overrides layered over the loaded configuration
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Base URL of the target server
    #[arg(long, value_name = "URL")]
    pub api_base: Option<String>,

    /// Dispatch cycles per second
    #[arg(long, value_name = "N")]
    pub rate: Option<u64>,

    /// Maximum number of simulated clients (0 = unbounded)
    #[arg(long, value_name = "N")]
    pub max_clients: Option<usize>,

    /// Run duration in seconds
    #[arg(long, value_name = "SECS")]
    pub duration: Option<u64>,

    /// Fixed worker pool size
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Port the challenge responder listens on
    #[arg(long, value_name = "PORT")]
    pub challenge_port: Option<u16>,

    /// Domain suffix for generated identifiers
    #[arg(long, value_name = "DOMAIN")]
    pub domain_base: Option<String>,

    /// Also write the report as JSON to this path
    #[arg(long, value_name = "PATH")]
    pub json_out: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(long, value_name = "PATH")]
        config_file: PathBuf,
    },

    /// Write a sample configuration file
    Generate {
        /// Output path
        #[arg(long, value_name = "PATH")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
