//! # Command Line Interface
//!
//! Generate random strings, create, read and delete secrets against the
//! configured store, and run the expiry cleanup loop.

pub mod output;

use crate::config::AppConfig;
use crate::observability::{init_logging, log_config_info};
use crate::services::{DeleteOptions, GenerateOptions, GetOptions, NewSecret, SecretService};
use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use output::OutputFormat;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "burnit")]
#[command(about = "Burn-after-reading secret storage")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// TOML configuration file; BURNIT__* environment variables override it
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a random string
    Generate {
        /// Number of characters (max 512)
        #[arg(short, long, default_value_t = 16)]
        length: usize,

        /// Include special characters
        #[arg(short, long)]
        special: bool,
    },

    #[command(flatten)]
    Secret(SecretCommands),
}

/// Commands that need the configured store
#[derive(Subcommand, Debug)]
pub enum SecretCommands {
    /// Store a new secret
    Create {
        /// Secret value; read from stdin when omitted
        #[arg(long)]
        value: Option<String>,

        /// Passphrase; one is generated when omitted
        #[arg(short, long)]
        passphrase: Option<String>,

        /// Lifetime in seconds
        #[arg(long)]
        ttl: Option<u64>,

        /// Absolute expiry (RFC 3339); takes precedence over --ttl
        #[arg(long)]
        expires_at: Option<DateTime<Utc>>,
    },

    /// Read a secret, deleting it afterwards
    Get {
        id: String,

        #[arg(short, long)]
        passphrase: String,

        /// Keep the secret after reading it
        #[arg(long)]
        no_delete: bool,

        /// Only check that the secret exists
        #[arg(long)]
        no_decrypt: bool,

        /// The passphrase is the hash printed by `create`
        #[arg(long)]
        hashed: bool,
    },

    /// Delete a secret
    Delete {
        id: String,

        /// Passphrase to verify before deleting
        #[arg(short, long)]
        passphrase: Option<String>,

        /// The passphrase is the hash printed by `create`
        #[arg(long)]
        hashed: bool,
    },

    /// Run expired-secret cleanup until interrupted
    Run,
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if cli.verbose {
        config.observability.log_level = "debug".to_string();
    }
    init_logging(&config.observability)?;

    let command = match cli.command {
        Commands::Generate { length, special } => {
            println!("{}", crate::services::generate(GenerateOptions::new(length, special)));
            return Ok(());
        }
        Commands::Secret(command) => command,
    };

    log_config_info(&config);
    let service = SecretService::from_config(&config).await?;
    let result = handle_command(command, &service, cli.output).await;

    service.close().await?;
    result
}

async fn handle_command(
    command: SecretCommands,
    service: &SecretService,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match command {
        SecretCommands::Create { value, passphrase, ttl, expires_at } => {
            let value = match value {
                Some(value) => value,
                None => read_stdin()?,
            };
            let secret = NewSecret {
                value,
                passphrase,
                ttl: ttl.map(Duration::from_secs),
                expires_at,
            };
            let created = service.create(secret).await?;
            output::print_created(&created, format)?;
        }

        SecretCommands::Get { id, passphrase, no_delete, no_decrypt, hashed } => {
            let options = GetOptions { no_delete, no_decrypt, passphrase_hashed: hashed };
            let secret = service.get(&id, &passphrase, options).await?;
            output::print_secret(&secret, format)?;
        }

        SecretCommands::Delete { id, passphrase, hashed } => {
            let options = DeleteOptions {
                verify_passphrase: passphrase.is_some(),
                passphrase,
                passphrase_hashed: hashed,
            };
            service.delete(&id, options).await?;
            println!("Deleted secret {}", id);
        }

        SecretCommands::Run => run_cleanup(service).await?,
    }

    Ok(())
}

async fn run_cleanup(service: &SecretService) -> anyhow::Result<()> {
    let mut errors = service.cleanup()?;
    info!(
        interval_seconds = service.config().cleanup_interval_seconds,
        "Cleanup running, press Ctrl+C to stop"
    );

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl+C")?;
                info!("Initiating graceful shutdown...");
                break;
            }
            Some(error) = errors.recv() => {
                warn!(error = %error, retryable = error.is_retryable(), "Cleanup sweep failed");
            }
        }
    }

    Ok(())
}

fn read_stdin() -> anyhow::Result<String> {
    let mut value = String::new();
    std::io::stdin().read_to_string(&mut value).context("Failed to read secret from stdin")?;
    Ok(value.trim_end_matches(['\r', '\n']).to_string())
}
