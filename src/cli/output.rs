//! Output formatting for CLI commands

use crate::services::{CreatedSecret, Secret};
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// What `create` prints
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedOutput {
    pub id: String,
    pub passphrase: String,
    pub passphrase_hash: String,
    pub ttl_seconds: u64,
    pub expires_at: String,
}

impl From<&CreatedSecret> for CreatedOutput {
    fn from(created: &CreatedSecret) -> Self {
        Self {
            id: created.id.clone(),
            passphrase: created.passphrase.clone(),
            passphrase_hash: created.passphrase_hash.clone(),
            ttl_seconds: created.ttl.as_secs(),
            expires_at: format_time(created.expires_at),
        }
    }
}

/// What `get` prints
#[derive(Debug, Serialize)]
pub struct SecretOutput {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl From<&Secret> for SecretOutput {
    fn from(secret: &Secret) -> Self {
        Self { id: secret.id.clone(), value: secret.value.clone() }
    }
}

fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Print data as JSON
pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data).context("Failed to serialize to JSON")?;
    println!("{}", json);
    Ok(())
}

pub fn print_created(created: &CreatedSecret, format: OutputFormat) -> Result<()> {
    let output = CreatedOutput::from(created);
    match format {
        OutputFormat::Json => print_json(&output),
        OutputFormat::Text => {
            println!("ID:          {}", output.id);
            println!("Passphrase:  {}", output.passphrase);
            println!("Hash:        {}", output.passphrase_hash);
            println!("Expires at:  {} (in {}s)", output.expires_at, output.ttl_seconds);
            Ok(())
        }
    }
}

pub fn print_secret(secret: &Secret, format: OutputFormat) -> Result<()> {
    let output = SecretOutput::from(secret);
    match format {
        OutputFormat::Json => print_json(&output),
        OutputFormat::Text => {
            match output.value {
                Some(value) => println!("{}", value),
                None => println!("Secret {} exists", output.id),
            }
            Ok(())
        }
    }
}
