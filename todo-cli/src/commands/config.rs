use std::fs;

use anyhow::{Context, Result};
use clap::ValueEnum;
use shared::config::ClientConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    const fn file_name(self) -> &'static str {
        match self {
            Self::Yaml => "config.yaml",
            Self::Json => "config.json",
        }
    }
}

/// Writes the default client configuration to `config.yaml` or
/// `config.json` in the working directory.
pub fn generate_config(format: ConfigFormat) -> Result<()> {
    let config = ClientConfig::with_defaults();
    let serialized = match format {
        ConfigFormat::Yaml => serde_yml::to_string(&config)?,
        ConfigFormat::Json => serde_json::to_string_pretty(&config)?,
    };

    let file_name = format.file_name();
    fs::write(file_name, serialized)
        .with_context(|| format!("failed to write configuration file '{file_name}'"))?;

    println!("Configuration file '{file_name}' generated successfully.");
    Ok(())
}
