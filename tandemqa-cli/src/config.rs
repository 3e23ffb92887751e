//! Configuration handling for the TandemQA CLI
//!
//! Supports loading configuration from tandemqa.toml files with CLI argument overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tandemqa_core::StagePrograms;

pub const DEFAULT_CONFIG_FILE: &str = "tandemqa.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    /// External programs implementing the analysis stages
    #[serde(default)]
    pub stages: StagePrograms,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default number of threads handed to the mapper and every stage
    #[serde(default = "default_threads")]
    pub threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Long-read to assembly mapper
    #[serde(default = "default_mapper")]
    pub mapper: PathBuf,

    /// Consensus polisher used by --only-polish
    #[serde(default = "default_polisher")]
    pub polisher: PathBuf,
}

fn default_threads() -> usize { num_cpus::get() }
fn default_mapper() -> PathBuf { PathBuf::from("tandemmapper") }
fn default_polisher() -> PathBuf { PathBuf::from("tandemquast-polish") }

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { threads: default_threads() }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            mapper: default_mapper(),
            polisher: default_polisher(),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(path)?
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    log::info!("Loading configuration from: {}", DEFAULT_CONFIG_FILE);
                    Self::load_from_file(&default_path)?
                } else {
                    log::debug!("Using default configuration");
                    Self::default()
                }
            }
        };

        if config.general.threads == 0 {
            anyhow::bail!("general.threads must be at least 1");
        }
        Ok(config)
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}
