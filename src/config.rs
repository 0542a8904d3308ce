use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::SystemKind;

const CANDIDATES: [&str; 4] = ["citree.toml", "citree.json", "citree.yaml", "citree.yml"];

/// Configuration file structure for citree.
///
/// Describes the environments to query, the systems inside each environment
/// and the sources every system is read from.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub environments: Vec<EnvironmentConfig>,

    /// Output format preferences
    #[serde(default)]
    pub output: OutputConfig,

    /// Where Git sources are cloned
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Features probed by the `features` command
    #[serde(default)]
    pub features: Vec<FeatureConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EnvironmentConfig {
    pub name: String,
    #[serde(default)]
    pub systems: Vec<SystemConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SystemConfig {
    pub name: String,
    #[serde(default)]
    pub kind: SystemKind,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

/// A place a system's data is read from, selected by `driver`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "driver", rename_all = "lowercase")]
pub enum SourceConfig {
    /// REST API of a CI orchestrator
    Rest {
        name: String,
        url: String,
        #[serde(default)]
        token: Option<String>,
    },
    /// Repositories holding job definitions
    Git {
        name: String,
        #[serde(default = "default_tenant")]
        tenant: String,
        repos: Vec<RepoSpec>,
    },
    /// Source provided by a registered plugin
    Plugin {
        plugin: String,
        name: String,
        #[serde(default)]
        settings: serde_json::Value,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct RepoSpec {
    pub remote: String,
    #[serde(default)]
    pub subdirectory: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Default output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,

    /// Colorize text output
    #[serde(default = "default_color")]
    pub color: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct WorkspaceConfig {
    /// Directory holding repository clones
    pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FeatureConfig {
    pub name: String,
    /// A feature is present when any job name contains this text
    pub job_pattern: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            pretty: false,
            color: default_color(),
        }
    }
}

fn default_color() -> bool {
    true
}

fn default_tenant() -> String {
    "default".to_string()
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./citree.{toml,json,yaml,yml}
    /// 3. the same names in the user configuration directory (`~/.config/citree/` on Linux)
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        if let Some(config) = Self::load_from_dir(Path::new("."))? {
            return Ok(config);
        }

        if let Some(dir) = dirs::config_dir() {
            if let Some(config) = Self::load_from_dir(&dir.join("citree"))? {
                return Ok(config);
            }
        }

        log::debug!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        for candidate in &CANDIDATES {
            let path = dir.join(candidate);
            if path.exists() {
                return Self::load_from_path(&path).map(Some);
            }
        }
        Ok(None)
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        let config: Self = match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?,
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?,
            _ => {
                // Try TOML first, then JSON, then YAML
                toml::from_str(&contents)
                    .or_else(|_| serde_json::from_str(&contents))
                    .or_else(|_| serde_yaml::from_str(&contents))
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))?
            }
        };

        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Environments whose name is in `names`, or all of them when `names` is empty.
    pub fn select_environments(&self, names: &[String]) -> Vec<&EnvironmentConfig> {
        self.environments
            .iter()
            .filter(|env| names.is_empty() || names.contains(&env.name))
            .collect()
    }
}
