use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::providers::gitlab::MAX_PAGE_SIZE;

/// Configuration file structure for pkgsweep.
///
/// Lets operators keep the GitLab endpoint, pipeline width and retention
/// policy in one place instead of repeating flags on every run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// GitLab connection settings
    #[serde(default)]
    pub gitlab: GitLabConfig,

    /// Stage engine settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Retention policy
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Search defaults
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitLabConfig {
    /// GitLab personal access token
    pub token: Option<String>,

    /// GitLab instance base URL
    #[serde(default = "default_gitlab_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PipelineConfig {
    /// Concurrent workers per stage. Every worker may hold one API call in
    /// flight, so this scales remote concurrency linearly.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Items requested per listing page (GitLab caps this at 100)
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetentionConfig {
    /// Newest package files kept per package
    #[serde(default = "default_keep")]
    pub keep: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SearchConfig {
    /// Minimum GitLab access level a project must grant (40 = Maintainer)
    #[serde(default = "default_min_access_level")]
    pub min_access_level: u8,
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: default_gitlab_base_url(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            page_size: default_page_size(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            keep: default_keep(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_access_level: default_min_access_level(),
        }
    }
}

fn default_gitlab_base_url() -> String {
    "https://gitlab.com".to_string()
}

fn default_workers() -> usize {
    10
}

fn default_page_size() -> usize {
    MAX_PAGE_SIZE
}

fn default_keep() -> usize {
    20
}

fn default_min_access_level() -> u8 {
    40
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path (must exist)
    /// 2. ./pkgsweep.toml, ./pkgsweep.json, ./pkgsweep.yaml, ./pkgsweep.yml
    /// 3. `<config dir>/pkgsweep/config.toml`
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => match Self::discover() {
                Some(found) => Self::load_from_path(&found)?,
                None => Self::default(),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn discover() -> Option<PathBuf> {
        let candidates = [
            "pkgsweep.toml",
            "pkgsweep.json",
            "pkgsweep.yaml",
            "pkgsweep.yml",
        ];

        candidates
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
            .or_else(|| {
                dirs::config_dir()
                    .map(|dir| dir.join("pkgsweep").join("config.toml"))
                    .filter(|path| path.exists())
            })
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.workers == 0 {
            bail!("pipeline.workers must be at least 1");
        }
        if self.pipeline.page_size == 0 || self.pipeline.page_size > MAX_PAGE_SIZE {
            bail!("pipeline.page-size must be between 1 and {MAX_PAGE_SIZE}");
        }
        Ok(())
    }
}
