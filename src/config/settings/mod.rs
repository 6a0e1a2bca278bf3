
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::retrieval::RetrievalOptions;
use crate::routing::RoutingOptions;

pub const MAX_TOP_K: usize = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub retrieval: RetrievalOptions,
    #[serde(default)]
    pub routing: RoutingOptions,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid top_k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
    #[error("Invalid min_similarity: {0} (must be a finite value between -1 and 1)")]
    InvalidMinSimilarity(f32),
    #[error("Invalid section_pages: {0} (must be at least 1)")]
    InvalidSectionPages(u32),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".localdocs-retrieval"))
            .or({
                #[cfg(windows)]
                {
                    dirs::data_dir().map(|data| data.join("localdocs-retrieval"))
                }
                #[cfg(not(windows))]
                {
                    None
                }
            })
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load from the default configuration directory
    #[inline]
    pub fn load() -> Result<Self> {
        let config_dir = Self::config_dir().context("Failed to determine config directory")?;
        Self::load_from(config_dir)
    }

    /// Load `config.toml` from `config_dir`, falling back to defaults when
    /// the file does not exist
    #[inline]
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_top_k(self.retrieval.top_k)?;
        validate_min_similarity(self.retrieval.min_similarity)?;
        validate_section_pages(self.routing.section_pages)?;
        Ok(())
    }

    #[inline]
    pub fn set_top_k(&mut self, top_k: usize) -> Result<(), ConfigError> {
        validate_top_k(top_k)?;
        self.retrieval.top_k = top_k;
        Ok(())
    }

    #[inline]
    pub fn set_min_similarity(&mut self, min_similarity: f32) -> Result<(), ConfigError> {
        validate_min_similarity(min_similarity)?;
        self.retrieval.min_similarity = min_similarity;
        Ok(())
    }

    #[inline]
    pub fn set_deduplicate_pages(&mut self, deduplicate_pages: bool) {
        self.retrieval.deduplicate_pages = deduplicate_pages;
    }

    #[inline]
    pub fn set_section_pages(&mut self, section_pages: u32) -> Result<(), ConfigError> {
        validate_section_pages(section_pages)?;
        self.routing.section_pages = section_pages;
        Ok(())
    }
}

fn validate_top_k(top_k: usize) -> Result<(), ConfigError> {
    if top_k == 0 || top_k > MAX_TOP_K {
        return Err(ConfigError::InvalidTopK(top_k));
    }
    Ok(())
}

fn validate_min_similarity(min_similarity: f32) -> Result<(), ConfigError> {
    if !min_similarity.is_finite() || !(-1.0..=1.0).contains(&min_similarity) {
        return Err(ConfigError::InvalidMinSimilarity(min_similarity));
    }
    Ok(())
}

fn validate_section_pages(section_pages: u32) -> Result<(), ConfigError> {
    if section_pages == 0 {
        return Err(ConfigError::InvalidSectionPages(section_pages));
    }
    Ok(())
}
