//! Runtime settings read from a TOML file. Every field has a default, so a
//! missing section or key keeps the stock behaviour.

use crate::detect::DEFAULT_SAMPLE_SIZE;
use crate::translate::google::DEFAULT_ENDPOINT;
use crate::translate::retry::{RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};
use crate::translate::DEFAULT_MAX_BATCH_CHARS;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::trace;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub translation: TranslationConfig,
    pub detection: DetectionConfig,
    pub backend: BackendConfig,
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Ceiling on the characters sent in one batch
    pub max_batch_chars: usize,
    /// Retries after the first failed call
    pub max_attempts: u32,
    /// Base delay in milliseconds; also the pause between batches
    pub base_delay_ms: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            max_batch_chars: DEFAULT_MAX_BATCH_CHARS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY.as_millis() as u64,
        }
    }
}

impl TranslationConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Cues sampled to guess a subtitle's language
    pub sample_size: usize,
    /// Fixed seed for reproducible sampling
    pub seed: Option<u64>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// CSV table replacing the built-in language catalog
    pub path: Option<PathBuf>,
}

impl Config {
    /// Read a config file.
    pub fn load(path: &Path) -> Result<Self> {
        trace!("Config::load path={}", path.display());
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
