//! Application configuration, stored as TOML.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application settings. Every section is optional in the file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub classifier: ClassifierConfig,
    pub ocr: OcrConfig,
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Minimum OCR score for offline classification of saved results.
    pub score_threshold: f32,
    /// Minimum OCR score when scanning frames.
    pub interactive_score_threshold: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.0,
            interactive_score_threshold: labelscan_ocr::INTERACTIVE_SCORE_THRESHOLD,
        }
    }
}

/// External OCR command: receives a PNG on stdin, prints the engine's JSON result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub program: Option<String>,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Keep scanned frames here (content-addressed). Disabled when unset.
    pub snapshots_dir: Option<PathBuf>,
    /// Folder watched by `labelscan watch` when no directory is given.
    pub intake_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse configuration")
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Load from `explicit` if given (it must exist), otherwise from the default
    /// location, falling back to defaults when no file is present.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) if p.exists() => p,
                _ => {
                    tracing::debug!("No configuration file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration {}", path.display()))?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Self::from_toml(&content)
    }

    pub fn intake_dir(&self) -> Option<PathBuf> {
        self.paths
            .intake_dir
            .clone()
            .or_else(|| project_dirs().map(|d| d.data_dir().join("intake")))
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "labelscan", "LabelScan")
}

pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().join("config.toml"))
}
