use crate::detector::DEFAULT_KEEP_TOP_N;
use crate::error::BlurError;
use crate::measure::BlurrinessMeasure;
use crate::scorer::ScoreRequest;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    pub measure: BlurrinessMeasure,
    pub keep_top_n: usize,
    /// Scoring pool size; one thread per CPU when unset.
    pub worker_threads: Option<usize>,
    pub request: ScoreRequest,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            measure: BlurrinessMeasure::EdgeVariance,
            keep_top_n: DEFAULT_KEEP_TOP_N,
            worker_threads: None,
            request: ScoreRequest::default(),
        }
    }
}

impl DetectorSettings {
    /// Get the default settings file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Failed to get config directory")?;
        Ok(config_dir
            .join("sequential-blur-detector")
            .join("settings.json"))
    }

    /// Load settings from the default path, falling back to defaults when absent
    pub fn load() -> Result<Self> {
        let path = match Self::default_path() {
            Ok(path) => path,
            Err(e) => {
                log::debug!("{}, using default settings", e);
                return Ok(Self::default());
            }
        };
        if !path.exists() {
            log::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        let settings: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> std::result::Result<(), BlurError> {
        if self.keep_top_n == 0 {
            return Err(BlurError::Configuration(
                "keep_top_n must be at least 1".to_string(),
            ));
        }
        if self.worker_threads == Some(0) {
            return Err(BlurError::Configuration(
                "worker_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
