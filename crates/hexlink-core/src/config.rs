//! Store configuration, loadable from TOML.
//!
//! ```toml
//! folder = "./db"
//! audit_level = "basic"
//! false_positive_rate = 0.01
//! initial_capacity = 10000
//! classifier_config = "./db/config/datatypes.toml"
//! ```

use crate::HexlinkError;
use crate::audit::AuditLevel;
use crate::primitives::{
    CLASSIFIER_FILE, DATABASE_FILE, DEFAULT_FALSE_POSITIVE_RATE, DEFAULT_FILTER_CAPACITY,
    FILTER_FILE,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Folder used when none is configured.
pub const DEFAULT_FOLDER: &str = "./db";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root folder of the store. `None` means [`DEFAULT_FOLDER`].
    pub folder: Option<PathBuf>,

    /// Verbosity of per-object audit events.
    pub audit_level: AuditLevel,

    /// Target false-positive rate of the link filter.
    pub false_positive_rate: f64,

    /// Values the first filter layer holds before a new layer is added.
    pub initial_capacity: u64,

    /// Classifier rules. Defaults to `<folder>/config/datatypes.toml`.
    pub classifier_config: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            folder: None,
            audit_level: AuditLevel::None,
            false_positive_rate: DEFAULT_FALSE_POSITIVE_RATE,
            initial_capacity: DEFAULT_FILTER_CAPACITY,
            classifier_config: None,
        }
    }
}

impl StoreConfig {
    /// Defaults rooted at `folder`.
    #[must_use]
    pub fn for_folder(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: Some(folder.into()),
            ..Self::default()
        }
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, HexlinkError> {
        let config: Self =
            toml::from_str(text).map_err(|e| HexlinkError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, HexlinkError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            HexlinkError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), HexlinkError> {
        if !(self.false_positive_rate > 0.0 && self.false_positive_rate < 1.0) {
            return Err(HexlinkError::ConfigError(format!(
                "false_positive_rate must be in (0, 1), got {}",
                self.false_positive_rate
            )));
        }
        if self.initial_capacity == 0 {
            return Err(HexlinkError::ConfigError(
                "initial_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn folder(&self) -> PathBuf {
        self.folder
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FOLDER))
    }

    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.folder().join(DATABASE_FILE)
    }

    #[must_use]
    pub fn filter_path(&self) -> PathBuf {
        self.folder().join(FILTER_FILE)
    }

    #[must_use]
    pub fn classifier_path(&self) -> PathBuf {
        self.classifier_config
            .clone()
            .unwrap_or_else(|| self.folder().join(CLASSIFIER_FILE))
    }
}
