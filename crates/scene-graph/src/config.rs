//! Traversal configuration loaded from TOML.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::intersect::HitReportingMode;
use crate::scene::{NodeMask, TraversalMode};

/// Errors raised while loading or saving a [`TraversalConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Settings shared by the visitors in this crate.
///
/// ```toml
/// traversal_mode = "active_children"
/// traversal_mask = 0xFFFF0000
/// node_mask_override = 0
/// hit_reporting_mode = "only_nearest_hit"
/// ```
///
/// Missing keys take their default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
    pub traversal_mode: TraversalMode,
    pub traversal_mask: NodeMask,
    pub node_mask_override: NodeMask,
    pub hit_reporting_mode: HitReportingMode,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            traversal_mode: TraversalMode::ActiveChildren,
            traversal_mask: NodeMask::MAX,
            node_mask_override: 0,
            hit_reporting_mode: HitReportingMode::AllHits,
        }
    }
}

impl TraversalConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Loads the configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Serializes the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Writes the configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }
}
