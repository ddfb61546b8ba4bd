//! Edit configuration.
//!
//! [`EditConfig`] is deserialized from JSON; every field is optional and
//! falls back to its default.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Default net class assigned to net signals created by paste.
fn default_net_class() -> String {
    "default".to_string()
}

fn default_true() -> bool {
    true
}

/// Tunables of the edit operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditConfig {
    /// Run the closure check on every board after a split or paste
    /// (default: true).
    #[serde(default = "default_true")]
    pub verify_invariants: bool,

    /// Net class for net signals created on paste (default: "default").
    #[serde(default = "default_net_class")]
    pub default_net_class: String,

    /// Remove library devices and packages no longer used on the board at
    /// the end of a removal (default: true).
    #[serde(default = "default_true")]
    pub remove_unused_library_elements: bool,
}

impl Default for EditConfig {
    fn default() -> Self {
        EditConfig {
            verify_invariants: true,
            default_net_class: default_net_class(),
            remove_unused_library_elements: true,
        }
    }
}

/// Errors loading an [`EditConfig`] from disk.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

impl EditConfig {
    /// Loads a configuration file (JSON).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}
