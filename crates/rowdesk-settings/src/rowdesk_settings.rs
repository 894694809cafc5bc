//! rowdesk settings
//!
//! Application settings and the saved-connections store. Neither is read by
//! the editing core; callers load them at startup and pass values in.

mod connections;
pub mod settings_file;

pub use connections::{ConnectionStore, global, init_global};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RowdeskSettings {
    pub table: TableSettings,
    pub logging: LoggingSettings,
}

impl RowdeskSettings {
    /// Load from the platform config directory, defaults when absent
    pub fn load() -> Result<Self> {
        Self::load_from(&settings_file::settings_file()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&settings_file::settings_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {:?}", path))?;
        serde_json::from_str(&content).with_context(|| "Failed to parse settings JSON")
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSettings {
    /// Rows per page when a table is opened
    pub default_limit: usize,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self { default_limit: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingSettings {
    /// Overrides the built-in filter when `RUST_LOG` is unset
    pub filter: Option<String>,
}
