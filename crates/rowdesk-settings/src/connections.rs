//! Saved connections
//!
//! A flat name to connection-string map persisted as
//! `{"connections": {"name": "uri", ...}}`. Every mutation is written through
//! to disk immediately.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::settings_file;

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConnectionsFile {
    #[serde(default)]
    connections: IndexMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ConnectionStore {
    path: PathBuf,
    connections: IndexMap<String, String>,
}

impl ConnectionStore {
    /// Load from `path`; a missing file is an empty store
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no saved connections yet");
            return Ok(Self {
                path,
                connections: IndexMap::new(),
            });
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read connections from {:?}", path))?;
        let file: ConnectionsFile =
            serde_json::from_str(&content).with_context(|| "Failed to parse connections JSON")?;
        tracing::debug!(count = file.connections.len(), "loaded saved connections");
        Ok(Self {
            path,
            connections: file.connections,
        })
    }

    /// Load from the platform data directory
    pub fn load_default() -> Result<Self> {
        Self::load(settings_file::connections_file()?)
    }

    /// Add or replace a connection and persist
    pub fn save(&mut self, name: impl Into<String>, uri: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.connections.insert(name.clone(), uri.into());
        self.persist()?;
        tracing::info!(%name, "saved connection");
        Ok(())
    }

    /// Remove a connection and persist. Returns the removed connection string.
    pub fn delete(&mut self, name: &str) -> Result<Option<String>> {
        let removed = self.connections.shift_remove(name);
        if removed.is_some() {
            self.persist()?;
            tracing::info!(%name, "deleted connection");
        }
        Ok(removed)
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = ConnectionsFile {
            connections: self.connections.clone(),
        };
        let content = serde_json::to_string_pretty(&file)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write connections to {:?}", self.path))?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.connections.get(name).map(String::as_str)
    }

    /// Name under which `uri` is saved, if any
    pub fn name_for_uri(&self, uri: &str) -> Option<&str> {
        self.connections
            .iter()
            .find(|(_, saved)| saved.as_str() == uri)
            .map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.connections
            .iter()
            .map(|(name, uri)| (name.as_str(), uri.as_str()))
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

static GLOBAL: OnceLock<RwLock<ConnectionStore>> = OnceLock::new();

/// Install the process-wide store.
///
/// Returns false, leaving the existing store in place, if one was already
/// installed.
pub fn init_global(store: ConnectionStore) -> bool {
    GLOBAL.set(RwLock::new(store)).is_ok()
}

/// The process-wide store, once [`init_global`] has run
pub fn global() -> Option<&'static RwLock<ConnectionStore>> {
    GLOBAL.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConnectionStore::load(dir.path().join("connections.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn save_and_delete_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("connections.json");

        let mut store = ConnectionStore::load(&path).unwrap();
        store.save("local", "postgres://localhost/app").unwrap();
        store.save("staging", "postgres://staging/app").unwrap();
        store.save("local", "postgres://localhost/other").unwrap();

        let reloaded = ConnectionStore::load(&path).unwrap();
        assert_eq!(
            reloaded.iter().collect::<Vec<_>>(),
            vec![
                ("local", "postgres://localhost/other"),
                ("staging", "postgres://staging/app"),
            ]
        );
        assert_eq!(reloaded.name_for_uri("postgres://staging/app"), Some("staging"));

        store.delete("local").unwrap();
        assert_eq!(store.delete("missing").unwrap(), None);
        let reloaded = ConnectionStore::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get("local"), None);
    }

    #[test]
    fn file_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("connections.json");
        let mut store = ConnectionStore::load(&path).unwrap();
        store.save("local", "postgres://localhost/app").unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"connections": {"local": "postgres://localhost/app"}})
        );
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("connections.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(ConnectionStore::load(&path).is_err());
    }

    #[test]
    fn global_store_is_installed_once() {
        let dir = tempfile::tempdir().unwrap();
        let first = ConnectionStore::load(dir.path().join("a.json")).unwrap();
        let second = ConnectionStore::load(dir.path().join("b.json")).unwrap();

        assert!(init_global(first));
        assert!(!init_global(second));
        let store = global().unwrap().read();
        assert!(store.path().ends_with("a.json"));
    }
}
