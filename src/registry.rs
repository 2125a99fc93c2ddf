//! Named connections: a label that pipelines refer to, bound to a URI.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::pipeline::{classify_uri, TRANSFORM_LABEL};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEntry {
    pub label: String,
    pub uri: String,
}

impl ConnectionEntry {
    pub fn new(label: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            uri: uri.into(),
        }
    }
}

impl fmt::Display for ConnectionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.label, self.uri)
    }
}

/// Read-only view of the connections, taken once per pipeline run.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Vec<ConnectionEntry>,
}

impl Registry {
    pub fn new(entries: Vec<ConnectionEntry>) -> Self {
        Self { entries }
    }

    pub fn lookup(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.uri.as_str())
    }

    pub fn entries(&self) -> &[ConnectionEntry] {
        &self.entries
    }
}

impl FromIterator<ConnectionEntry> for Registry {
    fn from_iter<T: IntoIterator<Item = ConnectionEntry>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SavedConnections {
    #[serde(default)]
    connections: Vec<ConnectionEntry>,
}

/// The TOML file holding saved connections.
#[derive(Debug, Clone)]
pub struct ConnectionStore {
    path: PathBuf,
}

impl ConnectionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("polyq")
            .join("connections.toml")
    }

    pub fn open_default() -> Self {
        Self::new(Self::default_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn list(&self) -> Result<Vec<ConnectionEntry>> {
        if !self.path.exists() {
            return Ok(vec![]);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let saved: SavedConnections = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(saved.connections)
    }

    pub fn snapshot(&self) -> Result<Registry> {
        Ok(Registry::new(self.list()?))
    }

    pub fn add(&self, label: &str, uri: &str) -> Result<ConnectionEntry> {
        let label = label.trim();
        let uri = uri.trim();

        if label == TRANSFORM_LABEL {
            bail!("New connection name cannot be '{}'.", TRANSFORM_LABEL);
        }
        if label.contains('>') {
            bail!("Cannot use suffix character '>'.");
        }
        if label.is_empty() || label.chars().any(char::is_whitespace) {
            bail!("Invalid connection name '{}'", label);
        }
        if uri.is_empty() {
            bail!("Invalid connection syntax '{}'", label);
        }
        classify_uri(uri)?;

        let mut connections = self.list()?;
        if connections.iter().any(|c| c.label == label) {
            bail!("Connection with name '{}' already exists.", label);
        }

        let entry = ConnectionEntry::new(label, uri);
        connections.push(entry.clone());
        self.save(&connections)?;
        tracing::info!(label, "connection added");
        Ok(entry)
    }

    pub fn delete(&self, label: &str) -> Result<ConnectionEntry> {
        let mut connections = self.list()?;
        let Some(index) = connections.iter().position(|c| c.label == label) else {
            return Err(PipelineError::UnknownConnection(label.to_string()).into());
        };
        let removed = connections.remove(index);
        self.save(&connections)?;
        tracing::info!(label, "connection deleted");
        Ok(removed)
    }

    fn save(&self, connections: &[ConnectionEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let saved = SavedConnections {
            connections: connections.to_vec(),
        };
        let content = toml::to_string_pretty(&saved)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, ConnectionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ConnectionStore::new(dir.path().join("polyq").join("connections.toml"));
        (dir, store)
    }

    #[test]
    fn test_missing_file_lists_nothing() {
        let (_dir, store) = store();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_add_and_list() {
        let (_dir, store) = store();
        store.add("pg0", "postgresql://localhost/app").unwrap();
        store.add("cache", "redis://localhost:6379").unwrap();

        let entries = store.list().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], ConnectionEntry::new("pg0", "postgresql://localhost/app"));
        assert_eq!(entries[1].label, "cache");
    }

    #[test]
    fn test_add_rejects_reserved_label() {
        let (_dir, store) = store();
        let err = store.add("jq", "redis://localhost").unwrap_err();
        assert_eq!(err.to_string(), "New connection name cannot be 'jq'.");
    }

    #[test]
    fn test_add_rejects_bad_labels() {
        let (_dir, store) = store();
        assert!(store.add("pg>", "postgresql://localhost").is_err());
        assert!(store.add("my pg", "postgresql://localhost").is_err());
        assert!(store.add("", "postgresql://localhost").is_err());
        assert!(store.add("pg", "").is_err());
    }

    #[test]
    fn test_add_rejects_unclassified_uri() {
        let (_dir, store) = store();
        let err = store.add("my", "mysql://localhost/db").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::UnknownConnectionType(_))
        ));
    }

    #[test]
    fn test_add_rejects_duplicates() {
        let (_dir, store) = store();
        store.add("pg0", "postgresql://localhost/a").unwrap();
        let err = store.add("pg0", "postgresql://localhost/b").unwrap_err();
        assert_eq!(err.to_string(), "Connection with name 'pg0' already exists.");
    }

    #[test]
    fn test_delete() {
        let (_dir, store) = store();
        store.add("pg0", "postgresql://localhost/a").unwrap();
        store.add("mg0", "mongodb://localhost/a").unwrap();

        let removed = store.delete("pg0").unwrap();
        assert_eq!(removed.label, "pg0");
        let labels: Vec<String> = store.list().unwrap().into_iter().map(|e| e.label).collect();
        assert_eq!(labels, vec!["mg0".to_string()]);
    }

    #[test]
    fn test_delete_unknown_label() {
        let (_dir, store) = store();
        let err = store.delete("nope").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::UnknownConnection(label)) if label == "nope"
        ));
    }

    #[test]
    fn test_registry_lookup_and_display() {
        let registry: Registry = vec![ConnectionEntry::new("pg0", "postgresql://h/db")]
            .into_iter()
            .collect();
        assert_eq!(registry.lookup("pg0"), Some("postgresql://h/db"));
        assert_eq!(registry.lookup("pg1"), None);
        assert_eq!(registry.entries()[0].to_string(), "pg0 → postgresql://h/db");
    }
}
