//! Key-value store persisted as a TOML document on disk.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tile_collector_core::{KeyValueStore, StoreError, CONFIG_NAMESPACE};

type Document = BTreeMap<String, BTreeMap<String, String>>;

/// Store that keeps every namespace of a TOML file in memory and rewrites
/// the file after each mutation.
#[derive(Debug)]
pub(crate) struct FileStore {
    path: PathBuf,
    document: Document,
}

impl FileStore {
    /// Opens the store at `path`, starting empty when the file does not exist.
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let document = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read store at {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("failed to parse store at {}", path.display()))?
        } else {
            Document::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            document,
        })
    }

    fn flush(&self) -> Result<(), StoreError> {
        let contents =
            toml::to_string(&self.document).map_err(|err| StoreError::Backend(err.to_string()))?;
        fs::write(&self.path, contents).map_err(|err| {
            StoreError::Backend(format!("failed to write {}: {err}", self.path.display()))
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.document.get(CONFIG_NAMESPACE)?.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let _ = self
            .document
            .entry(CONFIG_NAMESPACE.to_owned())
            .or_default()
            .insert(key.to_owned(), value.to_owned());
        self.flush()
    }

    fn unset(&mut self, key: &str) -> Result<(), StoreError> {
        let removed = self
            .document
            .get_mut(CONFIG_NAMESPACE)
            .and_then(|section| section.remove(key));
        if removed.is_none() {
            return Ok(());
        }
        self.flush()
    }
}
