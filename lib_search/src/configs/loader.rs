//! # Property Sources
//!
//! Collects configuration from JSON files, environment variables and
//! in-memory overrides, flattens it into a `BTreeMap<String, String>` of
//! normalized keys and binds [`SearchProperties`] from it.
//!
//! Precedence, lowest first: JSON files in the order they were added,
//! environment variables, then explicit overrides.

use std::collections::BTreeMap;
use std::path::PathBuf;

use config::{ext::*, *};
use tracing::debug;

use super::properties::{normalize_key, SearchProperties};
use crate::error::ConfigurationError;

/// An ordered set of configuration sources.
#[derive(Debug, Clone, Default)]
pub struct PropertySources {
    json_files: Vec<PathBuf>,
    env_vars: bool,
    overrides: Vec<(String, String)>,
}

impl PropertySources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an optional JSON file; a missing file is skipped.
    pub fn json_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.json_files.push(path.into());
        self
    }

    /// Includes environment variables. Use `__` as the segment separator,
    /// e.g. `SEARCH__CLIENT__URIS`.
    pub fn env_vars(mut self, enabled: bool) -> Self {
        self.env_vars = enabled;
        self
    }

    /// Sets a single property, overriding every other source.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.push((key.into(), value.into()));
        self
    }

    /// Sets properties written as `key=value` (or `key:value`).
    ///
    /// # Errors
    /// `ConfigurationError::Source` for an entry without a separator.
    pub fn pairs<I, S>(mut self, pairs: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pair in pairs {
            let pair = pair.as_ref();
            let split_at = pair
                .find('=')
                .or_else(|| pair.find(':'))
                .ok_or_else(|| ConfigurationError::Source(format!("expected key=value, got '{}'", pair)))?;
            let (key, value) = pair.split_at(split_at);
            self.overrides.push((key.trim().to_string(), value[1..].trim().to_string()));
        }
        Ok(self)
    }

    /// Loads every source and flattens the result.
    ///
    /// # Errors
    /// `ConfigurationError::Source` when a file exists but cannot be parsed.
    pub fn load(&self) -> Result<BTreeMap<String, String>, ConfigurationError> {
        let mut merged = BTreeMap::new();

        for file in &self.json_files {
            let path = file.to_string_lossy().to_string();
            if !file.is_file() {
                debug!(file = %path, "configuration file not found, skipping");
                continue;
            }
            let root: Box<dyn ConfigurationRoot> = DefaultConfigurationBuilder::new()
                .add_json_file(&path.is().optional())
                .build()
                .map_err(|e| ConfigurationError::Source(format!("{}: {:?}", path, e)))?;
            merge_into(&mut merged, &*root);
        }

        if self.env_vars {
            let root: Box<dyn ConfigurationRoot> = DefaultConfigurationBuilder::new()
                .add_env_vars()
                .build()
                .map_err(|e| ConfigurationError::Source(format!("environment: {:?}", e)))?;
            merge_into(&mut merged, &*root);
        }

        for (key, value) in &self.overrides {
            merged.insert(normalize_key(key), value.clone());
        }

        debug!(keys = merged.len(), "configuration loaded");
        Ok(merged)
    }
}

fn merge_into(merged: &mut BTreeMap<String, String>, root: &dyn ConfigurationRoot) {
    for (key, value) in root.iter(None) {
        merged.insert(normalize_key(&key.to_string()), value.to_string());
    }
}

/// Loads the sources and binds the properties found under `prefix`.
pub fn load_search_properties(
    sources: &PropertySources,
    prefix: &str,
) -> Result<SearchProperties, ConfigurationError> {
    let map = sources.load()?;
    SearchProperties::bind(&map, prefix)
}
