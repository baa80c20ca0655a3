//! Schema loader for loading type declarations from disk at startup
//!
//! A schema path is either a single JSON document or a directory of `*.json`
//! documents whose type lists are merged. Missing or malformed files fail
//! startup.

use std::fs;
use std::path::{Path, PathBuf};

use super::errors::{SchemaError, SchemaResult};
use super::registry::Schema;
use super::types::{SchemaFile, TypeDef};

/// Reads schema documents and builds a validated [`Schema`].
pub struct SchemaLoader {
    path: PathBuf,
}

impl SchemaLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads every document under the configured path and validates the
    /// merged type list.
    pub fn load(&self) -> SchemaResult<Schema> {
        let types = if self.path.is_dir() {
            self.load_dir()?
        } else {
            Self::load_file(&self.path)?.types
        };
        Schema::from_types(types)
    }

    /// Parses and validates an in-memory document.
    pub fn from_json_str(json: &str) -> SchemaResult<Schema> {
        let file: SchemaFile = serde_json::from_str(json).map_err(|e| SchemaError::Malformed {
            path: "<in-memory>".to_string(),
            reason: format!("Invalid JSON: {}", e),
        })?;
        Schema::from_file(file)
    }

    fn load_dir(&self) -> SchemaResult<Vec<TypeDef>> {
        let malformed = |reason: String| SchemaError::Malformed {
            path: self.path.display().to_string(),
            reason,
        };

        let entries = fs::read_dir(&self.path)
            .map_err(|e| malformed(format!("Failed to read schema directory: {}", e)))?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| malformed(format!("Failed to read directory entry: {}", e)))?;
            let path = entry.path();
            // Skip non-JSON files
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            paths.push(path);
        }
        // read_dir order is platform dependent
        paths.sort();

        let mut types = Vec::new();
        for path in paths {
            types.extend(Self::load_file(&path)?.types);
        }
        Ok(types)
    }

    fn load_file(path: &Path) -> SchemaResult<SchemaFile> {
        let content = fs::read_to_string(path).map_err(|e| SchemaError::Malformed {
            path: path.display().to_string(),
            reason: format!("Failed to read file: {}", e),
        })?;

        serde_json::from_str(&content).map_err(|e| SchemaError::Malformed {
            path: path.display().to_string(),
            reason: format!("Invalid JSON: {}", e),
        })
    }
}
