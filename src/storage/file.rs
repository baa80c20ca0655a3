//! Checksummed state file
//!
//! Layout:
//!
//! ```text
//! crc32:<8 hex digits>\n
//! <JSON body>
//! ```
//!
//! Saves write a temp file, fsync it, rename it over the old file and fsync
//! the directory, so a crash leaves either the old or the new state.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::checksum::{header_for, parse_header, verify_checksum};
use super::errors::{StorageError, StorageResult};
use super::state::StoreState;

const STATE_FILE: &str = "state.json";
const TEMP_FILE: &str = "state.json.tmp";

pub struct StateFile {
    dir: PathBuf,
}

impl StateFile {
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: data_dir.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    pub fn exists(&self) -> bool {
        self.path().exists()
    }

    /// Reads the state, or `None` when no state has been saved yet.
    pub fn load(&self) -> StorageResult<Option<StoreState>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|e| StorageError::io(&path, e))?;
        let (header, body) = content
            .split_once('\n')
            .ok_or_else(|| StorageError::corruption(&path, "missing checksum header"))?;
        let expected = parse_header(header)
            .ok_or_else(|| StorageError::corruption(&path, "malformed checksum header"))?;

        if !verify_checksum(body.as_bytes(), expected) {
            return Err(StorageError::corruption(&path, "checksum mismatch"));
        }

        serde_json::from_str(body)
            .map(Some)
            .map_err(|e| StorageError::corruption(&path, format!("invalid state body: {}", e)))
    }

    pub fn save(&self, state: &StoreState) -> StorageResult<()> {
        let body = serde_json::to_string(state).map_err(|e| StorageError::Encode(e.to_string()))?;

        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).map_err(|e| StorageError::io(&self.dir, e))?;
        }

        let temp = self.dir.join(TEMP_FILE);
        let mut file = File::create(&temp).map_err(|e| StorageError::io(&temp, e))?;
        writeln!(file, "{}", header_for(body.as_bytes())).map_err(|e| StorageError::io(&temp, e))?;
        file.write_all(body.as_bytes())
            .map_err(|e| StorageError::io(&temp, e))?;
        // fsync is mandatory before the rename
        file.sync_all().map_err(|e| StorageError::io(&temp, e))?;
        drop(file);

        let path = self.path();
        fs::rename(&temp, &path).map_err(|e| StorageError::io(&path, e))?;
        sync_dir(&self.dir)
    }
}

fn sync_dir(dir: &Path) -> StorageResult<()> {
    let handle = OpenOptions::new()
        .read(true)
        .open(dir)
        .map_err(|e| StorageError::io(dir, e))?;
    handle.sync_all().map_err(|e| StorageError::io(dir, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Fields, Identity, RecordId, Stage};
    use tempfile::TempDir;

    fn sample_state() -> StoreState {
        let mut state = StoreState::new();
        state.write_version(
            &Identity::new("Page", RecordId::new(1)),
            "Page",
            Fields::new(),
            Stage::Draft,
            None,
        );
        state
    }

    #[test]
    fn test_missing_file_loads_none() {
        let temp_dir = TempDir::new().unwrap();
        let file = StateFile::in_dir(temp_dir.path());
        assert!(!file.exists());
        assert!(file.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let file = StateFile::in_dir(temp_dir.path().join("data"));
        let state = sample_state();

        file.save(&state).unwrap();
        assert!(file.exists());
        assert!(!temp_dir.path().join("data").join(TEMP_FILE).exists());
        assert_eq!(file.load().unwrap(), Some(state));
    }

    #[test]
    fn test_tampered_body_is_corruption() {
        let temp_dir = TempDir::new().unwrap();
        let file = StateFile::in_dir(temp_dir.path());
        file.save(&sample_state()).unwrap();

        let content = fs::read_to_string(file.path()).unwrap();
        fs::write(file.path(), content.replace("Page", "Gage")).unwrap();

        let err = file.load().unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.code(), "STAGE_DATA_CORRUPTION");
    }

    #[test]
    fn test_missing_header_is_corruption() {
        let temp_dir = TempDir::new().unwrap();
        let file = StateFile::in_dir(temp_dir.path());
        fs::write(file.path(), "{}").unwrap();
        assert!(matches!(file.load(), Err(StorageError::Corruption { .. })));
    }
}
