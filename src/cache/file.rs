use crate::cache::{CacheError, ModelCache};
use crate::estimation::trend::TrendModel;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Stores one JSON document per bin under a directory.
#[derive(Debug, Clone)]
pub struct FileModelCache {
    dir: PathBuf,
}

impl FileModelCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, bin_id: &str) -> Result<PathBuf, CacheError> {
        if bin_id.is_empty() {
            return Err(CacheError::InvalidKey(bin_id.to_string()));
        }
        Ok(self.dir.join(entry_file_name(bin_id)))
    }
}

/// Lowercase hex of the id's UTF-8 bytes, so any id maps to a distinct flat file name.
fn entry_file_name(bin_id: &str) -> String {
    let mut name = String::with_capacity(bin_id.len() * 2 + 5);
    for byte in bin_id.bytes() {
        name.push(char::from(HEX_DIGITS[usize::from(byte >> 4)]));
        name.push(char::from(HEX_DIGITS[usize::from(byte & 0x0f)]));
    }
    name.push_str(".json");
    name
}

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

impl ModelCache for FileModelCache {
    fn load(&self, bin_id: &str) -> Option<TrendModel> {
        let path = self.entry_path(bin_id).ok()?;
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(bin_id, "No cached trend model");
                return None;
            }
            Err(err) => {
                warn!(bin_id, path = %path.display(), error = %err, "Unreadable cached trend model");
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(model) => Some(model),
            Err(err) => {
                warn!(bin_id, path = %path.display(), error = %err, "Corrupt cached trend model");
                None
            }
        }
    }

    fn save(&self, bin_id: &str, model: &TrendModel) -> Result<(), CacheError> {
        let path = self.entry_path(bin_id)?;
        std::fs::create_dir_all(&self.dir)?;
        let payload = serde_json::to_string(model)?;
        std::fs::write(&path, payload)?;
        Ok(())
    }

    fn invalidate(&self, bin_id: &str) -> Result<(), CacheError> {
        let path = self.entry_path(bin_id)?;
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
