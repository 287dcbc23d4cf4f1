//! Artifact file helpers: directory creation and JSON persistence.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::errors::FailureCause;

/// Creates the parent directory of `path` if it does not exist.
pub fn ensure_parent_dir(path: &Path) -> Result<(), FailureCause> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| FailureCause::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    Ok(())
}

/// Serializes `value` as pretty JSON into `path`, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), FailureCause> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| FailureCause::Json {
        path: path.to_path_buf(),
        source,
    })?;
    write_bytes(path, &bytes)
}

/// Reads and deserializes a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, FailureCause> {
    let bytes = read_bytes(path)?;
    serde_json::from_slice(&bytes).map_err(|source| FailureCause::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes raw bytes into `path`, creating parent directories.
pub fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), FailureCause> {
    ensure_parent_dir(path)?;
    fs::write(path, bytes).map_err(|source| FailureCause::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads a whole file.
pub fn read_bytes(path: &Path) -> Result<Vec<u8>, FailureCause> {
    fs::read(path).map_err(|source| FailureCause::Io {
        path: path.to_path_buf(),
        source,
    })
}
