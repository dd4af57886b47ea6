//! JSON snapshot persistence.
//!
//! The whole library/document/chunk state is written as one JSON object:
//! `{"libraries": {id: ..}, "documents": {id: ..}, "chunks": {id: ..}}`.
//! Writes use atomic temp-file + rename, so a crash leaves either the previous
//! snapshot or the new one, never a torn file. Indices are not persisted.

use crate::error::{Error, Result};
use crate::model::{Chunk, Document, Library};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// Owned snapshot contents, as read from disk.
///
/// Maps keep file order, which becomes the insertion order of the loaded store.
#[derive(Debug, Default, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub libraries: IndexMap<String, Library>,
    #[serde(default)]
    pub documents: IndexMap<String, Document>,
    #[serde(default)]
    pub chunks: IndexMap<String, Chunk>,
}

/// Borrowed view used for writing without cloning the store.
#[derive(Serialize)]
pub struct SnapshotRef<'a> {
    pub libraries: &'a IndexMap<String, Library>,
    pub documents: &'a IndexMap<String, Document>,
    pub chunks: &'a IndexMap<String, Chunk>,
}

/// Serialize `snapshot` to `path` with an atomic write.
pub fn save_snapshot(path: &Path, snapshot: &SnapshotRef<'_>) -> Result<()> {
    let bytes = serde_json::to_vec(snapshot).map_err(|e| Error::Snapshot {
        path: path.to_path_buf(),
        source: e,
    })?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| Error::storage_io(dir, e))?;
    }
    let tmp_path = path.with_extension("json.tmp");

    // Atomic write: write to temp, then rename
    fs::write(&tmp_path, &bytes).map_err(|e| Error::storage_io(&tmp_path, e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))
            .map_err(|e| Error::storage_io(&tmp_path, e))?;
    }
    fs::rename(&tmp_path, path).map_err(|e| Error::storage_io(path, e))?;

    tracing::debug!(
        "Saved snapshot {:?} ({} libraries, {} documents, {} chunks, {} bytes)",
        path,
        snapshot.libraries.len(),
        snapshot.documents.len(),
        snapshot.chunks.len(),
        bytes.len()
    );
    Ok(())
}

/// Read the snapshot at `path`.
///
/// Returns `Ok(None)` when the file does not exist: a missing snapshot means a
/// fresh store. Any other read failure is `StorageIo`; malformed JSON is
/// `Snapshot`.
pub fn load_snapshot(path: &Path) -> Result<Option<Snapshot>> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::info!("No snapshot at {:?}, starting empty", path);
            return Ok(None);
        }
        Err(e) => return Err(Error::storage_io(path, e)),
    };

    let snapshot: Snapshot = serde_json::from_slice(&raw).map_err(|e| Error::Snapshot {
        path: path.to_path_buf(),
        source: e,
    })?;

    tracing::info!(
        "Loaded snapshot {:?} ({} libraries, {} documents, {} chunks)",
        path,
        snapshot.libraries.len(),
        snapshot.documents.len(),
        snapshot.chunks.len()
    );
    Ok(Some(snapshot))
}
