use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::io::lock::StoreLock;
use crate::io::store::{MutationQueue, NodeKey, NodeUpdate, StoreError, TaskStore, apply_update};
use crate::model::snapshot::Snapshot;

/// A store backed by one JSON snapshot file.
///
/// `commit` re-reads the file under an advisory lock, applies the queued
/// updates to whatever is on disk at that moment and writes it back
/// atomically, so edits made between fetch and commit by another writer
/// survive unless they touch the same field.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    queue: MutationQueue,
}

impl JsonStore {
    pub fn open(path: &Path) -> Self {
        JsonStore {
            path: path.to_path_buf(),
            queue: MutationQueue::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Snapshot, StoreError> {
        let text = fs::read_to_string(&self.path).map_err(|e| StoreError::ReadError {
            path: self.path.clone(),
            source: e,
        })?;
        serde_json::from_str(&text).map_err(|e| StoreError::ParseError {
            path: self.path.clone(),
            source: e,
        })
    }

    fn write(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let mut content = serde_json::to_string_pretty(snapshot)?;
        content.push('\n');
        atomic_write(&self.path, content.as_bytes()).map_err(|e| StoreError::WriteError {
            path: self.path.clone(),
            source: e,
        })
    }
}

impl TaskStore for JsonStore {
    fn fetch_snapshot(&mut self) -> Result<Snapshot, StoreError> {
        log::debug!("Reading store {}", self.path.display());
        self.read()
    }

    fn mutate(&mut self, key: NodeKey, update: NodeUpdate) {
        self.queue.push(key, update);
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }

    fn commit(&mut self) -> Result<usize, StoreError> {
        if self.queue.is_empty() {
            return Ok(0);
        }
        // A failed commit drops the batch; the next cycle derives a fresh one
        let batch = self.queue.drain();
        let _lock = StoreLock::acquire_default(&self.path)?;
        let mut snapshot = self.read()?;

        let mut applied = 0;
        for (key, update) in batch {
            if apply_update(&mut snapshot, &key, &update) {
                applied += 1;
            } else {
                log::warn!("{} {} was removed before commit, skipping", key.kind.as_str(), key.id);
            }
        }
        self.write(&snapshot)?;
        Ok(applied)
    }
}

/// Write `content` to `path` atomically using a temp file + rename.
fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
