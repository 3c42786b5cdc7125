//! Pluggable storage for the learned clock offset.
//!
//! The [`OffsetStore`] trait abstracts over where the offset lives so callers
//! can keep it in memory, in a small file, or in their own key/value store.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

// ─── Trait ────────────────────────────────────────────────────────────────────

/// A keyed store of signed integers.
pub trait OffsetStore: Send + Sync {
    /// Read the value stored under `key`, or `None` if nothing was written yet.
    fn load(&self, key: &str) -> io::Result<Option<i64>>;

    /// Persist `value` under `key`.
    fn save(&self, key: &str, value: i64) -> io::Result<()>;

    /// Human-readable name of this store (for log messages).
    fn name(&self) -> &str;
}

fn poisoned() -> io::Error {
    io::Error::other("offset store lock poisoned")
}

// ─── InMemoryStore ────────────────────────────────────────────────────────────

/// Keeps values for the lifetime of the process only.
#[derive(Default)]
pub struct InMemoryStore {
    values: Mutex<HashMap<String, i64>>,
}

impl InMemoryStore {
    /// Empty store.
    pub fn new() -> Self { Self::default() }
}

impl OffsetStore for InMemoryStore {
    fn load(&self, key: &str) -> io::Result<Option<i64>> {
        let values = self.values.lock().map_err(|_| poisoned())?;
        Ok(values.get(key).copied())
    }

    fn save(&self, key: &str, value: i64) -> io::Result<()> {
        let mut values = self.values.lock().map_err(|_| poisoned())?;
        values.insert(key.to_owned(), value);
        Ok(())
    }

    fn name(&self) -> &str { "in-memory" }
}

// ─── FileStore ────────────────────────────────────────────────────────────────

/// One 8-byte little-endian file per key inside a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Store files under `dir`, created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.offset"))
    }
}

impl OffsetStore for FileStore {
    fn load(&self, key: &str) -> io::Result<Option<i64>> {
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }
        let buf = std::fs::read(&path)?;
        let bytes: [u8; 8] = buf
            .as_slice()
            .try_into()
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "truncated offset file"))?;
        Ok(Some(i64::from_le_bytes(bytes)))
    }

    fn save(&self, key: &str, value: i64) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path(key), value.to_le_bytes())
    }

    fn name(&self) -> &str { "file" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_round_trip() {
        let store = InMemoryStore::new();
        assert_eq!(store.load("server_time_offset").unwrap(), None);
        store.save("server_time_offset", -42).unwrap();
        assert_eq!(store.load("server_time_offset").unwrap(), Some(-42));
        assert_eq!(store.load("other").unwrap(), None);
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("state"));
        assert_eq!(store.load("server_time_offset").unwrap(), None);
        store.save("server_time_offset", 3600).unwrap();
        assert_eq!(store.load("server_time_offset").unwrap(), Some(3600));
    }

    #[test]
    fn file_store_rejects_truncated_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("k.offset"), [1, 2, 3]).unwrap();
        let store = FileStore::new(dir.path());
        assert_eq!(store.load("k").unwrap_err().kind(), io::ErrorKind::InvalidData);
    }
}
