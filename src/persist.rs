//! Disk I/O helpers: load from file, ensure the parent directory, atomic write.
//!
//! Writes go through a temp file in the same directory followed by a rename,
//! so another instance reloading on a change event never reads a half-written
//! file. On FAT32 or network shares the rename carries no hard guarantees.

use crate::error::{Error, Result};
use crate::serializer::Serializer;
use serde_json::{Map, Value};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Reads and deserializes the file at `path`. Returns an empty map if the file
/// is missing, empty or blank (not an error).
pub fn load(path: &Path, serializer: &dyn Serializer) -> Result<Map<String, Value>> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
        Err(e) => return Err(Error::Io(format!("reading {}: {e}", path.display()))),
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    serializer.deserialize(&bytes)
}

/// Creates every missing directory above `path`. Idempotent.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir)
            .map_err(|e| Error::Io(format!("creating {}: {e}", dir.display()))),
        _ => Ok(()),
    }
}

/// Write `bytes` to a sibling temp file, flush it to disk and rename it over
/// `path`.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = temp_path(path);
    if let Err(e) = write_synced(&tmp, bytes) {
        let _ = std::fs::remove_file(&tmp);
        return Err(Error::Io(format!("writing {}: {e}", tmp.display())));
    }
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(Error::Io(format!("renaming onto {}: {e}", path.display())));
    }
    Ok(())
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

// Unique per process and per write so two stores on one file never share a
// temp file.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "store.json".to_owned());
    let seq = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{name}.{}.{seq}.tmp", std::process::id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::JsonSerializer;
    use serde_json::json;

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let map = load(&dir.path().join("absent.json"), &JsonSerializer::new()).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn blank_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.json");
        std::fs::write(&path, " \n\t").unwrap();
        assert!(load(&path, &JsonSerializer::new()).unwrap().is_empty());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();
        let err = load(&path, &JsonSerializer::new()).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn reading_a_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path(), &JsonSerializer::new()).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn atomic_write_replaces_content_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        std::fs::write(&path, "{\"old\":true,\"long\":\"xxxxxxxxxxxxxxxx\"}").unwrap();
        atomic_write(&path, b"{\"new\":1}").unwrap();

        let map = load(&path, &JsonSerializer::new()).unwrap();
        assert_eq!(map.get("new"), Some(&json!(1)));
        assert!(map.get("old").is_none());

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn ensure_parent_dir_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c/db.json");
        ensure_parent_dir(&path).unwrap();
        ensure_parent_dir(&path).unwrap();
        assert!(dir.path().join("a/b/c").is_dir());
    }
}
