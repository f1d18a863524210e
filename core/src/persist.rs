use crate::error::PersistError;
use crate::store::ResultsStore;
use serde::Serialize;
use serde_json::Value;
use std::ffi::OsString;
use std::fs::{self, create_dir_all, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Replace the file at `path` with `bytes` so that a reader sees either the
/// previous document or the new one, never a truncated mix.
///
/// The bytes go to a `<name>.tmp` sibling first, are synced, and the sibling
/// is renamed over the target. On unix the containing directory is synced
/// after the rename so the new entry survives a power loss.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    let dir = match path.parent().filter(|d| !d.as_os_str().is_empty()) {
        Some(dir) => dir,
        None => Path::new("."),
    };
    create_dir_all(dir).map_err(|e| PersistError::io(dir, e))?;
    let tmp = temp_sibling(path);
    let written = write_synced(&tmp, bytes).and_then(|_| fs::rename(&tmp, path));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(PersistError::io(path, e));
    }
    sync_dir(dir).map_err(|e| PersistError::io(dir, e))
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut f = File::create(path)?;
    f.write_all(bytes)?;
    f.sync_all()
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name: OsString = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

pub fn load_results(path: &Path) -> Result<ResultsStore, PersistError> {
    let mut f = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(PersistError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(PersistError::io(path, e)),
    };
    let mut buf = String::new();
    f.read_to_string(&mut buf).map_err(|e| PersistError::io(path, e))?;
    match serde_json::from_str::<Value>(&buf)? {
        Value::Object(map) => Ok(ResultsStore::from(map)),
        _ => Err(PersistError::Corrupt(path.to_path_buf())),
    }
}

/// Overwrite the whole document at `path` with `results` (4-space indented JSON).
pub fn save_results(path: &Path, results: &ResultsStore) -> Result<(), PersistError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    results.serialize(&mut ser)?;
    atomic_write(path, &buf)
}

/// Durable home of a results snapshot, as seen by the driver.
pub trait SnapshotStore {
    /// The saved snapshot, or `None` when nothing has been saved yet.
    fn load(&self) -> Result<Option<ResultsStore>, PersistError>;
    /// Replace the saved snapshot with `results`.
    fn save(&mut self, results: &ResultsStore) -> Result<(), PersistError>;
}

/// JSON document on the local filesystem.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> Result<Option<ResultsStore>, PersistError> {
        match load_results(&self.path) {
            Ok(results) => Ok(Some(results)),
            Err(PersistError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save(&mut self, results: &ResultsStore) -> Result<(), PersistError> {
        save_results(&self.path, results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("responses.json");
        assert!(matches!(load_results(&path), Err(PersistError::NotFound(_))));
        assert!(JsonFileStore::new(&path).load().unwrap().is_none());
    }

    #[test]
    fn save_then_load_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("derivatives").join("responses.json");
        let mut results = ResultsStore::new();
        results.insert_new("DV-1", json!({"choices": []}));
        save_results(&path, &results).unwrap();
        assert_eq!(load_results(&path).unwrap(), results);
        assert!(!temp_sibling(&path).exists());
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n    \"DV-1\""));
    }

    #[test]
    fn repeated_saves_replace_the_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("responses.json");
        let mut results = ResultsStore::new();
        for id in ["a", "b", "c"] {
            results.insert_new(id, json!({"id": id}));
            atomic_write(&path, serde_json::to_string(&results).unwrap().as_bytes()).unwrap();
            assert_eq!(load_results(&path).unwrap(), results);
        }
        let names: Vec<_> = fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(names, vec![OsString::from("responses.json")]);
    }

    #[cfg(unix)]
    #[test]
    fn directory_sync_reports_missing_dir() {
        let dir = tempdir().unwrap();
        assert!(sync_dir(dir.path()).is_ok());
        assert!(sync_dir(&dir.path().join("gone")).is_err());
    }

    #[test]
    fn non_object_document_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("responses.json");
        fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(load_results(&path), Err(PersistError::Corrupt(_))));
    }

    #[test]
    fn truncated_document_is_an_error_not_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("responses.json");
        fs::write(&path, "{\"a\": {\"ok\": tr").unwrap();
        assert!(matches!(JsonFileStore::new(&path).load(), Err(PersistError::Serde(_))));
    }

    #[test]
    fn failed_write_keeps_previous_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("responses.json");
        let mut results = ResultsStore::new();
        results.insert_new("a", json!(1));
        save_results(&path, &results).unwrap();

        // A directory squatting on the temp name makes the write fail.
        fs::create_dir(temp_sibling(&path)).unwrap();
        results.insert_new("b", json!(2));
        assert!(save_results(&path, &results).is_err());

        let on_disk = load_results(&path).unwrap();
        assert_eq!(on_disk.len(), 1);
        assert!(on_disk.contains("a"));
    }
}
