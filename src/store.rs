// src/store.rs
use crate::clock::Clock;
use crate::config::{BackendKind, Config};
use crate::error::{AppError, AppResult, GuestbookResult, StoreError, StoreResult};
use crate::models::{new_entry_id, GuestbookEntry};
use crate::remote::RemoteBackend;
use log;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};

/// Mutation applied to the full newest-first collection inside a transaction.
pub type Mutation<'a> = dyn FnMut(&mut Vec<GuestbookEntry>) -> GuestbookResult<()> + 'a;

/// Diagnostics reported by `status`.
#[derive(Debug, Clone)]
pub struct BackendStatus {
    pub backend: &'static str,
    pub location: String,
    pub reachable: bool,
    pub entries: Option<usize>,
    pub error: Option<String>,
}

/// Persistence strategy behind the guestbook.
pub trait GuestbookBackend {
    fn name(&self) -> &'static str;

    /// Entries newest first, at most `limit` of them.
    fn fetch(&self, limit: Option<usize>) -> StoreResult<Vec<GuestbookEntry>>;

    /// Stores a freshly built entry as the new head and returns it as stored.
    fn insert(&self, entry: GuestbookEntry) -> StoreResult<GuestbookEntry>;

    /// Runs load, `mutation`, save as one unit. Nothing is written when
    /// `mutation` fails.
    fn transact(&self, mutation: &mut Mutation<'_>) -> GuestbookResult<()>;

    fn status(&self) -> BackendStatus;
}

/// Builds the backend selected by configuration.
pub fn open_backend(config: &Config) -> AppResult<Box<dyn GuestbookBackend>> {
    match config.backend {
        BackendKind::File => {
            log::info!("Using file backend at {:?}", config.data_file);
            Ok(Box::new(FileBackend::new(&config.data_file)))
        }
        BackendKind::Remote => {
            let remote = &config.remote;
            if remote.url.trim().is_empty() || remote.api_key.trim().is_empty() {
                return Err(AppError::Config(
                    "remote backend selected but SUPABASE_URL or the API key is missing".to_string(),
                ));
            }
            let backend = RemoteBackend::new(remote).map_err(|e| {
                log::error!("Failed to build remote client: {}", e);
                AppError::Store(e)
            })?;
            let clock = Clock::new(config.utc_offset_minutes, &config.date_format);
            Ok(Box::new(backend.with_clock(clock)))
        }
    }
}

/// Guestbook kept as one pretty-printed JSON array on disk.
pub struct FileBackend {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileBackend {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Reads the document. A missing or unparsable file is an empty guestbook.
    fn read_entries(&self) -> Vec<GuestbookEntry> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("Guestbook file {:?} does not exist yet", self.path);
                return Vec::new();
            }
            Err(e) => {
                log::warn!("Failed to read guestbook file {:?}: {}. Treating as empty.", self.path, e);
                return Vec::new();
            }
        };

        if content.trim().is_empty() {
            return Vec::new();
        }

        match serde_json::from_str::<Vec<GuestbookEntry>>(&content) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Guestbook file {:?} is not a valid entry list: {}. Treating as empty.", self.path, e);
                Vec::new()
            }
        }
    }

    /// Replaces the document by writing a sibling temp file and renaming it over the target.
    fn write_entries(&self, entries: &[GuestbookEntry]) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(entries).map_err(|e| {
            let msg = format!("JSON serialization failed: {}", e);
            log::error!("write_entries: {}", msg);
            StoreError::Serialization(msg)
        })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    log::error!("Failed to create directory {:?}: {:?}", parent, e);
                    e
                })?;
            }
        }

        let tmp_path = temp_path_for(&self.path);
        fs::write(&tmp_path, json).map_err(|e| {
            log::error!("Failed to write {:?}: {:?}", tmp_path, e);
            e
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|e| {
            log::error!("Failed to replace {:?} with {:?}: {:?}", self.path, tmp_path, e);
            let _ = fs::remove_file(&tmp_path);
            e
        })?;

        log::debug!("Wrote {} entries to {:?}", entries.len(), self.path);
        Ok(())
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut file_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "guestbook.json".into());
    file_name.push(".tmp");
    path.with_file_name(file_name)
}

/// Gives every entry without an id a fresh one. Returns whether anything changed.
pub fn assign_missing_ids(entries: &mut [GuestbookEntry]) -> bool {
    let mut changed = false;
    for entry in entries.iter_mut().filter(|entry| entry.id.trim().is_empty()) {
        entry.id = new_entry_id();
        changed = true;
    }
    changed
}

impl GuestbookBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    fn fetch(&self, limit: Option<usize>) -> StoreResult<Vec<GuestbookEntry>> {
        let _guard = self.write_lock.lock();
        let mut entries = self.read_entries();

        if assign_missing_ids(&mut entries) {
            log::info!("Assigned ids to legacy entries in {:?}", self.path);
            if let Err(e) = self.write_entries(&entries) {
                log::error!("Failed to persist migrated ids to {:?}: {}", self.path, e);
            }
        }

        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    fn insert(&self, entry: GuestbookEntry) -> StoreResult<GuestbookEntry> {
        let _guard = self.write_lock.lock();
        let mut entries = self.read_entries();
        assign_missing_ids(&mut entries);
        entries.insert(0, entry.clone());
        self.write_entries(&entries)?;
        Ok(entry)
    }

    fn transact(&self, mutation: &mut Mutation<'_>) -> GuestbookResult<()> {
        let _guard = self.write_lock.lock();
        let mut entries = self.read_entries();
        assign_missing_ids(&mut entries);
        mutation(&mut entries)?;
        self.write_entries(&entries)?;
        Ok(())
    }

    /// Reads the document directly so that I/O and parse failures are reported
    /// instead of being read as an empty guestbook.
    fn status(&self) -> BackendStatus {
        let location = self.path.display().to_string();
        let document = {
            let _guard = self.write_lock.lock();
            match fs::read_to_string(&self.path) {
                Ok(content) if content.trim().is_empty() => Ok(0),
                Ok(content) => serde_json::from_str::<Vec<GuestbookEntry>>(&content)
                    .map(|entries| entries.len())
                    .map_err(|e| format!("invalid guestbook document: {}", e)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
                Err(e) => Err(format!("cannot read guestbook file: {}", e)),
            }
        };

        match document {
            Ok(count) => BackendStatus {
                backend: self.name(),
                location,
                reachable: true,
                entries: Some(count),
                error: None,
            },
            Err(error) => {
                log::warn!("File status check for {:?} failed: {}", self.path, error);
                BackendStatus {
                    backend: self.name(),
                    location,
                    reachable: false,
                    entries: None,
                    error: Some(error),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GuestbookError;
    use tempfile::tempdir;

    fn entry(name: &str) -> GuestbookEntry {
        GuestbookEntry::new(name.to_string(), format!("hello from {}", name), "2024-01-01 00:00".to_string(), None)
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::new(&dir.path().join("guestbook.json"));
        assert!(backend.fetch(None).unwrap().is_empty());
        assert!(!backend.path.exists());
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("guestbook.json");
        fs::write(&path, "{ not json").unwrap();
        let backend = FileBackend::new(&path);
        assert!(backend.fetch(None).unwrap().is_empty());

        fs::write(&path, r#"{"entries": []}"#).unwrap();
        assert!(backend.fetch(None).unwrap().is_empty());
    }

    #[test]
    fn test_insert_puts_entry_at_head_and_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("guestbook.json");
        let backend = FileBackend::new(&path);

        let alice = backend.insert(entry("Alice")).unwrap();
        let bob = backend.insert(entry("Bob")).unwrap();

        let reopened = FileBackend::new(&path);
        let entries = reopened.fetch(None).unwrap();
        assert_eq!(entries, vec![bob.clone(), alice]);
        assert_eq!(reopened.fetch(Some(1)).unwrap(), vec![bob]);
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_non_ascii_is_written_verbatim() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("guestbook.json");
        let backend = FileBackend::new(&path);
        backend
            .insert(GuestbookEntry::new("가루".into(), "반가워요 🐶".into(), "d".into(), None))
            .unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("가루"));
        assert!(raw.contains("반가워요 🐶"));
    }

    #[test]
    fn test_legacy_ids_are_assigned_once_and_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("guestbook.json");
        fs::write(
            &path,
            r#"[{"name": "Old", "message": "from before ids", "date": "2023-01-01 09:00"}]"#,
        )
        .unwrap();
        let backend = FileBackend::new(&path);

        let first = backend.fetch(None).unwrap();
        assert_eq!(first.len(), 1);
        assert!(!first[0].id.is_empty());

        let second = backend.fetch(None).unwrap();
        assert_eq!(second[0].id, first[0].id);

        let on_disk: Vec<GuestbookEntry> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk[0].id, first[0].id);
    }

    #[test]
    fn test_failed_mutation_writes_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("guestbook.json");
        let backend = FileBackend::new(&path);
        backend.insert(entry("Alice")).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        let result = backend.transact(&mut |entries: &mut Vec<GuestbookEntry>| -> GuestbookResult<()> {
            entries.clear();
            Err(GuestbookError::NotFound("x".to_string()))
        });
        assert!(matches!(result, Err(GuestbookError::NotFound(_))));
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn test_write_failure_propagates() {
        let dir = tempdir().unwrap();
        // The target is a directory, so the rename cannot replace it.
        let path = dir.path().join("occupied");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "x").unwrap();
        let backend = FileBackend::new(&path);

        let result = backend.insert(entry("Alice"));
        assert!(matches!(result, Err(StoreError::Io(_))));
    }

    #[test]
    fn test_status_reports_entry_count() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::new(&dir.path().join("guestbook.json"));
        backend.insert(entry("Alice")).unwrap();
        let status = backend.status();
        assert_eq!(status.backend, "file");
        assert!(status.reachable);
        assert_eq!(status.entries, Some(1));
    }

    #[test]
    fn test_status_of_missing_file_is_reachable_and_empty() {
        let dir = tempdir().unwrap();
        let status = FileBackend::new(&dir.path().join("guestbook.json")).status();
        assert!(status.reachable);
        assert_eq!(status.entries, Some(0));
        assert!(status.error.is_none());
    }

    #[test]
    fn test_status_reports_unreadable_or_corrupt_file() {
        let dir = tempdir().unwrap();
        let as_directory = dir.path().join("occupied");
        fs::create_dir(&as_directory).unwrap();
        let status = FileBackend::new(&as_directory).status();
        assert!(!status.reachable);
        assert!(status.entries.is_none());
        assert!(status.error.is_some());

        let corrupt = dir.path().join("guestbook.json");
        fs::write(&corrupt, "{ not json").unwrap();
        let status = FileBackend::new(&corrupt).status();
        assert!(!status.reachable);
        assert!(status.error.unwrap().contains("invalid guestbook document"));
    }

    #[test]
    fn test_open_backend_rejects_incomplete_remote_config() {
        let mut config = Config::default();
        config.backend = BackendKind::Remote;
        assert!(matches!(open_backend(&config), Err(AppError::Config(_))));
    }
}
