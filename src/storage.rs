//! Durable storage port.
//!
//! The spec and the history are two independent records, each addressed by
//! a [`Namespace`]. Stores never touch the filesystem directly; they go
//! through a [`Storage`] so tests can swap in [`MemoryStorage`].

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::PlannerError;

/// Independent durable records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Spec,
    History,
}

impl Namespace {
    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Spec => "spec",
            Namespace::History => "history",
        }
    }

    /// File name used by [`FileStorage`].
    pub fn file_name(self) -> &'static str {
        match self {
            Namespace::Spec => "spec.json",
            Namespace::History => "history.json",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read/write port for serialized records.
///
/// `read` returns `Ok(None)` when nothing has been stored yet.
pub trait Storage: Send + Sync {
    fn read(&self, namespace: Namespace) -> Result<Option<String>, PlannerError>;
    fn write(&self, namespace: Namespace, contents: &str) -> Result<(), PlannerError>;
}

/// One JSON file per namespace inside a data directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, namespace: Namespace) -> PathBuf {
        self.dir.join(namespace.file_name())
    }
}

impl Storage for FileStorage {
    fn read(&self, namespace: Namespace) -> Result<Option<String>, PlannerError> {
        let path = self.path_for(namespace);
        match fs::read_to_string(&path) {
            Ok(c) => Ok(Some(c)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PlannerError::PersistenceReadFailure {
                namespace,
                location: path.display().to_string(),
                detail: e.to_string(),
            }),
        }
    }

    /// Writes to a temporary file in the same directory and renames it into
    /// place; falls back to a direct write if the rename fails.
    fn write(&self, namespace: Namespace, contents: &str) -> Result<(), PlannerError> {
        let path = self.path_for(namespace);
        let write_err = |at: &Path, detail: String| PlannerError::PersistenceWriteFailure {
            namespace,
            location: at.display().to_string(),
            detail,
        };

        fs::create_dir_all(&self.dir)
            .map_err(|e| write_err(&self.dir, format!("failed to create directory: {e}")))?;

        let tmp_path = self.dir.join(format!("{}.tmp", namespace.file_name()));

        (|| -> std::io::Result<()> {
            let mut f = fs::File::create(&tmp_path)?;
            f.write_all(contents.as_bytes())?;
            f.flush()?;
            Ok(())
        })()
        .map_err(|e| write_err(&tmp_path, e.to_string()))?;

        if fs::rename(&tmp_path, &path).is_err() {
            fs::write(&path, contents).map_err(|e| write_err(&path, e.to_string()))?;
            let _ = fs::remove_file(&tmp_path);
        }

        Ok(())
    }
}

/// In-memory storage for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: Mutex<HashMap<Namespace, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a namespace, as if an earlier session had written it.
    pub fn with_record(self, namespace: Namespace, contents: impl Into<String>) -> Self {
        self.lock().insert(namespace, contents.into());
        self
    }

    /// Make every subsequent read fail, simulating an unavailable store.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write fail, simulating a full or disabled store.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, namespace: Namespace) -> Option<String> {
        self.lock().get(&namespace).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Namespace, String>> {
        // A poisoned map still holds whole records; keep using it.
        self.records.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Storage for MemoryStorage {
    fn read(&self, namespace: Namespace) -> Result<Option<String>, PlannerError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(PlannerError::PersistenceReadFailure {
                namespace,
                location: format!("memory:{namespace}"),
                detail: "storage unavailable".to_owned(),
            });
        }
        Ok(self.get(namespace))
    }

    fn write(&self, namespace: Namespace, contents: &str) -> Result<(), PlannerError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PlannerError::PersistenceWriteFailure {
                namespace,
                location: format!("memory:{namespace}"),
                detail: "quota exceeded".to_owned(),
            });
        }
        self.lock().insert(namespace, contents.to_owned());
        Ok(())
    }
}
