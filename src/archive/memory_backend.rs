//! In-memory backend used by the lifecycle tests. Records every call so tests
//! can assert which backend operations ran.

use crate::archive::backend::{ArchiveBackend, ArchivedCopy, BackendError, Filespace};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct MemoryBackend {
    store: Mutex<BTreeMap<String, Vec<u8>>>,
    calls: Mutex<Vec<String>>,
    failing: Mutex<BTreeSet<&'static str>>,
    corrupt_retrieve: AtomicBool,
    hide_archives: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call of `operation` fail until cleared.
    pub fn fail(&self, operation: &'static str) {
        lock(&self.failing).insert(operation);
    }

    pub fn clear_failures(&self) {
        lock(&self.failing).clear();
    }

    pub fn corrupt_retrievals(&self, on: bool) {
        self.corrupt_retrieve.store(on, Ordering::SeqCst);
    }

    /// Accept archive calls without recording the copy in the catalog.
    pub fn drop_archives(&self, on: bool) {
        self.hide_archives.store(on, Ordering::SeqCst);
    }

    pub fn insert(&self, object: &str, content: &[u8]) {
        lock(&self.store).insert(object.to_string(), content.to_vec());
    }

    pub fn contains(&self, object: &str) -> bool {
        lock(&self.store).contains_key(object)
    }

    pub fn count(&self, operation: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.split(' ').next() == Some(operation))
            .count()
    }

    fn record(&self, operation: &'static str, object: &str) -> Result<(), BackendError> {
        lock(&self.calls).push(format!("{operation} {object}"));
        if lock(&self.failing).contains(operation) {
            return Err(BackendError::Failed {
                command: format!("memory {operation} {object}"),
                status: "exit status: 12".to_string(),
                diagnostic: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn failed(command: &str, diagnostic: String) -> BackendError {
    BackendError::Failed {
        command: command.to_string(),
        status: "exit status: 12".to_string(),
        diagnostic,
    }
}

impl ArchiveBackend for MemoryBackend {
    fn archive(&self, object: &str) -> Result<(), BackendError> {
        self.record("archive", object)?;
        let content =
            fs::read(object).map_err(|err| failed("memory archive", err.to_string()))?;
        if !self.hide_archives.load(Ordering::SeqCst) {
            lock(&self.store).insert(object.to_string(), content);
        }
        Ok(())
    }

    fn retrieve(&self, object: &str, destination: &Path) -> Result<(), BackendError> {
        self.record("retrieve", object)?;
        let Some(mut content) = lock(&self.store).get(object).cloned() else {
            return Err(failed("memory retrieve", format!("no archive for {object}")));
        };
        if self.corrupt_retrieve.load(Ordering::SeqCst) {
            if let Some(first) = content.first_mut() {
                *first ^= 0xff;
            }
        }
        if destination.exists() {
            return Err(failed("memory retrieve", "destination exists".to_string()));
        }
        fs::write(destination, content).map_err(|err| failed("memory retrieve", err.to_string()))
    }

    fn delete(&self, object: &str) -> Result<(), BackendError> {
        self.record("delete", object)?;
        if lock(&self.store).remove(object).is_none() {
            return Err(failed("memory delete", format!("no archive for {object}")));
        }
        Ok(())
    }

    fn query_archive(&self, object: &str) -> Result<Vec<ArchivedCopy>, BackendError> {
        self.record("query", object)?;
        let store = lock(&self.store);
        Ok(store
            .get(object)
            .map(|content| ArchivedCopy {
                object: object.to_string(),
                size: Some(content.len().to_string()),
                archived_at: None,
                description: None,
            })
            .into_iter()
            .collect())
    }

    fn query_filespaces(&self) -> Result<Vec<Filespace>, BackendError> {
        self.record("filespaces", "")?;
        Ok(vec![Filespace {
            number: 1,
            fs_type: "EXT4".to_string(),
            name: "/".to_string(),
        }])
    }

    fn query_systeminfo(&self) -> Result<String, BackendError> {
        self.record("systeminfo", "")?;
        Ok("memory backend".to_string())
    }
}
