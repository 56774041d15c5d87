//! Stub-based lifecycle manager.
//!
//! Every per-object operation takes the object lock, re-reads the on-disk
//! state, talks to the backend, and only then mutates the local entry through
//! an atomic rename. Local state is never changed before the backend has
//! confirmed the remote side of a transition.

use crate::archive::backend::{ArchiveBackend, ArchivedCopy, BackendError};
use crate::archive::checksum;
use crate::archive::classify::{
    ClassifiedObject, canonical_identity, classify_path, fingerprint, object_name,
};
use crate::archive::config::PathLimits;
use crate::archive::lock::ObjectLocks;
use crate::archive::pool;
use crate::archive::state::{ObjectState, StateLabel, classify_state};
use crate::archive::stub::{self, StubRecord, TEMP_PREFIX};
use crate::archive::warn::{self, WarnEvent};
use crate::error::{ArchivedEvidence, LifecycleError, LifecycleResult, ObjectKind};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveRequest {
    pub dry_run: bool,
    pub recursive: bool,
}

/// Result of one unit of work inside a batch.
#[derive(Debug)]
pub struct ObjectOutcome<T> {
    pub path: PathBuf,
    pub result: LifecycleResult<T>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveAction {
    Archived(StubRecord),
    /// Dry run: the object would be archived.
    Planned { size: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedObject {
    pub path: PathBuf,
    pub destination: PathBuf,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecalledObject {
    pub path: PathBuf,
    pub sha256: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedObject {
    pub path: PathBuf,
    pub object: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListEntry {
    pub path: PathBuf,
    pub state: StateLabel,
    pub remote_copies: Vec<ArchivedCopy>,
}

#[derive(Debug)]
enum PlannedArchive {
    Candidate(ClassifiedObject),
    Stubbed(PathBuf),
}

pub struct LifecycleManager<B> {
    backend: B,
    limits: PathLimits,
    locks: ObjectLocks,
    jobs: usize,
}

fn lock_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn already_archived(path: &Path, evidence: ArchivedEvidence) -> LifecycleError {
    LifecycleError::AlreadyArchived {
        path: path.to_path_buf(),
        evidence,
    }
}

fn file_name_of(path: &Path) -> LifecycleResult<&std::ffi::OsStr> {
    path.file_name().ok_or_else(|| LifecycleError::InvalidObjectKind {
        path: path.to_path_buf(),
        kind: ObjectKind::Other,
    })
}

fn staging_dir(parent: &Path) -> LifecycleResult<TempDir> {
    tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(".staging")
        .tempdir_in(parent)
        .map_err(|err| LifecycleError::io(parent, err))
}

/// Move `staged` to `dest` without ever replacing an existing entry.
///
/// The hard link is the no-clobber primitive. Only when the filesystem
/// refuses hard links outright does this fall back to check-then-rename,
/// which leaves a window where an entry created concurrently at `dest` can
/// be replaced. Every other link failure is reported as is.
fn place_noclobber(staged: &Path, dest: &Path) -> LifecycleResult<()> {
    match fs::hard_link(staged, dest) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            Err(LifecycleError::DestinationExists {
                path: dest.to_path_buf(),
            })
        }
        Err(err)
            if matches!(
                err.kind(),
                ErrorKind::Unsupported | ErrorKind::PermissionDenied
            ) =>
        {
            if fs::symlink_metadata(dest).is_ok() {
                return Err(LifecycleError::DestinationExists {
                    path: dest.to_path_buf(),
                });
            }
            fs::rename(staged, dest).map_err(|err| LifecycleError::io(dest, err))
        }
        Err(err) => Err(LifecycleError::io(dest, err)),
    }
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false)
}

/// Entries found by a recursive walk that are not regular files are skipped,
/// not rejected. Only paths named explicitly can fail the batch.
fn skip_entry(path: &Path, reason: &str) {
    warn::emit(WarnEvent {
        code: "SKIPPED_ENTRY",
        operation: "archive",
        object: &path.display().to_string(),
        action: "skip",
        reason,
        err: "",
    });
}

fn verify_restored(staged: &Path, reported: &Path, record: &StubRecord) -> LifecycleResult<()> {
    checksum::ensure_matches(staged, &record.sha256).map_err(|err| match err {
        LifecycleError::ChecksumMismatch {
            expected, actual, ..
        } => LifecycleError::ChecksumMismatch {
            path: reported.to_path_buf(),
            expected,
            actual,
        },
        other => other,
    })
}

impl<B: ArchiveBackend> LifecycleManager<B> {
    pub fn new(backend: B, limits: PathLimits, locks: ObjectLocks) -> Self {
        Self {
            backend,
            limits,
            locks,
            jobs: 1,
        }
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Archive a batch of paths.
    ///
    /// The outer error means validation rejected the batch and nothing was
    /// touched. Otherwise every object carries its own outcome.
    pub fn archive(
        &self,
        paths: &[PathBuf],
        request: &ArchiveRequest,
    ) -> LifecycleResult<Vec<ObjectOutcome<ArchiveAction>>> {
        let plan = self.plan_archive(paths, request.recursive)?;
        Ok(pool::run_per_object(self.jobs, &plan, |entry| match entry {
            PlannedArchive::Candidate(object) => ObjectOutcome {
                path: object.path.clone(),
                result: self.archive_one(object, request.dry_run),
            },
            PlannedArchive::Stubbed(path) => ObjectOutcome {
                path: path.clone(),
                result: Err(already_archived(path, ArchivedEvidence::LocalStub)),
            },
        }))
    }

    fn expand(&self, paths: &[PathBuf], recursive: bool) -> LifecycleResult<Vec<PathBuf>> {
        let mut out = Vec::with_capacity(paths.len());
        for path in paths {
            let is_dir = fs::symlink_metadata(path)
                .map(|meta| meta.is_dir())
                .unwrap_or(false);
            if !(recursive && is_dir) {
                out.push(path.clone());
                continue;
            }

            let walker = WalkDir::new(path)
                .follow_links(self.limits.allow_symlinks)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| !e.file_name().to_string_lossy().starts_with(TEMP_PREFIX));
            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        let at = err.path().unwrap_or(path.as_path()).to_path_buf();
                        // Dangling or looping links found while following links.
                        if is_symlink(&at) {
                            skip_entry(&at, "unresolvable-symlink");
                            continue;
                        }
                        return Err(LifecycleError::io(
                            &at,
                            std::io::Error::other(err.to_string()),
                        ));
                    }
                };
                let file_type = entry.file_type();
                if file_type.is_file() {
                    out.push(entry.into_path());
                } else if file_type.is_symlink() {
                    skip_entry(entry.path(), "symlink-not-followed");
                } else if !file_type.is_dir() {
                    skip_entry(entry.path(), "not-a-regular-file");
                }
            }
        }
        Ok(out)
    }

    fn plan_archive(&self, paths: &[PathBuf], recursive: bool) -> LifecycleResult<Vec<PlannedArchive>> {
        let mut seen = BTreeSet::new();
        let mut plan = Vec::new();
        for path in self.expand(paths, recursive)? {
            let canonical = canonical_identity(&path, &self.limits)?;
            if !seen.insert(canonical.clone()) {
                continue;
            }
            match classify_state(&canonical)? {
                ObjectState::Archived(_) => plan.push(PlannedArchive::Stubbed(canonical)),
                ObjectState::Absent => return Err(LifecycleError::not_found(canonical)),
                ObjectState::Live => {
                    plan.push(PlannedArchive::Candidate(classify_path(&canonical, &self.limits)?))
                }
            }
        }
        Ok(plan)
    }

    fn archive_one(&self, object: &ClassifiedObject, dry_run: bool) -> LifecycleResult<ArchiveAction> {
        let path = object.path.as_path();
        let _lock = self.locks.acquire(&lock_key(path), path)?;

        match classify_state(path)? {
            ObjectState::Archived(_) => {
                return Err(already_archived(path, ArchivedEvidence::LocalStub));
            }
            ObjectState::Absent => return Err(LifecycleError::not_found(path)),
            ObjectState::Live => {}
        }
        if !self.backend.query_archive(&object.name)?.is_empty() {
            return Err(already_archived(path, ArchivedEvidence::RemoteCopy));
        }
        if dry_run {
            return Ok(ArchiveAction::Planned { size: object.size });
        }

        let before = fingerprint(path)?;
        let digest = checksum::compute_digest(path)?;
        self.backend.archive(&object.name)?;
        if self.backend.query_archive(&object.name)?.is_empty() {
            return Err(LifecycleError::Inconsistent {
                path: path.to_path_buf(),
                detail: "backend accepted the archive but its catalog shows no copy".to_string(),
            });
        }

        match classify_state(path)? {
            ObjectState::Live => {}
            ObjectState::Archived(_) => {
                self.warn_remote(path, "archive", "DUPLICATE_REMOTE_COPY", "stub-appeared-before-swap");
                return Err(already_archived(path, ArchivedEvidence::LocalStub));
            }
            ObjectState::Absent => {
                self.warn_remote(path, "archive", "REMOTE_ONLY_COPY", "file-removed-during-archive");
                return Err(LifecycleError::not_found(path));
            }
        }
        if fingerprint(path)? != before {
            if let Err(err) = self.backend.delete(&object.name) {
                self.warn_remote(path, "archive", "ORPHANED_REMOTE_COPY", &err.to_string());
            }
            return Err(LifecycleError::ModifiedDuringArchive {
                path: path.to_path_buf(),
            });
        }

        let record = StubRecord {
            size: before.len,
            modified_epoch_secs: before.modified_epoch_secs(),
            ..StubRecord::for_object(object, &digest)
        };
        stub::write_stub(path, &record)?;
        Ok(ArchiveAction::Archived(record))
    }

    fn warn_remote(&self, path: &Path, operation: &str, code: &str, reason: &str) {
        warn::emit(WarnEvent {
            code,
            operation,
            object: &path.display().to_string(),
            action: "inspect-remote-copy",
            reason,
            err: "",
        });
    }

    /// Canonical path of an object expected to be archived.
    fn resolve_archived(&self, object: &Path) -> LifecycleResult<PathBuf> {
        match canonical_identity(object, &self.limits) {
            Ok(path) => Ok(path),
            Err(LifecycleError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                Err(LifecycleError::NotArchived {
                    path: object.to_path_buf(),
                })
            }
            Err(err) => Err(err),
        }
    }

    fn require_stub(&self, path: &Path) -> LifecycleResult<StubRecord> {
        match classify_state(path)? {
            ObjectState::Archived(record) => Ok(record),
            ObjectState::Live | ObjectState::Absent => Err(LifecycleError::NotArchived {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Copy the archived content of `object` to `destination`. The stub stays.
    pub fn retrieve(&self, object: &Path, destination: &Path) -> LifecycleResult<RetrievedObject> {
        let path = self.resolve_archived(object)?;
        let _lock = self.locks.acquire(&lock_key(&path), &path)?;
        let record = self.require_stub(&path)?;

        let dest = if destination.is_dir() {
            destination.join(file_name_of(&path)?)
        } else {
            destination.to_path_buf()
        };
        if fs::symlink_metadata(&dest).is_ok() {
            return Err(LifecycleError::DestinationExists { path: dest });
        }
        let dest_parent = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let staging = staging_dir(&dest_parent)?;
        let staged = staging.path().join(file_name_of(&dest)?);
        self.backend.retrieve(&record.object, &staged)?;
        verify_restored(&staged, &dest, &record)?;
        stub::restore_attributes(&staged, &record)?;
        place_noclobber(&staged, &dest)?;

        Ok(RetrievedObject {
            path,
            destination: dest,
            sha256: record.sha256,
        })
    }

    /// Bring archived content back over the stub and release the remote copy.
    pub fn recall(&self, object: &Path) -> LifecycleResult<RecalledObject> {
        let path = self.resolve_archived(object)?;
        let _lock = self.locks.acquire(&lock_key(&path), &path)?;
        let record = self.require_stub(&path)?;

        let parent = path.parent().unwrap_or(Path::new("/"));
        let staging = staging_dir(parent)?;
        let staged = staging.path().join(file_name_of(&path)?);
        self.backend.retrieve(&record.object, &staged)?;
        verify_restored(&staged, &path, &record)?;
        stub::restore_attributes(&staged, &record)?;
        stub::restore_over_stub(&staged, &path, &record)?;
        drop(staging);

        if let Err(err) = self.backend.delete(&record.object) {
            warn::emit(WarnEvent {
                code: "ORPHANED_REMOTE_COPY",
                operation: "recall",
                object: &record.object,
                action: "delete-remote-copy",
                reason: "content-restored-remote-delete-failed",
                err: &err.to_string(),
            });
            return Err(err.into());
        }

        Ok(RecalledObject {
            path,
            sha256: record.sha256,
            size: record.size,
        })
    }

    /// Remove the remote copy and then the stub.
    pub fn delete(&self, object: &Path) -> LifecycleResult<DeletedObject> {
        let path = self.resolve_archived(object)?;
        let _lock = self.locks.acquire(&lock_key(&path), &path)?;
        let record = self.require_stub(&path)?;

        self.backend.delete(&record.object)?;
        stub::remove_stub(&path)?;
        Ok(DeletedObject {
            path,
            object: record.object,
        })
    }

    fn per_object<T, F>(&self, objects: &[PathBuf], op: F) -> Vec<ObjectOutcome<T>>
    where
        T: Send,
        F: Fn(&Path) -> LifecycleResult<T> + Sync + Send,
    {
        pool::run_per_object(self.jobs, objects, |object| ObjectOutcome {
            path: object.clone(),
            result: op(object.as_path()),
        })
    }

    pub fn retrieve_all(
        &self,
        objects: &[PathBuf],
        destination: &Path,
    ) -> Vec<ObjectOutcome<RetrievedObject>> {
        self.per_object(objects, |object| self.retrieve(object, destination))
    }

    pub fn recall_all(&self, objects: &[PathBuf]) -> Vec<ObjectOutcome<RecalledObject>> {
        self.per_object(objects, |object| self.recall(object))
    }

    pub fn delete_all(&self, objects: &[PathBuf]) -> Vec<ObjectOutcome<DeletedObject>> {
        self.per_object(objects, |object| self.delete(object))
    }

    /// Reconcile local stubs with the backend catalog.
    ///
    /// With no objects this only checks that the backend answers.
    pub fn list_archived_objects(
        &self,
        objects: &[PathBuf],
        ignore_missing: bool,
    ) -> Result<Vec<ObjectOutcome<ListEntry>>, BackendError> {
        if objects.is_empty() {
            self.backend.query_filespaces()?;
            return Ok(Vec::new());
        }
        Ok(self.per_object(objects, |object| self.list_one(object, ignore_missing)))
    }

    fn list_one(&self, object: &Path, ignore_missing: bool) -> LifecycleResult<ListEntry> {
        let path = match canonical_identity(object, &self.limits) {
            Ok(path) => path,
            Err(LifecycleError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                std::path::absolute(object).map_err(|err| LifecycleError::io(object, err))?
            }
            Err(err) => return Err(err),
        };
        let state = classify_state(&path)?;
        let name = match &state {
            ObjectState::Archived(record) => record.object.clone(),
            ObjectState::Live | ObjectState::Absent => object_name(&path)?,
        };
        let remote_copies = self.backend.query_archive(&name)?;

        let archived = matches!(state, ObjectState::Archived(_));
        match (archived, remote_copies.is_empty()) {
            (true, true) => Err(LifecycleError::Inconsistent {
                path,
                detail: "stub present but the backend holds no copy".to_string(),
            }),
            (false, false) => Err(LifecycleError::Inconsistent {
                path,
                detail: format!(
                    "backend holds {} copy(ies) but there is no stub",
                    remote_copies.len()
                ),
            }),
            (false, true) if !ignore_missing => Err(LifecycleError::NotArchived { path }),
            _ => Ok(ListEntry {
                path,
                state: state.label(),
                remote_copies,
            }),
        }
    }
}
