use crate::archive::backend::BackendError;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Which configured path constraint an object violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathLimit {
    MinimumSize,
    FilenameLength,
    PathDepth,
    PathLength,
    Encoding,
    ReservedCharacter,
}

impl PathLimit {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MinimumSize => "min_file_size",
            Self::FilenameLength => "max_filename_len",
            Self::PathDepth => "max_path_depth",
            Self::PathLength => "max_path_len",
            Self::Encoding => "utf8_name",
            Self::ReservedCharacter => "reserved_character",
        }
    }
}

impl fmt::Display for PathLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Regular,
    Directory,
    Symlink,
    HardLink,
    Fifo,
    Socket,
    Device,
    Other,
}

impl ObjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "regular file",
            Self::Directory => "directory",
            Self::Symlink => "symlink",
            Self::HardLink => "hard link",
            Self::Fifo => "fifo",
            Self::Socket => "socket",
            Self::Device => "device",
            Self::Other => "unknown file type",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the evidence of a previous archive was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchivedEvidence {
    LocalStub,
    RemoteCopy,
}

impl fmt::Display for ArchivedEvidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalStub => f.write_str("stub present at path"),
            Self::RemoteCopy => f.write_str("backend already holds a copy"),
        }
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{path}: {limit} exceeded (actual {actual}, limit {max})")]
    PathConstraintViolation {
        path: PathBuf,
        limit: PathLimit,
        actual: u64,
        max: u64,
    },
    #[error("{path}: unsupported object kind ({kind})")]
    InvalidObjectKind { path: PathBuf, kind: ObjectKind },
    #[error("{path}: already archived ({evidence})")]
    AlreadyArchived {
        path: PathBuf,
        evidence: ArchivedEvidence,
    },
    #[error("{path}: not archived")]
    NotArchived { path: PathBuf },
    #[error("{path}: checksum mismatch (expected {expected}, got {actual})")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
    #[error("backend failure: {0}")]
    BackendFailure(#[from] BackendError),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path}: stub marker present but unreadable: {detail}")]
    CorruptStub { path: PathBuf, detail: String },
    #[error("{path}: inconsistent archive state: {detail}")]
    Inconsistent { path: PathBuf, detail: String },
    #[error("{path}: object is locked by another operation")]
    ObjectLocked { path: PathBuf },
    #[error("{path}: destination already exists")]
    DestinationExists { path: PathBuf },
    #[error("{path}: file changed while it was being archived")]
    ModifiedDuringArchive { path: PathBuf },
}

impl LifecycleError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::io(path, io::Error::from(io::ErrorKind::NotFound))
    }

    /// Path the error is about, when it names one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::PathConstraintViolation { path, .. }
            | Self::InvalidObjectKind { path, .. }
            | Self::AlreadyArchived { path, .. }
            | Self::NotArchived { path }
            | Self::ChecksumMismatch { path, .. }
            | Self::Io { path, .. }
            | Self::CorruptStub { path, .. }
            | Self::Inconsistent { path, .. }
            | Self::ObjectLocked { path }
            | Self::DestinationExists { path }
            | Self::ModifiedDuringArchive { path } => Some(path),
            Self::BackendFailure(_) => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::PathConstraintViolation { .. } => "PATH_CONSTRAINT_VIOLATION",
            Self::InvalidObjectKind { .. } => "INVALID_OBJECT_KIND",
            Self::AlreadyArchived { .. } => "ALREADY_ARCHIVED",
            Self::NotArchived { .. } => "NOT_ARCHIVED",
            Self::ChecksumMismatch { .. } => "CHECKSUM_MISMATCH",
            Self::BackendFailure(_) => "BACKEND_FAILURE",
            Self::Io { .. } => "IO_ERROR",
            Self::CorruptStub { .. } => "CORRUPT_STUB",
            Self::Inconsistent { .. } => "INCONSISTENT",
            Self::ObjectLocked { .. } => "OBJECT_LOCKED",
            Self::DestinationExists { .. } => "DESTINATION_EXISTS",
            Self::ModifiedDuringArchive { .. } => "MODIFIED_DURING_ARCHIVE",
        }
    }
}
