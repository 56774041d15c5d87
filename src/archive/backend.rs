use serde::Serialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend binary unavailable: {0}")]
    Unavailable(String),
    #[error("failed to run `{command}`: {detail}")]
    Spawn { command: String, detail: String },
    #[error("`{command}` exited with {status}: {diagnostic}")]
    Failed {
        command: String,
        status: String,
        diagnostic: String,
    },
    #[error("could not parse `{command}` output: {detail}")]
    Unparseable { command: String, detail: String },
}

/// One archived copy reported by the backend catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivedCopy {
    pub object: String,
    pub size: Option<String>,
    pub archived_at: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Filespace {
    pub number: u32,
    pub fs_type: String,
    pub name: String,
}

/// The remote archival service, addressed by object name.
///
/// Implementations run one request per call and never retry.
pub trait ArchiveBackend: Send + Sync {
    fn archive(&self, object: &str) -> Result<(), BackendError>;

    /// Copy the archived content of `object` to `destination`, which must not
    /// exist yet.
    fn retrieve(&self, object: &str, destination: &Path) -> Result<(), BackendError>;

    fn delete(&self, object: &str) -> Result<(), BackendError>;

    /// Catalog entries whose name is exactly `object`.
    fn query_archive(&self, object: &str) -> Result<Vec<ArchivedCopy>, BackendError>;

    fn query_filespaces(&self) -> Result<Vec<Filespace>, BackendError>;

    fn query_systeminfo(&self) -> Result<String, BackendError>;
}
