use crate::archive::stub::{StubRecord, read_stub};
use crate::error::{LifecycleError, LifecycleResult};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::Path;

/// Lifecycle state of a path, derived from what is on disk right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectState {
    Live,
    Archived(StubRecord),
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StateLabel {
    Live,
    Archived,
    Absent,
}

impl StateLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Archived => "archived",
            Self::Absent => "absent",
        }
    }
}

impl ObjectState {
    pub fn label(&self) -> StateLabel {
        match self {
            Self::Live => StateLabel::Live,
            Self::Archived(_) => StateLabel::Archived,
            Self::Absent => StateLabel::Absent,
        }
    }
}

/// Inspect `path` and report its lifecycle state. Never cached.
pub fn classify_state(path: &Path) -> LifecycleResult<ObjectState> {
    match read_stub(path) {
        Ok(Some(record)) => Ok(ObjectState::Archived(record)),
        Ok(None) => Ok(ObjectState::Live),
        Err(LifecycleError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
            Ok(ObjectState::Absent)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::stub::write_stub;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn state_follows_the_filesystem() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("obj");
        assert_eq!(classify_state(&path).expect("absent"), ObjectState::Absent);

        fs::write(&path, vec![0u8; 2048]).expect("write");
        assert_eq!(classify_state(&path).expect("live"), ObjectState::Live);

        let record = StubRecord {
            object: path.display().to_string(),
            size: 2048,
            sha256: "c".repeat(64),
            archived_at: "2026-01-01T00:00:00+00:00".to_string(),
            mode: None,
            modified_epoch_secs: None,
        };
        write_stub(&path, &record).expect("stub");
        assert_eq!(
            classify_state(&path).expect("archived"),
            ObjectState::Archived(record)
        );
    }

    #[test]
    fn directories_are_live() {
        let tmp = tempdir().expect("tempdir");
        assert_eq!(classify_state(tmp.path()).expect("dir"), ObjectState::Live);
    }
}
