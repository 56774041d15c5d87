use crate::archive::config::PathLimits;
use crate::error::{LifecycleError, LifecycleResult, ObjectKind, PathLimit};
use std::fs::{self, Metadata};
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Characters the backend expands as patterns when they appear in a filespec.
const RESERVED_CHARS: &[char] = &['*', '?'];

/// A candidate that passed every path constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedObject {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub mode: Option<u32>,
    pub fingerprint: Fingerprint,
}

/// Cheap content fingerprint used to notice writes racing an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub len: u64,
    pub modified: Option<SystemTime>,
}

impl Fingerprint {
    pub fn of(meta: &Metadata) -> Self {
        Self {
            len: meta.len(),
            modified: meta.modified().ok(),
        }
    }

    pub fn modified_epoch_secs(&self) -> Option<u64> {
        self.modified
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
    }
}

pub fn fingerprint(path: &Path) -> LifecycleResult<Fingerprint> {
    let meta = fs::metadata(path).map_err(|err| LifecycleError::io(path, err))?;
    Ok(Fingerprint::of(&meta))
}

/// Object name used for the backend catalog.
pub fn object_name(path: &Path) -> LifecycleResult<String> {
    let Some(name) = path.to_str() else {
        return Err(LifecycleError::PathConstraintViolation {
            path: path.to_path_buf(),
            limit: PathLimit::Encoding,
            actual: 0,
            max: 0,
        });
    };
    Ok(name.to_string())
}

/// Number of directory levels below the root.
pub fn path_depth(path: &Path) -> u64 {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count() as u64
}

fn kind_of(meta: &Metadata) -> ObjectKind {
    let ft = meta.file_type();
    if ft.is_file() {
        return ObjectKind::Regular;
    }
    if ft.is_dir() {
        return ObjectKind::Directory;
    }
    if ft.is_symlink() {
        return ObjectKind::Symlink;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;
        if ft.is_fifo() {
            return ObjectKind::Fifo;
        }
        if ft.is_socket() {
            return ObjectKind::Socket;
        }
        if ft.is_block_device() || ft.is_char_device() {
            return ObjectKind::Device;
        }
    }
    ObjectKind::Other
}

#[cfg(unix)]
fn link_count(meta: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    meta.nlink()
}

#[cfg(not(unix))]
fn link_count(_meta: &Metadata) -> u64 {
    1
}

#[cfg(unix)]
pub fn permission_bits(meta: &Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(meta.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
pub fn permission_bits(_meta: &Metadata) -> Option<u32> {
    None
}

fn check_limit(path: &Path, limit: PathLimit, actual: u64, max: u64) -> LifecycleResult<()> {
    if actual > max {
        return Err(LifecycleError::PathConstraintViolation {
            path: path.to_path_buf(),
            limit,
            actual,
            max,
        });
    }
    Ok(())
}

/// Resolve `path` to its canonical identity, honouring the symlink policy.
pub fn canonical_identity(path: &Path, limits: &PathLimits) -> LifecycleResult<PathBuf> {
    let link_meta = fs::symlink_metadata(path).map_err(|err| LifecycleError::io(path, err))?;
    if link_meta.file_type().is_symlink() && !limits.allow_symlinks {
        return Err(LifecycleError::InvalidObjectKind {
            path: path.to_path_buf(),
            kind: ObjectKind::Symlink,
        });
    }
    fs::canonicalize(path).map_err(|err| LifecycleError::io(path, err))
}

/// Validate a candidate for archiving against `limits`. Performs no writes.
pub fn classify_path(path: &Path, limits: &PathLimits) -> LifecycleResult<ClassifiedObject> {
    let canonical = canonical_identity(path, limits)?;
    let meta = fs::metadata(&canonical).map_err(|err| LifecycleError::io(&canonical, err))?;

    let kind = kind_of(&meta);
    if kind != ObjectKind::Regular {
        return Err(LifecycleError::InvalidObjectKind {
            path: canonical,
            kind,
        });
    }
    if link_count(&meta) > 1 && !limits.allow_hard_links {
        return Err(LifecycleError::InvalidObjectKind {
            path: canonical,
            kind: ObjectKind::HardLink,
        });
    }

    let name = object_name(&canonical)?;
    if let Some(bad) = name
        .chars()
        .find(|c| RESERVED_CHARS.contains(c) || c.is_control())
    {
        return Err(LifecycleError::PathConstraintViolation {
            path: canonical,
            limit: PathLimit::ReservedCharacter,
            actual: u64::from(u32::from(bad)),
            max: 0,
        });
    }

    let file_name_len = canonical
        .file_name()
        .map(|n| n.len() as u64)
        .unwrap_or_default();
    check_limit(
        &canonical,
        PathLimit::FilenameLength,
        file_name_len,
        limits.max_filename_len,
    )?;
    check_limit(
        &canonical,
        PathLimit::PathDepth,
        path_depth(&canonical),
        limits.max_path_depth,
    )?;
    check_limit(
        &canonical,
        PathLimit::PathLength,
        name.len() as u64,
        limits.max_path_len,
    )?;

    let size = meta.len();
    if size < limits.min_file_size {
        return Err(LifecycleError::PathConstraintViolation {
            path: canonical,
            limit: PathLimit::MinimumSize,
            actual: size,
            max: limits.min_file_size,
        });
    }

    Ok(ClassifiedObject {
        path: canonical,
        name,
        size,
        mode: permission_bits(&meta),
        fingerprint: Fingerprint::of(&meta),
    })
}
