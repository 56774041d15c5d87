//! On-disk stub marker that stands in for an archived file.
//!
//! A stub is a small TOML document whose first line is [`STUB_MAGIC`]. It
//! records the backend identity and the content digest taken at archive time.
//! Every write and every restore goes through a temporary file in the target's
//! own directory followed by a rename, so readers see either the old entry or
//! the new one and never a partial file.

use crate::archive::classify::ClassifiedObject;
use crate::error::{LifecycleError, LifecycleResult};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};

pub const STUB_MAGIC: &str = "# archive-tool stub v1";

/// Anything larger than this is ordinary content.
pub const MAX_STUB_BYTES: u64 = 16 * 1024;

pub const TEMP_PREFIX: &str = ".archive-tool-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StubRecord {
    pub object: String,
    pub size: u64,
    pub sha256: String,
    pub archived_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_epoch_secs: Option<u64>,
}

impl StubRecord {
    pub fn for_object(object: &ClassifiedObject, sha256: &str) -> Self {
        Self {
            object: object.name.clone(),
            size: object.size,
            sha256: sha256.to_string(),
            archived_at: chrono::Utc::now().to_rfc3339(),
            mode: object.mode,
            modified_epoch_secs: object.fingerprint.modified_epoch_secs(),
        }
    }
}

pub fn encode(record: &StubRecord) -> LifecycleResult<String> {
    let body = toml::to_string(record).map_err(|err| LifecycleError::CorruptStub {
        path: record.object.clone().into(),
        detail: format!("failed to encode stub: {err}"),
    })?;
    let mut out = format!("{STUB_MAGIC}\n{body}");
    if out.len() as u64 == record.size {
        out.push('\n');
    }
    Ok(out)
}

fn looks_like_stub(bytes: &[u8]) -> bool {
    let magic = STUB_MAGIC.as_bytes();
    bytes.starts_with(magic) && matches!(bytes.get(magic.len()), Some(b'\n') | Some(b'\r'))
}

pub fn decode(path: &Path, bytes: &[u8]) -> LifecycleResult<Option<StubRecord>> {
    if !looks_like_stub(bytes) {
        return Ok(None);
    }
    let corrupt = |detail: String| LifecycleError::CorruptStub {
        path: path.to_path_buf(),
        detail,
    };

    let text = std::str::from_utf8(bytes).map_err(|err| corrupt(err.to_string()))?;
    let record: StubRecord = toml::from_str(text).map_err(|err| corrupt(err.to_string()))?;
    if record.object.trim().is_empty() {
        return Err(corrupt("empty object identity".to_string()));
    }
    if record.sha256.len() != 64 || !record.sha256.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(corrupt(format!("malformed sha256 `{}`", record.sha256)));
    }
    Ok(Some(record))
}

/// Returns `Ok(None)` when `path` holds ordinary content.
pub fn read_stub(path: &Path) -> LifecycleResult<Option<StubRecord>> {
    let meta = fs::metadata(path).map_err(|err| LifecycleError::io(path, err))?;
    if !meta.is_file() || meta.len() > MAX_STUB_BYTES {
        return Ok(None);
    }
    let file = File::open(path).map_err(|err| LifecycleError::io(path, err))?;

    let mut bytes = Vec::with_capacity(meta.len() as usize);
    file.take(MAX_STUB_BYTES + 1)
        .read_to_end(&mut bytes)
        .map_err(|err| LifecycleError::io(path, err))?;
    if bytes.len() as u64 > MAX_STUB_BYTES {
        return Ok(None);
    }
    decode(path, &bytes)
}

fn parent_dir(path: &Path) -> LifecycleResult<&Path> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(parent),
        _ => Err(LifecycleError::io(
            path,
            std::io::Error::new(ErrorKind::InvalidInput, "path has no parent directory"),
        )),
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

#[cfg(unix)]
fn set_stub_mode(file: &File, mode: Option<u32>) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let Some(mode) = mode else {
        return Ok(());
    };
    file.set_permissions(fs::Permissions::from_mode((mode & 0o666) | 0o600))
}

#[cfg(not(unix))]
fn set_stub_mode(_file: &File, _mode: Option<u32>) -> std::io::Result<()> {
    Ok(())
}

/// Atomically replace whatever is at `path` with a stub for `record`.
///
/// Callers must hold the object lock and have re-checked the current state.
pub fn write_stub(path: &Path, record: &StubRecord) -> LifecycleResult<()> {
    let parent = parent_dir(path)?;
    let encoded = encode(record)?;
    let io_err = |err| LifecycleError::io(path, err);

    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(".stub")
        .tempfile_in(parent)
        .map_err(io_err)?;
    tmp.write_all(encoded.as_bytes()).map_err(io_err)?;
    set_stub_mode(tmp.as_file(), record.mode).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|err| io_err(err.error))?;
    sync_dir(parent);
    Ok(())
}

/// Remove the stub at `path`, returning the record it held.
pub fn remove_stub(path: &Path) -> LifecycleResult<StubRecord> {
    let Some(record) = read_stub(path)? else {
        return Err(LifecycleError::NotArchived {
            path: path.to_path_buf(),
        });
    };
    fs::remove_file(path).map_err(|err| LifecycleError::io(path, err))?;
    if let Some(parent) = path.parent() {
        sync_dir(parent);
    }
    Ok(record)
}

/// Reapply the permission bits and mtime recorded in the stub.
pub fn restore_attributes(path: &Path, record: &StubRecord) -> LifecycleResult<()> {
    let io_err = |err| LifecycleError::io(path, err);
    let file = File::open(path).map_err(io_err)?;
    if let Some(secs) = record.modified_epoch_secs {
        file.set_modified(UNIX_EPOCH + Duration::from_secs(secs))
            .map_err(io_err)?;
    }
    #[cfg(unix)]
    if let Some(mode) = record.mode {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(mode))
            .map_err(io_err)?;
    }
    file.sync_all().map_err(io_err)?;
    Ok(())
}

/// Rename `staged` over the stub at `path` once the stub is confirmed to be
/// the one the caller recalled.
pub fn restore_over_stub(staged: &Path, path: &Path, expected: &StubRecord) -> LifecycleResult<()> {
    match read_stub(path)? {
        Some(current) if current == *expected => {}
        Some(_) => {
            return Err(LifecycleError::Inconsistent {
                path: path.to_path_buf(),
                detail: "stub was replaced during recall".to_string(),
            });
        }
        None => {
            return Err(LifecycleError::NotArchived {
                path: path.to_path_buf(),
            });
        }
    }
    fs::rename(staged, path).map_err(|err| LifecycleError::io(path, err))?;
    if let Some(parent) = path.parent() {
        sync_dir(parent);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(object: &str, size: u64) -> StubRecord {
        StubRecord {
            object: object.to_string(),
            size,
            sha256: "a".repeat(64),
            archived_at: "2026-01-01T00:00:00+00:00".to_string(),
            mode: Some(0o640),
            modified_epoch_secs: Some(1_700_000_000),
        }
    }

    fn temp_leftovers(dir: &Path) -> usize {
        fs::read_dir(dir)
            .expect("read dir")
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(TEMP_PREFIX))
            .count()
    }

    #[test]
    fn write_then_read_returns_same_record() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("data.bin");
        fs::write(&path, vec![7u8; 4096]).expect("write original");
        let want = record(&path.display().to_string(), 4096);

        write_stub(&path, &want).expect("write stub");

        let got = read_stub(&path).expect("read").expect("is a stub");
        assert_eq!(got, want);
        let raw = fs::read_to_string(&path).expect("read raw");
        assert!(raw.starts_with(STUB_MAGIC));
        assert_eq!(temp_leftovers(tmp.path()), 0);
    }

    #[test]
    fn ordinary_content_is_not_a_stub() {
        let tmp = tempdir().expect("tempdir");
        let small = tmp.path().join("small");
        fs::write(&small, b"hello").expect("write");
        assert_eq!(read_stub(&small).expect("read"), None);

        let empty = tmp.path().join("empty");
        fs::write(&empty, b"").expect("write");
        assert_eq!(read_stub(&empty).expect("read"), None);

        let near_miss = tmp.path().join("near");
        fs::write(&near_miss, format!("{STUB_MAGIC}0\nobject = 'x'\n")).expect("write");
        assert_eq!(read_stub(&near_miss).expect("read"), None);
    }

    #[test]
    fn large_files_are_never_stubs() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("big");
        let mut content = format!("{STUB_MAGIC}\n").into_bytes();
        content.resize((MAX_STUB_BYTES + 1) as usize, b' ');
        fs::write(&path, content).expect("write");
        assert_eq!(read_stub(&path).expect("read"), None);
    }

    #[test]
    fn marker_with_garbage_body_is_corrupt() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("broken");
        fs::write(&path, format!("{STUB_MAGIC}\nobject = \n")).expect("write");
        let err = read_stub(&path).unwrap_err();
        assert_eq!(err.code(), "CORRUPT_STUB");

        let mut bad_digest = record("/data/x", 10);
        bad_digest.sha256 = "zz".to_string();
        let encoded = encode(&bad_digest).expect("encode");
        fs::write(&path, encoded).expect("write");
        assert_eq!(read_stub(&path).unwrap_err().code(), "CORRUPT_STUB");
    }

    #[test]
    fn stub_size_never_equals_original_size() {
        let natural = |size: u64| {
            let body = toml::to_string(&record("/data/x", size)).expect("toml");
            format!("{STUB_MAGIC}\n{body}").len() as u64
        };
        let mut natural_len = 0;
        while natural(natural_len) != natural_len {
            natural_len = natural(natural_len);
        }

        let same = record("/data/x", natural_len);
        let encoded = encode(&same).expect("encode");
        assert_ne!(encoded.len() as u64, natural_len);
        let decoded = decode(Path::new("/data/x"), encoded.as_bytes())
            .expect("decode")
            .expect("stub");
        assert_eq!(decoded, same);
    }

    #[test]
    fn remove_stub_refuses_live_files() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("live");
        fs::write(&path, vec![1u8; 2048]).expect("write");

        let err = remove_stub(&path).unwrap_err();
        assert_eq!(err.code(), "NOT_ARCHIVED");
        assert!(path.exists());
    }

    #[test]
    fn restore_over_stub_swaps_content_and_attributes() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("doc.txt");
        let rec = record(&path.display().to_string(), 6);
        write_stub(&path, &rec).expect("stub");

        let staged = tmp.path().join("staged");
        fs::write(&staged, b"again!").expect("staged");
        restore_attributes(&staged, &rec).expect("attrs");
        restore_over_stub(&staged, &path, &rec).expect("restore");

        assert_eq!(fs::read(&path).expect("read"), b"again!");
        assert!(!staged.exists());
        let modified = fs::metadata(&path)
            .expect("meta")
            .modified()
            .expect("mtime")
            .duration_since(UNIX_EPOCH)
            .expect("epoch")
            .as_secs();
        assert_eq!(modified, 1_700_000_000);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).expect("meta").permissions().mode() & 0o7777;
            assert_eq!(mode, 0o640);
        }
    }

    #[test]
    fn restore_over_stub_refuses_a_different_stub() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("doc.txt");
        let rec = record(&path.display().to_string(), 6);
        write_stub(&path, &rec).expect("stub");

        let mut other = rec.clone();
        other.sha256 = "b".repeat(64);
        let staged = tmp.path().join("staged");
        fs::write(&staged, b"again!").expect("staged");

        let err = restore_over_stub(&staged, &path, &other).unwrap_err();
        assert_eq!(err.code(), "INCONSISTENT");
        assert_eq!(read_stub(&path).expect("read"), Some(rec));
    }
}
