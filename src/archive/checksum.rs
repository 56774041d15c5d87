use crate::error::{LifecycleError, LifecycleResult};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

const CHUNK_SIZE: usize = 64 * 1024;

/// Stream `path` through SHA-256 and return the lowercase hex digest.
pub fn compute_digest(path: &Path) -> LifecycleResult<String> {
    let mut file = File::open(path).map_err(|err| LifecycleError::io(path, err))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let read = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(LifecycleError::io(path, err)),
        };
        hasher.update(&buf[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// A mismatch is an error naming both digests.
pub fn ensure_matches(path: &Path, expected: &str) -> LifecycleResult<()> {
    let actual = compute_digest(path)?;
    if actual.eq_ignore_ascii_case(expected) {
        return Ok(());
    }
    Err(LifecycleError::ChecksumMismatch {
        path: path.to_path_buf(),
        expected: expected.to_string(),
        actual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn digest_matches_known_vector() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("abc");
        fs::write(&path, b"abc").expect("write");
        assert_eq!(
            compute_digest(&path).expect("digest"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn digest_spans_multiple_chunks() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("big");
        let data = (0..(CHUNK_SIZE * 3 + 17))
            .map(|i| (i % 251) as u8)
            .collect::<Vec<_>>();
        fs::write(&path, &data).expect("write");

        let want = format!("{:x}", Sha256::digest(&data));
        assert_eq!(compute_digest(&path).expect("digest"), want);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let tmp = tempdir().expect("tempdir");
        let err = compute_digest(&tmp.path().join("gone")).unwrap_err();
        assert_eq!(err.code(), "IO_ERROR");
    }

    #[test]
    fn mismatch_is_loud() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("f");
        fs::write(&path, b"payload").expect("write");
        let good = compute_digest(&path).expect("digest");

        ensure_matches(&path, &good).expect("same content");
        ensure_matches(&path, &good.to_uppercase()).expect("case-insensitive");

        let err = ensure_matches(&path, &"0".repeat(64)).unwrap_err();
        assert_eq!(err.code(), "CHECKSUM_MISMATCH");
    }
}
