#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Stateful stand-in for `dsmc`: archived copies live as files in
/// `$FAKE_DSMC_STORE`, and `$FAKE_DSMC_CORRUPT` makes retrievals append junk.
const FAKE_DSMC: &str = r#"#!/usr/bin/env bash
store="${FAKE_DSMC_STORE:?FAKE_DSMC_STORE not set}"
mkdir -p "$store"
echo "$*" >> "$store.calls"
key() { printf '%s' "$1" | sed 's#/#%2F#g'; }
banner() {
  echo "IBM Storage Protect"
  echo "Command Line Backup-Archive Client Interface"
  echo "Session established with server FAKE: Linux/x86_64"
  echo
}
no_match() {
  banner
  echo "ANS1092W No files matching search criteria were found"
  exit 8
}

case "$1 $2" in
  "query filespace")
    banner
    echo "  #     Last Incr Date          Type    File Space Name"
    echo "--------------------------------------------------------------------------------"
    echo "  1     00/00/0   00:00:00     EXT4    /"
    exit 0 ;;
  "query systeminfo")
    banner
    echo "Fake dsmc system information"
    exit 0 ;;
  "query archive")
    k="$(key "$3")"
    [ -f "$store/$k" ] || no_match
    size="$(wc -c < "$store/$k" | tr -d ' ')"
    banner
    echo "             Size  Archive Date - Time    File - Expires on - Description"
    echo "             ----  -------------------    -------------------------------"
    echo "          $size  B  01/02/2026 10:00:00    $3 Never Archive Date: 01/02/2026"
    exit 0 ;;
  "delete archive")
    k="$(key "$3")"
    [ -f "$store/$k" ] || no_match
    rm -f "$store/$k"
    exit 0 ;;
esac

case "$1" in
  archive)
    cp "$2" "$store/$(key "$2")" || exit 12
    banner
    echo "Archive function invoked."
    exit 0 ;;
  retrieve)
    k="$(key "$2")"
    [ -f "$store/$k" ] || no_match
    if [ -e "$3" ]; then
      echo "ANS1102E destination already exists: $3" >&2
      exit 12
    fi
    if [ -n "${FAKE_DSMC_CORRUPT:-}" ]; then
      { cat "$store/$k"; printf 'corrupt'; } > "$3"
    else
      cp "$store/$k" "$3"
    fi
    exit 0 ;;
esac

echo "ANS1138E unexpected command: $*" >&2
exit 12
"#;

pub struct Sandbox {
    pub tmp: TempDir,
    pub root: PathBuf,
    pub home: PathBuf,
    pub data: PathBuf,
    pub store: PathBuf,
    pub dsmc: PathBuf,
}

impl Sandbox {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = fs::canonicalize(tmp.path()).expect("canonical tempdir");
        let home = root.join("home");
        let data = root.join("data");
        let store = root.join("store");
        fs::create_dir_all(&home).expect("mkdir home");
        fs::create_dir_all(&data).expect("mkdir data");

        let dsmc = root.join("dsmc");
        fs::write(&dsmc, FAKE_DSMC).expect("write fake dsmc");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&dsmc).expect("metadata").permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&dsmc, perms).expect("chmod");
        }

        Self {
            tmp,
            root,
            home,
            data,
            store,
            dsmc,
        }
    }

    pub fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("archive-tool");
        for (key, _) in std::env::vars() {
            if key.starts_with("ARCHIVE_TOOL_") || key.starts_with("FAKE_DSMC_") {
                cmd.env_remove(key);
            }
        }
        cmd.current_dir(&self.root)
            .env("ARCHIVE_TOOL_HOME", &self.home)
            .env("DSMC_BIN", &self.dsmc)
            .env("FAKE_DSMC_STORE", &self.store)
            .env("ARCHIVE_TOOL_LOCK_RETRIES", "2")
            .env("ARCHIVE_TOOL_LOCK_BACKOFF_MS", "5");
        cmd
    }

    /// Write `len` deterministic bytes under the data dir.
    pub fn file(&self, name: &str, len: usize) -> PathBuf {
        let path = self.data.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir parent");
        }
        let content = (0..len)
            .map(|i| b'a' + (i % 26) as u8)
            .collect::<Vec<_>>();
        fs::write(&path, content).expect("write data file");
        path
    }

    pub fn stored_copies(&self) -> usize {
        fs::read_dir(&self.store)
            .map(|entries| entries.filter_map(Result::ok).count())
            .unwrap_or(0)
    }

    pub fn calls(&self) -> String {
        fs::read_to_string(self.store.with_extension("calls")).unwrap_or_default()
    }
}

pub fn is_stub(path: &Path) -> bool {
    fs::read(path)
        .map(|bytes| bytes.starts_with(b"# archive-tool stub v1\n"))
        .unwrap_or(false)
}
