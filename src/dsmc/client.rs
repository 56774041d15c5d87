use crate::archive::backend::{ArchiveBackend, ArchivedCopy, BackendError, Filespace};
use crate::archive::util::{run_command_with_optional_timeout, truncate_with_ellipsis};
use crate::dsmc::report::{self, Parsed};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

const DIAGNOSTIC_MAX_CHARS: usize = 600;

/// `dsmc` command line client. One subprocess per call.
#[derive(Debug, Clone)]
pub struct Dsmc {
    bin: PathBuf,
    timeout_secs: Option<u64>,
}

#[derive(Debug)]
struct Run {
    command: String,
    success: bool,
    status: String,
    stdout: String,
    stderr: String,
}

impl Run {
    fn diagnostic(&self) -> String {
        let text = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        truncate_with_ellipsis(text, DIAGNOSTIC_MAX_CHARS)
    }

    fn into_failure(self) -> BackendError {
        BackendError::Failed {
            diagnostic: self.diagnostic(),
            command: self.command,
            status: self.status,
        }
    }

    fn unparseable(&self) -> BackendError {
        BackendError::Unparseable {
            command: self.command.clone(),
            detail: format!("no report table in output: {}", self.diagnostic()),
        }
    }
}

pub fn resolve_dsmc_bin(configured: &Path) -> Result<PathBuf, BackendError> {
    if configured.exists() {
        return Ok(configured.to_path_buf());
    }
    which::which(configured).map_err(|_| {
        BackendError::Unavailable(format!(
            "`{}` not found; set DSMC_BIN or put dsmc on PATH",
            configured.display()
        ))
    })
}

impl Dsmc {
    pub fn new(configured: &Path, timeout_secs: Option<u64>) -> Result<Self, BackendError> {
        Ok(Self {
            bin: resolve_dsmc_bin(configured)?,
            timeout_secs,
        })
    }

    pub fn bin(&self) -> &Path {
        &self.bin
    }

    fn run(&self, args: &[&OsStr]) -> Result<Run, BackendError> {
        let command = std::iter::once(self.bin.as_os_str())
            .chain(args.iter().copied())
            .map(|part| part.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ");

        let mut cmd = Command::new(&self.bin);
        cmd.args(args);
        let output = run_command_with_optional_timeout(&mut cmd, self.timeout_secs).map_err(
            |err| BackendError::Spawn {
                command: command.clone(),
                detail: err.to_string(),
            },
        )?;

        Ok(Run {
            command,
            success: output.status.success(),
            status: output.status.to_string(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    fn run_checked(&self, args: &[&OsStr]) -> Result<Run, BackendError> {
        let run = self.run(args)?;
        if run.success {
            Ok(run)
        } else {
            Err(run.into_failure())
        }
    }

    /// Interpret a query: explicit "empty" wins over the exit status.
    fn query<T>(&self, run: Run, parsed: Parsed<T>) -> Result<Vec<T>, BackendError> {
        match parsed {
            Parsed::Empty => Ok(Vec::new()),
            Parsed::Rows(rows) if run.success => Ok(rows),
            Parsed::Unrecognised if run.success => Err(run.unparseable()),
            Parsed::Rows(_) | Parsed::Unrecognised => Err(run.into_failure()),
        }
    }
}

impl ArchiveBackend for Dsmc {
    fn archive(&self, object: &str) -> Result<(), BackendError> {
        self.run_checked(&[OsStr::new("archive"), OsStr::new(object)])?;
        Ok(())
    }

    fn retrieve(&self, object: &str, destination: &Path) -> Result<(), BackendError> {
        self.run_checked(&[OsStr::new("retrieve"), OsStr::new(object), destination.as_os_str()])?;
        Ok(())
    }

    fn delete(&self, object: &str) -> Result<(), BackendError> {
        self.run_checked(&[
            OsStr::new("delete"),
            OsStr::new("archive"),
            OsStr::new(object),
            OsStr::new("-noprompt"),
        ])?;
        Ok(())
    }

    fn query_archive(&self, object: &str) -> Result<Vec<ArchivedCopy>, BackendError> {
        let run = self.run(&[OsStr::new("query"), OsStr::new("archive"), OsStr::new(object)])?;
        let parsed = report::parse_archive_copies(&run.stdout, &run.stderr, object);
        self.query(run, parsed)
    }

    fn query_filespaces(&self) -> Result<Vec<Filespace>, BackendError> {
        let run = self.run(&[OsStr::new("query"), OsStr::new("filespace")])?;
        let parsed = report::parse_filespaces(&run.stdout, &run.stderr);
        self.query(run, parsed)
    }

    fn query_systeminfo(&self) -> Result<String, BackendError> {
        let run = self.run_checked(&[OsStr::new("query"), OsStr::new("systeminfo")])?;
        Ok(run.stdout.trim().to_string())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    fn script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("dsmc");
        fs::write(&path, format!("#!/usr/bin/env bash\n{body}\n")).expect("write script");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
        path
    }

    #[test]
    fn missing_binary_is_unavailable() {
        let err = Dsmc::new(Path::new("/nonexistent/dsmc-for-tests"), None).unwrap_err();
        assert!(matches!(err, BackendError::Unavailable(_)));
    }

    #[test]
    fn non_zero_exit_carries_the_diagnostic() {
        let tmp = tempdir().expect("tempdir");
        let bin = script(tmp.path(), "echo 'ANS1071E Invalid domain name entered' >&2\nexit 12");
        let dsmc = Dsmc::new(&bin, None).expect("dsmc");

        match dsmc.archive("/data/a").unwrap_err() {
            BackendError::Failed {
                command,
                diagnostic,
                ..
            } => {
                assert!(command.ends_with("archive /data/a"));
                assert!(diagnostic.contains("ANS1071E"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn no_match_warning_is_empty_even_with_exit_eight() {
        let tmp = tempdir().expect("tempdir");
        let bin = script(
            tmp.path(),
            "echo 'ANS1092W No files matching search criteria were found'\nexit 8",
        );
        let dsmc = Dsmc::new(&bin, None).expect("dsmc");
        assert!(dsmc.query_archive("/data/a").expect("query").is_empty());
    }

    #[test]
    fn success_without_a_table_is_unparseable() {
        let tmp = tempdir().expect("tempdir");
        let bin = script(tmp.path(), "echo 'Session established'");
        let dsmc = Dsmc::new(&bin, None).expect("dsmc");
        assert!(matches!(
            dsmc.query_filespaces().unwrap_err(),
            BackendError::Unparseable { .. }
        ));
    }

    #[test]
    fn arguments_reach_the_binary_verbatim() {
        let tmp = tempdir().expect("tempdir");
        let log = tmp.path().join("args.log");
        let bin = script(
            tmp.path(),
            &format!("printf '%s|' \"$@\" >> '{}'\necho", log.display()),
        );
        let dsmc = Dsmc::new(&bin, None).expect("dsmc");

        dsmc.delete("/data/with space").expect("delete");
        dsmc.retrieve("/data/a", Path::new("/tmp/out")).expect("retrieve");
        let logged = fs::read_to_string(&log).expect("log");
        assert_eq!(
            logged,
            "delete|archive|/data/with space|-noprompt|retrieve|/data/a|/tmp/out|"
        );
    }

    #[test]
    fn slow_commands_time_out() {
        let tmp = tempdir().expect("tempdir");
        let bin = script(tmp.path(), "sleep 5");
        let dsmc = Dsmc::new(&bin, Some(1)).expect("dsmc");
        assert!(matches!(
            dsmc.query_systeminfo().unwrap_err(),
            BackendError::Spawn { .. }
        ));
    }
}
