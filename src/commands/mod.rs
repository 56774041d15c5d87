pub mod archive;
pub mod delete;
pub mod info;
pub mod list;
pub mod recall;
pub mod retrieve;
pub mod status;

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::archive::audit;
use crate::archive::config::{ArchiveConfig, load_config};
use crate::archive::lifecycle::LifecycleManager;
use crate::archive::lock::ObjectLocks;
use crate::archive::paths::{ArchivePaths, resolve_paths};
use crate::archive::warn::{self, WarnEvent};
use crate::dsmc::Dsmc;
use crate::error::LifecycleError;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    pub fn merge(&mut self, mut other: CommandReport) {
        self.ok &= other.ok;
        self.details.append(&mut other.details);
        self.issues.append(&mut other.issues);
    }
}

/// Paths and effective configuration for one invocation.
#[derive(Debug, Clone)]
pub struct Runtime {
    pub paths: ArchivePaths,
    pub config: ArchiveConfig,
}

impl Runtime {
    pub fn load() -> Result<Self> {
        let paths = resolve_paths()?;
        let config = load_config(&paths)?;
        Ok(Self { paths, config })
    }

    /// Lifecycle manager backed by `dsmc`. `jobs` overrides `workers.jobs`.
    pub fn manager(&self, jobs: Option<usize>) -> Result<LifecycleManager<Dsmc>> {
        let dsmc = Dsmc::new(&self.paths.dsmc_bin, self.config.backend.command_timeout_secs)
            .context("dsmc backend unavailable")?;
        let locks = ObjectLocks::new(&self.paths.locks_dir, self.config.locking.clone());
        let jobs = jobs.unwrap_or(self.config.workers.jobs);
        if jobs == 0 {
            anyhow::bail!("--jobs must be >= 1");
        }
        Ok(LifecycleManager::new(dsmc, self.config.limits.clone(), locks).with_jobs(jobs))
    }
}

fn audit(paths: &ArchivePaths, operation: &str, object: &str, status: &str, code: Option<&str>, message: &str) {
    if let Err(err) = audit::append_event(paths, operation, object, status, code, message) {
        warn::emit(WarnEvent {
            code: "AUDIT_WRITE_FAILED",
            operation,
            object,
            action: "continue",
            reason: "audit-log-append-failed",
            err: &format!("{err:#}"),
        });
    }
}

/// Record a per-object success as a report detail and an audit line.
pub fn record_success(
    report: &mut CommandReport,
    paths: &ArchivePaths,
    operation: &str,
    status: &str,
    object: &Path,
    message: String,
) {
    audit(paths, operation, &object.display().to_string(), status, None, &message);
    report.detail(message);
}

/// Error text that always names the object.
pub fn failure_message(object: &Path, err: &LifecycleError) -> String {
    match err {
        LifecycleError::BackendFailure(_) => format!("{}: {err}", object.display()),
        _ => err.to_string(),
    }
}

/// Record a per-object failure as `CODE <path>: <reason>`.
pub fn record_failure(
    report: &mut CommandReport,
    paths: &ArchivePaths,
    operation: &str,
    object: &Path,
    err: &LifecycleError,
) {
    let message = failure_message(object, err);
    audit(
        paths,
        operation,
        &object.display().to_string(),
        "error",
        Some(err.code()),
        &message,
    );
    report.issue(format!("{} {message}", err.code()));
}
