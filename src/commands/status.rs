use anyhow::Result;
use std::env;

use crate::archive::audit::audit_log_path;
use crate::commands::{CommandReport, Runtime};
use crate::dsmc::resolve_dsmc_bin;

include!(concat!(env!("OUT_DIR"), "/archive_env_allowlist.rs"));

const ENV_PREFIX: &str = "ARCHIVE_TOOL_";

/// `ARCHIVE_TOOL_*` names present in `vars`, split into known and unknown.
fn partition_env_keys<I>(vars: I) -> (Vec<String>, Vec<String>)
where
    I: IntoIterator<Item = String>,
{
    let mut known = Vec::new();
    let mut unknown = Vec::new();
    for key in vars.into_iter().filter(|k| k.starts_with(ENV_PREFIX)) {
        if GENERATED_ARCHIVE_ENV_ALLOWLIST.contains(&key.as_str()) {
            known.push(key);
        } else {
            unknown.push(key);
        }
    }
    known.sort();
    unknown.sort();
    (known, unknown)
}

pub fn run() -> Result<CommandReport> {
    let runtime = Runtime::load()?;
    let paths = &runtime.paths;
    let limits = &runtime.config.limits;
    let mut report = CommandReport::new("status");

    report.detail(format!("home={}", paths.home.display()));
    report.detail(format!(
        "config_file={} ({})",
        paths.config_file.display(),
        if paths.config_file.exists() { "present" } else { "defaults" }
    ));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));
    report.detail(format!("audit_log={}", audit_log_path(paths).display()));
    report.detail(format!("locks_dir={}", paths.locks_dir.display()));

    report.detail(format!("limits.min_file_size={}", limits.min_file_size));
    report.detail(format!("limits.max_filename_len={}", limits.max_filename_len));
    report.detail(format!("limits.max_path_depth={}", limits.max_path_depth));
    report.detail(format!("limits.max_path_len={}", limits.max_path_len));
    report.detail(format!("limits.allow_symlinks={}", limits.allow_symlinks));
    report.detail(format!("limits.allow_hard_links={}", limits.allow_hard_links));
    report.detail(format!(
        "locking.retries={} locking.backoff_ms={}",
        runtime.config.locking.retries, runtime.config.locking.backoff_ms
    ));
    report.detail(format!("workers.jobs={}", runtime.config.workers.jobs));
    match runtime.config.backend.command_timeout_secs {
        Some(secs) => report.detail(format!("backend.command_timeout_secs={secs}")),
        None => report.detail("backend.command_timeout_secs=unset"),
    }

    match resolve_dsmc_bin(&paths.dsmc_bin) {
        Ok(bin) => report.detail(format!("dsmc_bin={}", bin.display())),
        Err(err) => report.issue(format!("BACKEND_UNAVAILABLE {err}")),
    }

    let (known, unknown) = partition_env_keys(env::vars().map(|(k, _)| k));
    for key in known {
        report.detail(format!("env.{key}=set"));
    }
    for key in unknown {
        report.issue(format!("UNKNOWN_ENV {key} is not read by archive-tool"));
    }

    Ok(report)
}
