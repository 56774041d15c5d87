use crate::archive::paths::ArchivePaths;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Filesystem constraints every archivable object must satisfy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathLimits {
    pub min_file_size: u64,
    pub max_filename_len: u64,
    pub max_path_depth: u64,
    pub max_path_len: u64,
    pub allow_symlinks: bool,
    pub allow_hard_links: bool,
}

impl Default for PathLimits {
    fn default() -> Self {
        Self {
            min_file_size: 1024,
            max_filename_len: 255,
            max_path_depth: 256,
            max_path_len: 4000,
            allow_symlinks: false,
            allow_hard_links: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockingConfig {
    pub retries: u32,
    pub backoff_ms: u64,
}

impl Default for LockingConfig {
    fn default() -> Self {
        Self {
            retries: 20,
            backoff_ms: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    pub jobs: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self { jobs: 1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BackendConfig {
    pub command_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ArchiveConfig {
    pub limits: PathLimits,
    pub locking: LockingConfig,
    pub workers: WorkersConfig,
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialArchiveConfig {
    limits: Option<PathLimits>,
    locking: Option<LockingConfig>,
    workers: Option<WorkersConfig>,
    backend: Option<BackendConfig>,
}

/// Parse into the field's own type; out-of-range values keep `fallback`.
fn parse_or<T: FromStr>(raw: Option<&str>, fallback: T) -> T {
    raw.and_then(|v| v.trim().parse::<T>().ok()).unwrap_or(fallback)
}

fn env_or<T: FromStr>(var: &str, fallback: T) -> T {
    parse_or(env::var(var).ok().as_deref(), fallback)
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => {
            let trimmed = v.trim();
            match trimmed {
                "1" | "true" | "TRUE" | "yes" | "on" => true,
                "0" | "false" | "FALSE" | "no" | "off" => false,
                _ => fallback,
            }
        }
        Err(_) => fallback,
    }
}

fn env_opt_u64(var: &str, fallback: Option<u64>) -> Option<u64> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().parse::<u64>().ok().or(fallback),
        _ => fallback,
    }
}

pub fn validate(cfg: &ArchiveConfig) -> Result<()> {
    let limits = &cfg.limits;
    if limits.min_file_size == 0 {
        return Err(anyhow!("invalid min_file_size: must be >= 1 byte"));
    }
    if limits.max_filename_len == 0 {
        return Err(anyhow!("invalid max_filename_len: must be >= 1"));
    }
    if limits.max_path_depth == 0 {
        return Err(anyhow!("invalid max_path_depth: must be >= 1"));
    }
    if limits.max_path_len < limits.max_filename_len {
        return Err(anyhow!(
            "invalid limits: require max_filename_len <= max_path_len"
        ));
    }
    if cfg.workers.jobs == 0 {
        return Err(anyhow!("invalid workers.jobs: must be >= 1"));
    }
    if cfg.backend.command_timeout_secs == Some(0) {
        return Err(anyhow!(
            "invalid backend.command_timeout_secs: must be >= 1 second when set"
        ));
    }
    Ok(())
}

fn parse_config_file(raw: &str, path: &Path) -> Result<PartialArchiveConfig> {
    toml::from_str(raw)
        .map_err(|err| anyhow!("failed to parse archive-tool config {}: {err}", path.display()))
}

fn merge_file_config(base: &mut ArchiveConfig, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(path)?;
    let parsed = parse_config_file(&raw, path)?;
    if let Some(limits) = parsed.limits {
        base.limits = limits;
    }
    if let Some(locking) = parsed.locking {
        base.locking = locking;
    }
    if let Some(workers) = parsed.workers {
        base.workers = workers;
    }
    if let Some(backend) = parsed.backend {
        base.backend = backend;
    }
    Ok(())
}

fn apply_env_overrides(cfg: &mut ArchiveConfig) {
    let limits = &mut cfg.limits;
    limits.min_file_size = env_or("ARCHIVE_TOOL_MIN_FILE_SIZE", limits.min_file_size);
    limits.max_filename_len = env_or("ARCHIVE_TOOL_MAX_FILENAME_LEN", limits.max_filename_len);
    limits.max_path_depth = env_or("ARCHIVE_TOOL_MAX_PATH_DEPTH", limits.max_path_depth);
    limits.max_path_len = env_or("ARCHIVE_TOOL_MAX_PATH_LEN", limits.max_path_len);
    limits.allow_symlinks = env_or_bool("ARCHIVE_TOOL_ALLOW_SYMLINKS", limits.allow_symlinks);
    limits.allow_hard_links =
        env_or_bool("ARCHIVE_TOOL_ALLOW_HARD_LINKS", limits.allow_hard_links);

    cfg.locking.retries = env_or("ARCHIVE_TOOL_LOCK_RETRIES", cfg.locking.retries);
    cfg.locking.backoff_ms = env_or("ARCHIVE_TOOL_LOCK_BACKOFF_MS", cfg.locking.backoff_ms);
    cfg.workers.jobs = env_or("ARCHIVE_TOOL_JOBS", cfg.workers.jobs);
    cfg.backend.command_timeout_secs = env_opt_u64(
        "ARCHIVE_TOOL_DSMC_TIMEOUT_SECS",
        cfg.backend.command_timeout_secs,
    );
}

pub fn load_config(paths: &ArchivePaths) -> Result<ArchiveConfig> {
    let mut cfg = ArchiveConfig::default();
    merge_file_config(&mut cfg, &paths.config_file)?;
    apply_env_overrides(&mut cfg);
    validate(&cfg)?;
    Ok(cfg)
}
