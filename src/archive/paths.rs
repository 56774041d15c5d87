use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ArchivePaths {
    pub home: PathBuf,
    pub config_file: PathBuf,
    pub logs_dir: PathBuf,
    pub locks_dir: PathBuf,
    pub dsmc_bin: PathBuf,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<ArchivePaths> {
    let home = match env::var("ARCHIVE_TOOL_HOME") {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => required_home_dir()?.join(".archive-tool"),
    };

    let config_file = env_or_default_path("ARCHIVE_TOOL_CONFIG_PATH", home.join("config.toml"));
    let logs_dir = env_or_default_path("ARCHIVE_TOOL_LOGS_DIR", home.join("logs"));
    let locks_dir = env_or_default_path("ARCHIVE_TOOL_LOCKS_DIR", home.join("locks"));
    let dsmc_bin = env_or_default_path("DSMC_BIN", PathBuf::from("dsmc"));

    Ok(ArchivePaths {
        home,
        config_file,
        logs_dir,
        locks_dir,
        dsmc_bin,
    })
}
