use anyhow::Result;

use crate::archive::backend::ArchiveBackend;
use crate::commands::{CommandReport, Runtime};

pub fn run() -> Result<CommandReport> {
    let runtime = Runtime::load()?;
    let manager = runtime.manager(None)?;
    let backend = manager.backend();
    let mut report = CommandReport::new("info");

    report.detail(format!("archive_tool_version={}", env!("CARGO_PKG_VERSION")));
    report.detail(format!("dsmc_bin={}", backend.bin().display()));

    match backend.query_systeminfo() {
        Ok(text) => {
            for line in text.lines().filter(|l| !l.trim().is_empty()) {
                report.detail(format!("systeminfo: {}", line.trim_end()));
            }
        }
        Err(err) => report.issue(format!("BACKEND_FAILURE {err}")),
    }

    let mut filespaces = CommandReport::new("info");
    match backend.query_filespaces() {
        Ok(list) if list.is_empty() => filespaces.detail("filespaces=none"),
        Ok(list) => {
            for fs in list {
                filespaces.detail(format!(
                    "filespace number={} type={} name={}",
                    fs.number, fs.fs_type, fs.name
                ));
            }
        }
        Err(err) => filespaces.issue(format!("BACKEND_FAILURE {err}")),
    }
    report.merge(filespaces);

    Ok(report)
}
