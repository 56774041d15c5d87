use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::commands::{CommandReport, Runtime, record_failure, record_success};

pub fn run(paths: &[PathBuf], destination: &Path, jobs: Option<usize>) -> Result<CommandReport> {
    let runtime = Runtime::load()?;
    let mut report = CommandReport::new("retrieve");

    if paths.len() > 1 && !destination.is_dir() {
        report.issue(format!(
            "DESTINATION_NOT_DIRECTORY {}: several objects need an existing directory",
            destination.display()
        ));
        return Ok(report);
    }

    let manager = runtime.manager(jobs)?;
    for outcome in manager.retrieve_all(paths, destination) {
        match outcome.result {
            Ok(retrieved) => record_success(
                &mut report,
                &runtime.paths,
                "retrieve",
                "ok",
                &retrieved.path,
                format!(
                    "retrieved {} -> {} sha256={}",
                    retrieved.path.display(),
                    retrieved.destination.display(),
                    retrieved.sha256
                ),
            ),
            Err(err) => record_failure(&mut report, &runtime.paths, "retrieve", &outcome.path, &err),
        }
    }

    Ok(report)
}
