use anyhow::Result;
use std::path::PathBuf;

use crate::commands::{CommandReport, Runtime, record_failure, record_success};

pub fn run(paths: &[PathBuf], jobs: Option<usize>) -> Result<CommandReport> {
    let runtime = Runtime::load()?;
    let manager = runtime.manager(jobs)?;
    let mut report = CommandReport::new("delete");

    for outcome in manager.delete_all(paths) {
        match outcome.result {
            Ok(deleted) => record_success(
                &mut report,
                &runtime.paths,
                "delete",
                "ok",
                &deleted.path,
                format!("deleted {} (remote {})", deleted.path.display(), deleted.object),
            ),
            Err(err) => record_failure(&mut report, &runtime.paths, "delete", &outcome.path, &err),
        }
    }

    Ok(report)
}
