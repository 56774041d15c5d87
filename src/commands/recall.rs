use anyhow::Result;
use std::path::PathBuf;

use crate::commands::{CommandReport, Runtime, record_failure, record_success};

pub fn run(paths: &[PathBuf], jobs: Option<usize>) -> Result<CommandReport> {
    let runtime = Runtime::load()?;
    let manager = runtime.manager(jobs)?;
    let mut report = CommandReport::new("recall");

    for outcome in manager.recall_all(paths) {
        match outcome.result {
            Ok(recalled) => record_success(
                &mut report,
                &runtime.paths,
                "recall",
                "ok",
                &recalled.path,
                format!(
                    "recalled {} size={} sha256={}",
                    recalled.path.display(),
                    recalled.size,
                    recalled.sha256
                ),
            ),
            Err(err) => record_failure(&mut report, &runtime.paths, "recall", &outcome.path, &err),
        }
    }

    Ok(report)
}
