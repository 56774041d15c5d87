use anyhow::Result;
use std::path::PathBuf;

use crate::archive::lifecycle::ListEntry;
use crate::commands::{CommandReport, Runtime, failure_message};

fn describe(entry: &ListEntry) -> String {
    let mut line = format!(
        "{} state={} remote_copies={}",
        entry.path.display(),
        entry.state.as_str(),
        entry.remote_copies.len()
    );
    if let Some(at) = entry.remote_copies.first().and_then(|c| c.archived_at.as_deref()) {
        line.push_str(&format!(" archived_at=\"{at}\""));
    }
    line
}

pub fn run(paths: &[PathBuf], ignore_missing: bool) -> Result<CommandReport> {
    let runtime = Runtime::load()?;
    let manager = runtime.manager(None)?;
    let mut report = CommandReport::new("list");

    let outcomes = match manager.list_archived_objects(paths, ignore_missing) {
        Ok(outcomes) => outcomes,
        Err(err) => {
            report.issue(format!("BACKEND_FAILURE {err}"));
            return Ok(report);
        }
    };
    if paths.is_empty() {
        report.detail("backend reachable; no objects requested");
    }

    for outcome in outcomes {
        match outcome.result {
            Ok(entry) => report.detail(describe(&entry)),
            Err(err) => report.issue(format!(
                "{} {}",
                err.code(),
                failure_message(&outcome.path, &err)
            )),
        }
    }

    Ok(report)
}
