use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::archive::lifecycle::{ArchiveAction, ArchiveRequest};
use crate::commands::{CommandReport, Runtime, record_failure, record_success};

pub fn run(paths: &[PathBuf], request: ArchiveRequest, jobs: Option<usize>) -> Result<CommandReport> {
    let runtime = Runtime::load()?;
    let manager = runtime.manager(jobs)?;
    let mut report = CommandReport::new(if request.dry_run {
        "archive --dry-run"
    } else {
        "archive"
    });

    let outcomes = match manager.archive(paths, &request) {
        Ok(outcomes) => outcomes,
        Err(err) => {
            let object = err.path().unwrap_or(Path::new("-")).to_path_buf();
            record_failure(&mut report, &runtime.paths, "archive", &object, &err);
            report.detail("batch rejected during validation; nothing was archived");
            return Ok(report);
        }
    };

    let mut archived = 0usize;
    for outcome in outcomes {
        match outcome.result {
            Ok(ArchiveAction::Archived(record)) => {
                archived += 1;
                record_success(
                    &mut report,
                    &runtime.paths,
                    "archive",
                    "ok",
                    &outcome.path,
                    format!(
                        "archived {} size={} sha256={}",
                        outcome.path.display(),
                        record.size,
                        record.sha256
                    ),
                );
            }
            Ok(ArchiveAction::Planned { size }) => record_success(
                &mut report,
                &runtime.paths,
                "archive",
                "planned",
                &outcome.path,
                format!("would archive {} size={size}", outcome.path.display()),
            ),
            Err(err) => record_failure(&mut report, &runtime.paths, "archive", &outcome.path, &err),
        }
    }
    if !request.dry_run {
        report.detail(format!("archived={archived}"));
    }

    Ok(report)
}
