use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::archive::lifecycle::ArchiveRequest;
use crate::commands::{self, CommandReport};

#[derive(Parser)]
#[command(name = "archive-tool")]
#[command(about = "Archive files to dsmc and leave stubs in their place", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Archive files and replace them with stubs
    Archive {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Validate and check the backend without changing anything
        #[arg(long)]
        dry_run: bool,

        /// Expand directories into the files beneath them
        #[arg(long, short = 'r')]
        recursive: bool,

        /// Objects processed in parallel (default: workers.jobs)
        #[arg(long, short = 'j')]
        jobs: Option<usize>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Copy archived content elsewhere; stubs stay in place
    Retrieve {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Target file, or an existing directory
        #[arg(long, short = 'd')]
        destination: PathBuf,

        #[arg(long, short = 'j')]
        jobs: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Restore archived content over its stub and release the remote copy
    Recall {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[arg(long, short = 'j')]
        jobs: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Delete the remote copy and the stub
    Delete {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[arg(long, short = 'j')]
        jobs: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Reconcile stubs with the backend catalog
    List {
        paths: Vec<PathBuf>,

        /// Report objects that were never archived instead of failing
        #[arg(long)]
        ignore_missing: bool,

        #[arg(long)]
        json: bool,
    },

    /// Show backend system information and file spaces
    Info {
        #[arg(long)]
        json: bool,
    },

    /// Show paths, effective limits and environment overrides
    Status {
        #[arg(long)]
        json: bool,
    },
}

fn render_human(report: &CommandReport) -> String {
    let mut out = format!(
        "{}: {}\n",
        report.command,
        if report.ok { "ok" } else { "failed" }
    );
    for detail in &report.details {
        out.push_str(&format!("  {detail}\n"));
    }
    for issue in &report.issues {
        out.push_str(&format!("  ! {issue}\n"));
    }
    out
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", render_human(report));
    }
    Ok(())
}

/// Run the CLI. Returns whether every requested object succeeded.
pub fn run() -> Result<bool> {
    let cli = Cli::parse();

    let (report, json) = match cli.command {
        Commands::Archive {
            paths,
            dry_run,
            recursive,
            jobs,
            json,
        } => (
            commands::archive::run(&paths, ArchiveRequest { dry_run, recursive }, jobs)?,
            json,
        ),
        Commands::Retrieve {
            paths,
            destination,
            jobs,
            json,
        } => (commands::retrieve::run(&paths, &destination, jobs)?, json),
        Commands::Recall { paths, jobs, json } => (commands::recall::run(&paths, jobs)?, json),
        Commands::Delete { paths, jobs, json } => (commands::delete::run(&paths, jobs)?, json),
        Commands::List {
            paths,
            ignore_missing,
            json,
        } => (commands::list::run(&paths, ignore_missing)?, json),
        Commands::Info { json } => (commands::info::run()?, json),
        Commands::Status { json } => (commands::status::run()?, json),
    };

    print_report(&report, json)?;
    Ok(report.ok)
}
