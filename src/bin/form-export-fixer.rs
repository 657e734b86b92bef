//! Form Export Fixer CLI tool
//!
//! Combines manifest files and appends cross-referenced PDFs onto exported forms.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process;

use form_export_fixer::pipeline::{run, RunConfig};

/// Form Export Fixer - Combine manifests and append cross-referenced PDFs
#[derive(Parser)]
#[command(name = "form-export-fixer")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Combine manifests under ./batches and fix the forms in ./forms
    form-export-fixer --input batches --output forms --xref xref.csv

    # Stage combined PDFs somewhere other than <output root>/_Temp
    form-export-fixer --input batches --output forms --xref xref.csv --work-dir /tmp/fixer")]
struct Cli {
    /// Parent folder containing the manifest files
    #[arg(short, long, value_name = "DIR")]
    input: PathBuf,

    /// Folder holding the exported forms; receives manifest.txt and FormExportLog.csv
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// Cross-reference CSV naming the PDFs to append
    #[arg(short, long, value_name = "FILE")]
    xref: PathBuf,

    /// Staging folder for combined PDFs (default: <filesystem root of output>/_Temp)
    #[arg(long, value_name = "DIR")]
    work_dir: Option<PathBuf>,

    /// Show debug output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = cmd_run(cli) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn cmd_run(cli: Cli) -> anyhow::Result<()> {
    let mut config = RunConfig::new(cli.input, cli.output, cli.xref);
    if let Some(work_dir) = cli.work_dir {
        config = config.with_work_dir(work_dir);
    }

    config.validate().context("Invalid folder or file path")?;

    log::info!("Processing started");
    let summary = run(&config).context("Processing stopped")?;

    println!(
        "Manifests: {} file(s){}",
        summary.manifest_files,
        match summary.manifest_lines {
            Some(lines) => format!(", {} line(s) written", lines),
            None => ", combined manifest already present".to_string(),
        }
    );
    println!(
        "PDFs: {} updated, {} failed, {} xref row(s) skipped",
        summary.completed, summary.failed, summary.rejected_rows
    );
    if summary.failed > 0 {
        println!(
            "See {} for details",
            config.output_root.join(form_export_fixer::export_log::LOG_FILE_NAME).display()
        );
    }

    Ok(())
}
