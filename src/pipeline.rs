//! End-to-end run: combine manifests, then append every xref task

use std::fs;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::export_log::ExportLog;
use crate::manifest::{combine_manifests, discover_manifests, CombineOutcome};
use crate::task::{append_document, default_work_dir};
use crate::xref::{parse_xref, XrefPlan};

/// Inputs for a run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Folder searched for `manifest.txt` files
    pub input_root: PathBuf,
    /// Folder holding the exported forms; receives the combined manifest and the log
    pub output_root: PathBuf,
    /// Cross-reference CSV
    pub xref_path: PathBuf,
    /// Staging folder for combined PDFs
    pub work_dir: PathBuf,
}

impl RunConfig {
    /// Config using the default work directory for `output_root`
    pub fn new(
        input_root: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
        xref_path: impl Into<PathBuf>,
    ) -> Self {
        let output_root = output_root.into();
        Self {
            input_root: input_root.into(),
            work_dir: default_work_dir(&output_root),
            output_root,
            xref_path: xref_path.into(),
        }
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    /// Check that both folders and the xref file exist
    pub fn validate(&self) -> Result<()> {
        for dir in [&self.input_root, &self.output_root] {
            if !dir.is_dir() {
                return Err(Error::DirectoryNotFound(dir.clone()));
            }
        }
        if !self.xref_path.is_file() {
            return Err(Error::FileNotFound(self.xref_path.clone()));
        }
        Ok(())
    }
}

/// Counts for a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// `None` if the combined manifest already existed
    pub manifest_lines: Option<usize>,
    pub manifest_files: usize,
    pub completed: usize,
    pub failed: usize,
    pub rejected_rows: usize,
}

/// Run every task in `plan`, each exactly once
///
/// Task failures are logged and counted. Only an unwritable export log stops
/// the loop.
pub fn process_plan(config: &RunConfig, plan: &XrefPlan) -> Result<(usize, usize)> {
    let log = ExportLog::in_folder(&config.output_root);
    let mut completed = 0;
    let mut failed = 0;

    for task in plan.tasks() {
        if append_document(&config.work_dir, &task, &log)?.is_complete() {
            completed += 1;
        } else {
            failed += 1;
        }
    }

    Ok((completed, failed))
}

/// Run the whole batch
///
/// Manifests are combined first, then the xref tasks are applied, then the
/// work directory is removed. Removal fails if a task left a staged file behind.
pub fn run(config: &RunConfig) -> Result<RunSummary> {
    config.validate()?;
    let mut summary = RunSummary::default();

    log::info!("Combining manifest files...");
    let manifests = discover_manifests(&config.input_root)?;
    summary.manifest_files = manifests.len();
    match combine_manifests(&config.output_root, &manifests)? {
        CombineOutcome::Written { files, lines } => {
            log::info!("Combined {} manifest file(s), {} line(s)", files, lines);
            summary.manifest_lines = Some(lines);
        }
        CombineOutcome::Skipped => {}
    }

    log::info!("Processing PDF files...");
    let plan = parse_xref(&config.xref_path, &config.output_root)?;
    summary.rejected_rows = plan.rejected().len();

    let (completed, failed) = process_plan(config, &plan)?;
    summary.completed = completed;
    summary.failed = failed;
    log::info!("Updated {} PDF file(s), {} failed", completed, failed);

    if config.work_dir.exists() {
        fs::remove_dir(&config.work_dir).map_err(Error::io_at(&config.work_dir))?;
    }

    Ok(summary)
}
