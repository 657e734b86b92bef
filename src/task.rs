//! The append-and-replace step for a single xref task
//!
//! Each task builds the combined PDF in the work directory, then swaps it in
//! over the original source file and records the outcome in the export log.
//! A failing task is logged and reported back; it never stops the run.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};
use crate::export_log::{ExportLog, LogEntry};
use crate::pdf::{append_pdf, AppendStats};
use crate::xref::AppendTask;

const WORK_DIR_NAME: &str = "_Temp";

/// Default work directory for a run writing to `output_root`
///
/// This is the filesystem root of the output folder joined with `_Temp`, so
/// `D:\exports\forms` gives `D:\_Temp` and `/srv/exports` gives `/_Temp`. A
/// relative output folder has no root and gets a relative `_Temp`.
pub fn default_work_dir(output_root: &Path) -> PathBuf {
    let root: PathBuf = output_root
        .components()
        .take_while(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
        .collect();
    root.join(WORK_DIR_NAME)
}

/// Result of one task, mirrored into the export log
#[derive(Debug)]
pub enum TaskOutcome {
    Complete(AppendStats),
    Failed(Error),
}

impl TaskOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, TaskOutcome::Complete(_))
    }
}

/// Append `task.append_path` onto `task.source_path` in place and log it
///
/// Only a failure to write the export log itself is returned as `Err`.
pub fn append_document(work_dir: &Path, task: &AppendTask, log: &ExportLog) -> Result<TaskOutcome> {
    let file_name = task
        .source_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let outcome = match run_task(work_dir, task, &file_name) {
        Ok(stats) => {
            log::debug!(
                "Appended {} onto {} ({} + {} pages)",
                task.append_path.display(),
                task.source_path.display(),
                stats.source_pages,
                stats.appended_pages
            );
            log.record(&LogEntry::complete(&file_name, &task.source_path))?;
            TaskOutcome::Complete(stats)
        }
        Err(e) => {
            log::error!("Failed to update {}: {}", task.source_path.display(), e);
            log.record(&LogEntry::failed(&file_name, &task.source_path, &e))?;
            TaskOutcome::Failed(e)
        }
    };

    Ok(outcome)
}

fn run_task(work_dir: &Path, task: &AppendTask, file_name: &str) -> Result<AppendStats> {
    if file_name.is_empty() {
        return Err(Error::General(format!(
            "Source path has no file name: {}",
            task.source_path.display()
        )));
    }

    fs::create_dir_all(work_dir).map_err(Error::io_at(work_dir))?;
    let staged_path = work_dir.join(file_name);

    let stats = append_pdf(&task.source_path, &task.append_path, &staged_path)?;
    replace_file(&staged_path, &task.source_path)?;

    Ok(stats)
}

/// Replace `target` with `staged`
///
/// The original is deleted before the staged file is moved in. A crash
/// between the two steps leaves only the staged copy in the work directory.
fn replace_file(staged: &Path, target: &Path) -> Result<()> {
    fs::remove_file(target).map_err(Error::io_at(target))?;

    if fs::rename(staged, target).is_err() {
        // rename can't cross filesystems
        fs::copy(staged, target).map_err(Error::io_at(target))?;
        fs::remove_file(staged).map_err(Error::io_at(staged))?;
    }

    Ok(())
}
