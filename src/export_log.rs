//! Run log written next to the exported forms
//!
//! `FormExportLog.csv` is append-only. The header is written once when the
//! file is first created; every record after that is prefixed with a newline,
//! so the file never ends in one.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Name of the log file inside the output folder
pub const LOG_FILE_NAME: &str = "FormExportLog.csv";

const LOG_HEADER: &str = "FileName,FilePath,Message";

/// Message recorded for a task that finished cleanly
pub const COMPLETE: &str = "Complete";

/// One line of the export log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub file_name: String,
    pub file_path: PathBuf,
    /// `Complete`, or the description of the error that stopped the task
    pub message: String,
}

impl LogEntry {
    pub fn complete(file_name: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_name: file_name.into(),
            file_path: file_path.into(),
            message: COMPLETE.to_string(),
        }
    }

    pub fn failed(
        file_name: impl Into<String>,
        file_path: impl Into<PathBuf>,
        error: &Error,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            file_path: file_path.into(),
            message: error.to_string(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.message == COMPLETE
    }

    /// Render as a single CSV record without a line terminator
    fn to_csv_line(&self) -> Result<String> {
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        let file_path = self.file_path.to_string_lossy();
        writer.write_record([
            self.file_name.as_str(),
            file_path.as_ref(),
            self.message.as_str(),
        ])?;
        let bytes = writer
            .into_inner()
            .map_err(|e| Error::General(format!("Failed to flush log record: {}", e)))?;

        let mut line = String::from_utf8_lossy(&bytes).into_owned();
        if line.ends_with('\n') {
            line.pop();
        }
        Ok(line)
    }
}

/// Append-only writer for `FormExportLog.csv`
#[derive(Debug, Clone)]
pub struct ExportLog {
    path: PathBuf,
}

impl ExportLog {
    /// Log stored in `output_root/FormExportLog.csv`
    pub fn in_folder(output_root: &Path) -> Self {
        Self {
            path: output_root.join(LOG_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `entry`, creating the file with its header first if needed
    pub fn record(&self, entry: &LogEntry) -> Result<()> {
        if !self.path.exists() {
            let mut file = File::create(&self.path).map_err(Error::io_at(&self.path))?;
            file.write_all(LOG_HEADER.as_bytes())
                .map_err(Error::io_at(&self.path))?;
        }

        let line = entry.to_csv_line()?;
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(Error::io_at(&self.path))?;
        write!(file, "\n{}", line).map_err(Error::io_at(&self.path))?;

        Ok(())
    }
}
