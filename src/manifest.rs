//! Manifest discovery and combination
//!
//! Every export batch folder carries a `manifest.txt` with a header line followed
//! by one line per exported form. This module finds those files under an input
//! tree and folds them into a single `manifest.txt` in the output folder, keeping
//! only the first file's header.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use glob::{glob, Pattern};

use crate::error::{Error, Result};

/// File name shared by every batch manifest and by the combined output
pub const MANIFEST_FILE_NAME: &str = "manifest.txt";

/// What `combine_manifests` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CombineOutcome {
    /// The combined manifest was written
    Written {
        /// Number of input manifests merged
        files: usize,
        /// Number of lines written to the combined manifest
        lines: usize,
    },
    /// The combined manifest already existed and was left untouched
    Skipped,
}

/// Recursively find every file literally named `manifest.txt` under `input_root`
///
/// Results come back in the order the directory walk yields them, which is
/// sorted per directory level.
pub fn discover_manifests(input_root: &Path) -> Result<Vec<PathBuf>> {
    if !input_root.is_dir() {
        return Err(Error::DirectoryNotFound(input_root.to_path_buf()));
    }

    let root = input_root.to_str().ok_or_else(|| {
        Error::General(format!(
            "Input folder is not valid UTF-8: {}",
            input_root.display()
        ))
    })?;
    let pattern = format!("{}/**/{}", Pattern::escape(root), MANIFEST_FILE_NAME);

    let mut manifests = Vec::new();
    for entry in glob(&pattern)? {
        let path = entry.map_err(|e| Error::IoAt {
            path: e.path().to_path_buf(),
            source: std::io::Error::from(e),
        })?;
        if path.is_file() {
            manifests.push(path);
        }
    }

    log::debug!(
        "Found {} manifest file(s) under {}",
        manifests.len(),
        input_root.display()
    );

    Ok(manifests)
}

/// Combine `manifests` into `output_root/manifest.txt`
///
/// The first manifest is copied whole, header included. Every later manifest
/// has its first line dropped. Lines are copied as bytes, so content in any
/// encoding passes through unchanged. Nothing is written if the combined
/// manifest already exists, so a second run keeps the first run's content.
/// A combine that fails part way removes its partial output.
pub fn combine_manifests(output_root: &Path, manifests: &[PathBuf]) -> Result<CombineOutcome> {
    let output_path = output_root.join(MANIFEST_FILE_NAME);
    if output_path.exists() {
        log::info!(
            "Combined manifest already exists, skipping: {}",
            output_path.display()
        );
        return Ok(CombineOutcome::Skipped);
    }

    let output = File::create(&output_path).map_err(Error::io_at(&output_path))?;

    match write_combined(BufWriter::new(output), &output_path, manifests) {
        Ok(lines) => Ok(CombineOutcome::Written {
            files: manifests.len(),
            lines,
        }),
        Err(e) => {
            // Leave nothing behind, or the next run would skip the combine
            let _ = fs::remove_file(&output_path);
            Err(e)
        }
    }
}

fn write_combined(
    mut writer: BufWriter<File>,
    output_path: &Path,
    manifests: &[PathBuf],
) -> Result<usize> {
    let mut lines = 0;

    for (index, manifest) in manifests.iter().enumerate() {
        let input = File::open(manifest).map_err(Error::io_at(manifest))?;
        let skip = usize::from(index > 0);

        for line in BufReader::new(input).split(b'\n').skip(skip) {
            let mut line = line.map_err(Error::io_at(manifest))?;
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            line.push(b'\n');
            writer.write_all(&line).map_err(Error::io_at(output_path))?;
            lines += 1;
        }
    }

    writer.flush().map_err(Error::io_at(output_path))?;
    Ok(lines)
}
