//! Cross-reference file parsing
//!
//! The xref CSV names, for each affected form, the user and form it belongs to
//! and the PDF that has to be appended to it. Column positions are fixed:
//!
//! | index | field            |
//! |-------|------------------|
//! | 1     | user id          |
//! | 3     | last name        |
//! | 9     | form name        |
//! | 11    | PDF to append    |
//!
//! The first row is always a header.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use csv::{Position, ReaderBuilder, StringRecord, Trim};

use crate::error::{Error, Result};

const USER_ID_FIELD: usize = 1;
const LAST_NAME_FIELD: usize = 3;
const FORM_NAME_FIELD: usize = 9;
const APPEND_PATH_FIELD: usize = 11;

/// One data row of the xref file, reduced to the fields we use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XrefRow {
    pub user_id: String,
    pub last_name: String,
    /// Form name with all spaces removed
    pub form_name: String,
    pub append_path: PathBuf,
}

impl XrefRow {
    /// Pull the positional fields out of a CSV record
    fn from_record(record: &StringRecord, line: u64) -> Result<Self> {
        let field = |index: usize| {
            record.get(index).ok_or_else(|| Error::MalformedRow {
                line,
                detail: format!(
                    "expected at least {} fields, found {}",
                    APPEND_PATH_FIELD + 1,
                    record.len()
                ),
            })
        };

        Ok(Self {
            user_id: field(USER_ID_FIELD)?.to_string(),
            last_name: field(LAST_NAME_FIELD)?.to_string(),
            form_name: field(FORM_NAME_FIELD)?.replace(' ', ""),
            append_path: PathBuf::from(field(APPEND_PATH_FIELD)?),
        })
    }

    /// Location of the exported form this row refers to:
    /// `output_root/{user}_{last}/{user}_{last}_{form}.pdf`
    pub fn source_path(&self, output_root: &Path) -> PathBuf {
        let folder = format!("{}_{}", self.user_id, self.last_name);
        let file = format!("{}_{}.pdf", folder, self.form_name);
        output_root.join(&folder).join(file)
    }
}

/// A source PDF and the PDF to append onto it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendTask {
    pub source_path: PathBuf,
    pub append_path: PathBuf,
}

/// An xref row that was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    /// 1-based line of the xref file on which the row starts
    pub line: u64,
    pub detail: String,
}

/// Parsed xref file
///
/// Tasks are keyed by append path. When several rows name the same append
/// path, the last row wins and the earlier ones are dropped.
#[derive(Debug, Clone, Default)]
pub struct XrefPlan {
    tasks: BTreeMap<PathBuf, PathBuf>,
    rejected: Vec<RejectedRow>,
}

impl XrefPlan {
    /// Insert a task, replacing any earlier task for the same append path
    pub fn insert(&mut self, append_path: PathBuf, source_path: PathBuf) -> Option<PathBuf> {
        self.tasks.insert(append_path, source_path)
    }

    /// Number of distinct append tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Source path mapped to `append_path`, if any
    pub fn source_for(&self, append_path: &Path) -> Option<&Path> {
        self.tasks.get(append_path).map(PathBuf::as_path)
    }

    /// Rows that were skipped while parsing
    pub fn rejected(&self) -> &[RejectedRow] {
        &self.rejected
    }

    /// Iterate the tasks, each exactly once
    pub fn tasks(&self) -> impl Iterator<Item = AppendTask> + '_ {
        self.tasks.iter().map(|(append, source)| AppendTask {
            source_path: source.clone(),
            append_path: append.clone(),
        })
    }
}

/// Parse the xref file at `xref_path` into an append plan
///
/// A row that cannot be read or is too short is logged with its line number
/// and skipped. Failing to open the file at all is an error.
pub fn parse_xref(xref_path: &Path, output_root: &Path) -> Result<XrefPlan> {
    if !xref_path.is_file() {
        return Err(Error::FileNotFound(xref_path.to_path_buf()));
    }

    let contents = fs::read(xref_path).map_err(Error::io_at(xref_path))?;
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(contents.as_slice());

    let mut plan = XrefPlan::default();

    for (index, record) in reader.records().enumerate() {
        if index == 0 {
            continue;
        }

        let position = match &record {
            Ok(record) => record.position(),
            Err(e) => e.position(),
        };
        let line = position
            .map(|p| start_line(&contents, p))
            .unwrap_or(index as u64 + 1);

        let row = record
            .map_err(|e| Error::MalformedRow {
                line,
                detail: e.to_string(),
            })
            .and_then(|record| XrefRow::from_record(&record, line));

        match row {
            Ok(row) => {
                let source_path = row.source_path(output_root);
                if let Some(previous) = plan.insert(row.append_path.clone(), source_path) {
                    log::debug!(
                        "Line {}: {} replaces earlier target {}",
                        line,
                        row.append_path.display(),
                        previous.display()
                    );
                }
            }
            Err(e) => {
                log::warn!("Skipping xref row: {}", e);
                plan.rejected.push(RejectedRow {
                    line,
                    detail: e.to_string(),
                });
            }
        }
    }

    log::debug!(
        "Parsed {} append task(s) from {}, {} row(s) rejected",
        plan.len(),
        xref_path.display(),
        plan.rejected.len()
    );

    Ok(plan)
}

/// Physical line on which the record at `position` begins
///
/// The reader marks a record as starting where the previous one ended, which
/// is before any blank lines it then skips.
fn start_line(contents: &[u8], position: &Position) -> u64 {
    let start = usize::try_from(position.byte()).unwrap_or(contents.len());
    let skipped = contents
        .get(start..)
        .unwrap_or_default()
        .iter()
        .take_while(|&&b| b == b'\n' || b == b'\r')
        .filter(|&&b| b == b'\n')
        .count();
    position.line() + skipped as u64
}
