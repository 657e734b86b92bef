//! Form Export Fixer Library
//!
//! Repairs a batch of exported forms in two passes:
//! - Combine the per-batch `manifest.txt` files into one manifest
//! - Append the PDF named in each cross-reference (xref) row onto the exported
//!   form it belongs to, replacing the form in place, and log every outcome
//!   to `FormExportLog.csv`
//!
//! # Example
//!
//! ```no_run
//! use form_export_fixer::pipeline::{run, RunConfig};
//!
//! let config = RunConfig::new("exports/batches", "exports/forms", "xref.csv");
//! let summary = run(&config).expect("Run failed");
//! println!("{} updated, {} failed", summary.completed, summary.failed);
//! ```

pub mod error;
pub mod export_log;
pub mod manifest;
pub mod pdf;
pub mod pipeline;
pub mod task;
pub mod xref;

// Re-export commonly used items
pub use error::{Error, Result};
pub use pipeline::{run, RunConfig, RunSummary};
