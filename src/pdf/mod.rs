//! PDF manipulation module

pub mod append;

// Re-export commonly used items
pub use append::{append_pdf, AppendStats};
