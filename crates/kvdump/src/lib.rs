//! Bulk export, import and clear of every container in a [`Store`], through
//! one binary-safe JSON document.
//!
//! Each operation opens a single transaction over the store's containers,
//! issues its per-record requests concurrently, and resolves exactly once:
//! after every container has finished, or on the first error.

pub mod barrier;
pub mod callback;
pub mod clear;
pub mod config;
pub mod document;
pub mod driver;
pub mod errors;
pub mod export;
pub mod import;

pub use barrier::CompletionBarrier;
pub use callback::{spawn_clear, spawn_export, spawn_import};
pub use config::{AddFailurePolicy, DumpConfig};
pub use document::{
    Document, DocumentEntries, decode_entry, parse_document, parse_entries, render_document,
};
pub use driver::{BulkDriver, clear, clear_container, export_to_text, import_from_text};
pub use errors::{DumpError, DumpResult};
pub use import::{ImportReport, RecordFailure};
pub use kvdump_store::Store;
