//! Transformation module.
//!
//! This module handles everything between parsing and writing:
//! - Options: Selection, cleaning, filters and date windows
//! - Processor: Applies the options to a table, row-atomically
//! - Profile: Per-column summaries for building filters
//! - Pipeline: Main ingestion → processing → export pipeline

pub mod options;
pub mod pipeline;
pub mod processor;
pub mod profile;

pub use options::*;
pub use pipeline::*;
pub use processor::{process_table, Processed};
pub use profile::{profile_table, ColumnProfile};
