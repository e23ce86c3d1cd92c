//! Result presentation
//!
//! Markdown for chat replies and CSV for exports.

mod export;
mod table;

pub use export::CsvExporter;
pub use table::{format_cell, markdown_table, scalar_sentence};
