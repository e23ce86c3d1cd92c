//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// Planner system prompt
pub const PLANNER: &str = include_str!("../../prompts/planner.pmt");

/// Description of the app_metrics table
pub const SCHEMA: &str = include_str!("../../prompts/schema.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "planner" => Some(PLANNER),
        "schema" => Some(SCHEMA),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}
