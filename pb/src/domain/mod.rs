//! Domain types for portfoliobot
//!
//! Plans produced by the planning pipeline and the tabular results
//! produced by executing them.

mod plan;
mod result;

pub use plan::{AnswerShape, Plan, Query};
pub use result::{QueryResult, Value};
