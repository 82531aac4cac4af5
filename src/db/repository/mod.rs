//! Repository layer: table-scoped database operations.

mod followup_cache;
pub(crate) mod lab_report;
mod quota;

pub use followup_cache::*;
pub use lab_report::*;
pub use quota::*;
