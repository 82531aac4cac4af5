//! Follow-up content (doctor questions, clinical insights) behind a
//! two-tier cache: per-report local tier, then a cross-user global tier
//! keyed by the flagged-biomarker signature.

pub mod cache;
pub mod parser;
pub mod prompt;
pub mod service;
pub mod signature;

pub use cache::*;
pub use parser::*;
pub use prompt::*;
pub use service::*;
pub use signature::*;
