//! Structured biomarker extraction from transcribed lab report text.
//!
//! prompt → LLM → strip fences → parse/validate → normalize → score

pub mod orchestrator;
pub mod parser;
pub mod prompt;

pub use orchestrator::*;
pub use parser::*;
pub use prompt::*;
