pub mod biomarker;
pub mod enums;
pub mod followup;
pub mod lab_report;

pub use biomarker::*;
pub use enums::{BiomarkerStatus, FollowUpKind, RiskLevel};
pub use followup::*;
pub use lab_report::*;
