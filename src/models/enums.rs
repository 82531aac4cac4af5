use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(BiomarkerStatus {
    Optimal => "optimal",
    Warning => "warning",
    Critical => "critical",
});

str_enum!(RiskLevel {
    Low => "low",
    Moderate => "moderate",
    High => "high",
});

str_enum!(FollowUpKind {
    DoctorQuestions => "doctor_questions",
    ClinicalInsights => "clinical_insights",
});

impl BiomarkerStatus {
    /// Flagged biomarkers are the ones needing attention.
    pub fn is_flagged(&self) -> bool {
        !matches!(self, BiomarkerStatus::Optimal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_round_trips_through_storage_form() {
        for status in [
            BiomarkerStatus::Optimal,
            BiomarkerStatus::Warning,
            BiomarkerStatus::Critical,
        ] {
            assert_eq!(BiomarkerStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn strict_parse_rejects_synonyms() {
        let err = BiomarkerStatus::from_str("elevated").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { .. }));
    }

    #[test]
    fn only_optimal_is_unflagged() {
        assert!(!BiomarkerStatus::Optimal.is_flagged());
        assert!(BiomarkerStatus::Warning.is_flagged());
        assert!(BiomarkerStatus::Critical.is_flagged());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&FollowUpKind::DoctorQuestions).unwrap();
        assert_eq!(json, "\"doctor_questions\"");
        let risk: RiskLevel = serde_json::from_str("\"moderate\"").unwrap();
        assert_eq!(risk, RiskLevel::Moderate);
    }
}
