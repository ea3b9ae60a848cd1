//! Quality Flags attached to every normalized Rate row.

use serde::{Deserialize, Serialize};

/// Confidence envelope produced by the Quality Validator (C7).
///
/// Invariant: if a required field is missing, `is_validated` is false and
/// `confidence_score` is at most 0.7.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityFlags {
    pub is_validated: bool,
    pub has_conflicts: bool,
    pub confidence_score: f64,
    pub notes: String,
}

impl Default for QualityFlags {
    fn default() -> Self {
        Self {
            is_validated: true,
            has_conflicts: false,
            confidence_score: 1.0,
            notes: String::new(),
        }
    }
}
