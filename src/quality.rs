//! Quality Validator (C7).
//!
//! Grounded on `DataQualityValidator.validate_rate_record` in the original
//! Python pipeline. One deviation from that original is deliberate: the
//! Python only batches rows whose `is_validated` ends up true, silently
//! dropping the rest. The testable invariants this crate is held to only
//! require `is_validated` to be *set* correctly, and treat an out-of-bounds
//! rate as a flag (`has_conflicts`) rather than a drop condition, so rows
//! here are always emitted with their flags attached, never dropped by this
//! stage.

use crate::types::QualityFlags;

/// Inputs a caller has already extracted from a normalized `Rate` prior to
/// assigning identity, so this validator has no dependency on the final
/// `Rate` struct.
pub struct RateQualityInput<'a> {
    pub service_code: &'a str,
    pub negotiated_rate: Option<f64>,
    pub payer_uuid_present: bool,
    pub organization_uuid_present: bool,
    pub npi_list: &'a [String],
}

pub fn validate_rate(input: &RateQualityInput) -> QualityFlags {
    let mut flags = QualityFlags::default();
    let mut notes = Vec::new();

    let mut missing = Vec::new();
    if input.service_code.is_empty() {
        missing.push("service_code");
    }
    if input.negotiated_rate.is_none() {
        missing.push("negotiated_rate");
    }
    if !input.payer_uuid_present {
        missing.push("payer_uuid");
    }
    if !input.organization_uuid_present {
        missing.push("organization_uuid");
    }

    if !missing.is_empty() {
        flags.is_validated = false;
        flags.confidence_score -= 0.3;
        notes.push(format!("missing required fields: {}", missing.join(", ")));
    }

    if let Some(rate) = input.negotiated_rate {
        if rate <= 0.0 || rate > 10_000.0 {
            flags.has_conflicts = true;
            flags.confidence_score -= 0.2;
            notes.push(format!("unusual rate value: {rate}"));
        }
    }

    if input.npi_list.is_empty() {
        flags.confidence_score -= 0.1;
        notes.push("empty NPI list".to_string());
    }

    flags.confidence_score = flags.confidence_score.clamp(0.0, 1.0);
    flags.notes = notes.join("; ");
    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fully_populated_row_is_validated_with_full_confidence() {
        let input = RateQualityInput {
            service_code: "99213",
            negotiated_rate: Some(125.0),
            payer_uuid_present: true,
            organization_uuid_present: true,
            npi_list: &["1234567890".to_string()],
        };
        let flags = validate_rate(&input);
        assert!(flags.is_validated);
        assert!(!flags.has_conflicts);
        assert_eq!(flags.confidence_score, 1.0);
        assert_eq!(flags.notes, "");
    }

    #[test]
    fn missing_required_field_sets_is_validated_false_and_caps_at_0_7() {
        let input = RateQualityInput {
            service_code: "",
            negotiated_rate: Some(125.0),
            payer_uuid_present: true,
            organization_uuid_present: true,
            npi_list: &["1234567890".to_string()],
        };
        let flags = validate_rate(&input);
        assert!(!flags.is_validated);
        assert!(flags.confidence_score <= 0.7);
    }

    #[test]
    fn out_of_bounds_rate_flags_conflicts_but_stays_validated() {
        let input = RateQualityInput {
            service_code: "99213",
            negotiated_rate: Some(15_000.0),
            payer_uuid_present: true,
            organization_uuid_present: true,
            npi_list: &["1234567890".to_string()],
        };
        let flags = validate_rate(&input);
        assert!(flags.is_validated);
        assert!(flags.has_conflicts);
        assert!((flags.confidence_score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn empty_npi_list_deducts_tenth() {
        let input = RateQualityInput {
            service_code: "99213",
            negotiated_rate: Some(125.0),
            payer_uuid_present: true,
            organization_uuid_present: true,
            npi_list: &[],
        };
        let flags = validate_rate(&input);
        assert!((flags.confidence_score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn score_never_drops_below_zero() {
        let input = RateQualityInput {
            service_code: "",
            negotiated_rate: None,
            payer_uuid_present: false,
            organization_uuid_present: false,
            npi_list: &[],
        };
        let flags = validate_rate(&input);
        assert!(flags.confidence_score >= 0.0);
    }
}
