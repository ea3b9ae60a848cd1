//! Record Normalizer (C5).
//!
//! Grounded on `transform/normalize.py`, generalized from that module's
//! single hardcoded field set to the full canonical field list of §3's Rate
//! entity.

use std::collections::HashSet;

use crate::types::{ProviderInfo, RawRateTuple};

/// A `RawRateTuple` that has passed the whitelist/bounds checks and had its
/// fields canonicalized. Identity and quality scoring happen downstream.
#[derive(Debug, Clone)]
pub struct NormalizedRecord {
    pub service_code: String,
    pub service_codes: Vec<String>,
    pub description: String,
    pub billing_code_type: String,
    pub negotiated_rate: f64,
    pub billing_class: String,
    pub negotiated_type: String,
    pub expiration_date: Option<String>,
    pub provider_npi: Vec<String>,
    pub provider_tin: Option<String>,
    pub provider_name: Option<String>,
}

/// Reason a tuple was silently dropped (counted, never propagated as an
/// error per spec §7's `RecordSkip`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotWhitelisted,
    MissingRate,
    RateNotPositive,
}

pub fn normalize(
    tuple: &RawRateTuple,
    cpt_whitelist: &HashSet<String>,
) -> Result<NormalizedRecord, SkipReason> {
    if !cpt_whitelist.is_empty() && !cpt_whitelist.contains(&tuple.billing_code) {
        return Err(SkipReason::NotWhitelisted);
    }

    let rate = tuple.negotiated_rate.ok_or(SkipReason::MissingRate)?;
    if rate <= 0.0 {
        return Err(SkipReason::RateNotPositive);
    }
    // rate > 10_000 is a flag, not a drop — the Quality Validator (C7) sets
    // has_conflicts for that case, per spec §4.7.

    let (provider_npi, provider_tin, provider_name) = extract_provider_info(tuple.provider_info.as_ref());

    Ok(NormalizedRecord {
        service_code: tuple.billing_code.clone(),
        service_codes: tuple.service_codes.clone(),
        description: tuple.description.clone(),
        billing_code_type: tuple.billing_code_type.clone(),
        negotiated_rate: rate,
        billing_class: tuple.billing_class.clone(),
        negotiated_type: tuple.negotiated_type.clone(),
        expiration_date: tuple.expiration_date.clone(),
        provider_npi,
        provider_tin,
        provider_name,
    })
}

fn extract_provider_info(info: Option<&ProviderInfo>) -> (Vec<String>, Option<String>, Option<String>) {
    match info {
        Some(info) => (info.npi.clone(), info.tin.clone(), info.provider_name.clone()),
        None => (Vec::new(), None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProviderInfo;

    fn tuple(billing_code: &str, rate: Option<f64>) -> RawRateTuple {
        RawRateTuple {
            billing_code: billing_code.to_string(),
            billing_code_type: "CPT".to_string(),
            description: "Office visit".to_string(),
            negotiated_rate: rate,
            service_codes: vec!["11".to_string()],
            billing_class: "professional".to_string(),
            negotiated_type: "negotiated".to_string(),
            expiration_date: Some("9999-12-31".to_string()),
            provider_info: Some(ProviderInfo {
                npi: vec!["1234567890".to_string()],
                tin: Some("12-3456789".to_string()),
                provider_name: None,
            }),
            missing_provider_ref: false,
        }
    }

    #[test]
    fn drops_non_whitelisted_code() {
        let whitelist: HashSet<String> = ["99213".to_string()].into_iter().collect();
        let t = tuple("70450", Some(50.0));
        assert_eq!(normalize(&t, &whitelist), Err(SkipReason::NotWhitelisted));
    }

    #[test]
    fn empty_whitelist_allows_everything() {
        let whitelist = HashSet::new();
        let t = tuple("70450", Some(50.0));
        assert!(normalize(&t, &whitelist).is_ok());
    }

    #[test]
    fn drops_missing_rate() {
        let whitelist = HashSet::new();
        let t = tuple("99213", None);
        assert_eq!(normalize(&t, &whitelist), Err(SkipReason::MissingRate));
    }

    #[test]
    fn drops_non_positive_rate() {
        let whitelist = HashSet::new();
        let t = tuple("99213", Some(0.0));
        assert_eq!(normalize(&t, &whitelist), Err(SkipReason::RateNotPositive));
    }

    #[test]
    fn keeps_borderline_high_rate_for_quality_stage_to_flag() {
        let whitelist = HashSet::new();
        let t = tuple("99213", Some(15_000.0));
        assert!(normalize(&t, &whitelist).is_ok());
    }
}
