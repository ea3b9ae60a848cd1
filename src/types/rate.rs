//! Rate entity: a single negotiated price observation, and its supporting
//! raw tuple produced by the Streaming Parser.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::quality::QualityFlags;

/// One tuple emitted by the Streaming Parser (C4), before normalization.
/// Guaranteed one tuple per (in_network item × rate group × price entry ×
/// provider attribution).
#[derive(Debug, Clone, Default)]
pub struct RawRateTuple {
    pub billing_code: String,
    pub billing_code_type: String,
    pub description: String,
    pub negotiated_rate: Option<f64>,
    pub service_codes: Vec<String>,
    pub billing_class: String,
    pub negotiated_type: String,
    pub expiration_date: Option<String>,
    pub provider_info: Option<ProviderInfo>,
    /// Set when a `provider_references` id could not be resolved against the
    /// top-level/out-of-band provider reference table.
    pub missing_provider_ref: bool,
}

/// Provider attribution carried alongside a raw rate tuple, in whichever
/// shape the source payer happened to place it.
#[derive(Debug, Clone, Default)]
pub struct ProviderInfo {
    pub npi: Vec<String>,
    pub tin: Option<String>,
    pub provider_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanDetails {
    pub plan_name: String,
    pub plan_id: String,
    pub plan_type: String,
    pub market_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractPeriod {
    pub effective_date: Option<String>,
    pub expiration_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderNetwork {
    /// Deduplicated, order-preserving.
    pub npi_list: Vec<String>,
    pub npi_count: usize,
    pub coverage_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataLineage {
    pub source_url: String,
    pub source_url_hash: String,
    pub extracted_at: String,
    pub processing_version: String,
}

/// A single negotiated price observation, fully normalized, identified, and
/// quality-scored. This is the row shape written to the `rates` Parquet
/// table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rate {
    pub rate_uuid: Uuid,
    pub payer_uuid: Uuid,
    pub organization_uuid: Uuid,

    pub service_code: String,
    pub service_description: String,
    pub billing_code_type: String,

    pub negotiated_rate: f64,
    pub billing_class: String,
    pub rate_type: String,

    pub service_codes: Vec<String>,

    pub plan_details: PlanDetails,
    pub contract_period: ContractPeriod,
    pub provider_network: ProviderNetwork,
    pub data_lineage: DataLineage,
    pub quality_flags: QualityFlags,
}
