//! MRF Descriptor: a discovered file, transient for the duration of a run.

use serde::{Deserialize, Serialize};

/// The kind of MRF a descriptor points at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MrfKind {
    InNetworkRates,
    AllowedAmounts,
    ProviderReference,
    Unknown,
}

/// A single file referenced by a Table-of-Contents index. Descriptors are
/// transient: they live only for the duration of a pipeline run and are
/// never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MrfDescriptor {
    pub url: String,

    pub kind: MrfKind,

    pub plan_name: Option<String>,

    pub plan_id: Option<String>,

    pub plan_market_type: Option<String>,

    pub description: Option<String>,

    /// Eagerly fetchable top-level provider reference table for this file,
    /// attached from the enclosing `reporting_structure`'s first
    /// `provider_references[].location`, if any.
    pub provider_reference_url: Option<String>,
}
