//! Provider entity: an individual or group identified by NPI.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An individual or group identified by NPI.
///
/// Emitted once per (file, NPI). A provider is linked to exactly one
/// organization within a given rate record; the same NPI may legally appear
/// under multiple organizations across different rates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub provider_uuid: Uuid,

    pub npi: String,

    pub organization_uuid: Uuid,

    pub provider_name: Option<String>,
}
