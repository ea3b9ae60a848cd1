//! Organization entity: a billing entity identified by TIN.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A billing entity identified by TIN.
///
/// An organization MAY be emitted at most once per source file per pipeline
/// run (enforced by a per-file dedup set owned by the processing task);
/// cross-file duplicates are tolerated and resolved downstream by UUID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub organization_uuid: Uuid,

    pub tin: String,

    pub organization_name: String,
}
