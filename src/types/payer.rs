//! Payer entity: a named issuer of Machine-Readable Files.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named issuer of MRFs, created once per pipeline invocation and never
/// mutated thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payer {
    pub payer_uuid: Uuid,

    /// Unique within a single pipeline invocation.
    pub name: String,

    pub parent_organization: Option<String>,

    pub index_url: String,
}
