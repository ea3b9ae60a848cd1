//! Payer Handler Registry (C3).
//!
//! Maps a payer name (case-insensitive) to a handler variant. Each handler's
//! `adapt_in_network` is a pure function over one raw `in_network` JSON
//! subtree, returning zero or more uniform subtrees for the Streaming Parser
//! (C4) to apply its emission rules to. Handlers never perform I/O and never
//! observe or mutate state outside the subtree they are given.
//!
//! Grounded 1:1 on `payers/{centene,aetna,horizon,bcbs_fl,bcbs_il}.py` in the
//! original implementation; the registry shape follows the teacher's
//! `sources::MrfSource` trait-registry idiom.

mod aetna;
mod bcbs_fl;
mod bcbs_il;
mod centene;
mod horizon;

use serde_json::Value;

/// A payer's structural adapter. Variants are a closed, compile-time-known
/// set (payer names are not arbitrary plugin identifiers), so this is a
/// plain enum rather than a trait object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayerHandler {
    Default,
    Centene,
    Aetna,
    Horizon,
    BcbsFl,
    BcbsIl,
}

impl PayerHandler {
    /// Resolve a handler for a payer name. Unknown names fall back to
    /// `Default`, matching `get_handler`'s fallback in the original registry.
    pub fn for_payer(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "centene" | "centene_fidelis" => PayerHandler::Centene,
            "aetna" | "aetna_florida" | "aetna_health_inc" => PayerHandler::Aetna,
            "horizon" | "horizon_bcbs" | "horizon_healthcare" => PayerHandler::Horizon,
            "bcbs_fl" => PayerHandler::BcbsFl,
            "bcbs_il" => PayerHandler::BcbsIl,
            _ => PayerHandler::Default,
        }
    }

    /// Adapt one raw `in_network` item into zero or more uniform items.
    pub fn adapt_in_network(&self, item: &Value) -> Vec<Value> {
        match self {
            PayerHandler::Default => vec![item.clone()],
            PayerHandler::Centene => centene::adapt(item),
            PayerHandler::Aetna => aetna::adapt(item),
            PayerHandler::Horizon => horizon::adapt(item),
            PayerHandler::BcbsFl => bcbs_fl::adapt(item),
            PayerHandler::BcbsIl => bcbs_il::adapt(item),
        }
    }
}
