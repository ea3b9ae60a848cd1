//! Table-of-Contents Resolver (C2).
//!
//! Generalizes `types::table_of_contents` (the standard ToC shape) and
//! `sources::united_health::IndexFile` (the legacy blob-list shape UHC
//! actually publishes) into a single resolver over the three index shapes,
//! recognized by presence of a top-level key. Never follows a referenced
//! file; only enumerates descriptors.

use serde::Deserialize;
use serde_json::Value;

use crate::error::TocError;
use crate::fetch::Fetcher;
use crate::types::{MrfDescriptor, MrfKind};

/// Resolve an index URL into an ordered list of descriptors, preserving
/// source ordering within and across structures.
pub async fn resolve(fetcher: &Fetcher, index_url: &str) -> Result<Vec<MrfDescriptor>, TocError> {
    let bytes = fetcher.get_bytes(index_url).await?;
    let doc: Value = serde_json::from_slice(&bytes)?;
    parse_index(&doc)
}

fn parse_index(doc: &Value) -> Result<Vec<MrfDescriptor>, TocError> {
    if doc.get("reporting_structure").is_some() {
        return Ok(parse_standard(doc));
    }
    if doc.get("blobs").is_some() {
        return Ok(parse_blobs(doc));
    }
    if doc.get("in_network_files").is_some() {
        return Ok(parse_direct(doc));
    }
    Err(TocError::UnknownIndexShape)
}

fn parse_standard(doc: &Value) -> Vec<MrfDescriptor> {
    let mut out = Vec::new();
    let structures = doc.get("reporting_structure").and_then(Value::as_array).cloned().unwrap_or_default();

    for structure in &structures {
        let plan = structure.get("reporting_plans").and_then(Value::as_array).and_then(|plans| plans.first());
        let plan_name = plan.and_then(|p| p.get("plan_name")).and_then(Value::as_str).map(str::to_string);
        let plan_id = plan.and_then(|p| p.get("plan_id")).and_then(Value::as_str).map(str::to_string);
        let plan_market_type = plan.and_then(|p| p.get("plan_market_type")).and_then(Value::as_str).map(str::to_string);

        let provider_reference_url = structure
            .get("provider_references")
            .and_then(Value::as_array)
            .and_then(|refs| refs.first())
            .and_then(|r| r.get("location"))
            .and_then(Value::as_str)
            .map(str::to_string);

        if let Some(files) = structure.get("in_network_files").and_then(Value::as_array) {
            for file in files {
                let Some(url) = file.get("location").and_then(Value::as_str) else { continue };
                out.push(MrfDescriptor {
                    url: url.to_string(),
                    kind: MrfKind::InNetworkRates,
                    plan_name: plan_name.clone(),
                    plan_id: plan_id.clone(),
                    plan_market_type: plan_market_type.clone(),
                    description: file.get("description").and_then(Value::as_str).map(str::to_string),
                    provider_reference_url: provider_reference_url.clone(),
                });
            }
        }

        if let Some(file) = structure.get("allowed_amount_file") {
            if let Some(url) = file.get("location").and_then(Value::as_str) {
                out.push(MrfDescriptor {
                    url: url.to_string(),
                    kind: MrfKind::AllowedAmounts,
                    plan_name: plan_name.clone(),
                    plan_id: plan_id.clone(),
                    plan_market_type: plan_market_type.clone(),
                    description: file.get("description").and_then(Value::as_str).map(str::to_string),
                    provider_reference_url: None,
                });
            }
        }
    }

    out
}

fn parse_blobs(doc: &Value) -> Vec<MrfDescriptor> {
    #[derive(Deserialize)]
    struct Blob {
        #[serde(rename = "downloadUrl")]
        download_url: Option<String>,
        url: Option<String>,
        name: Option<String>,
    }

    let blobs: Vec<Blob> = doc
        .get("blobs")
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .ok()
        .flatten()
        .unwrap_or_default();

    blobs
        .into_iter()
        .filter_map(|b| {
            let url = b.download_url.or(b.url)?;
            Some(MrfDescriptor {
                url,
                kind: MrfKind::Unknown,
                plan_name: None,
                plan_id: None,
                plan_market_type: None,
                description: b.name,
                provider_reference_url: None,
            })
        })
        .collect()
}

fn parse_direct(doc: &Value) -> Vec<MrfDescriptor> {
    doc.get("in_network_files")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .filter_map(|file| {
            let url = file.get("location").and_then(Value::as_str)?.to_string();
            Some(MrfDescriptor {
                url,
                kind: MrfKind::InNetworkRates,
                plan_name: None,
                plan_id: None,
                plan_market_type: None,
                description: file.get("description").and_then(Value::as_str).map(str::to_string),
                provider_reference_url: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn standard_shape_produces_in_network_and_allowed_amount_descriptors() {
        let doc = json!({
            "reporting_structure": [
                {
                    "reporting_plans": [ { "plan_name": "Gold PPO", "plan_id": "12-3456789", "plan_market_type": "group" } ],
                    "in_network_files": [ { "description": "Rates", "location": "https://x/rates.json" } ],
                    "allowed_amount_file": { "description": "Allowed", "location": "https://x/allowed.json" }
                }
            ]
        });
        let out = parse_index(&doc).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].kind, MrfKind::InNetworkRates);
        assert_eq!(out[0].plan_name.as_deref(), Some("Gold PPO"));
        assert_eq!(out[1].kind, MrfKind::AllowedAmounts);
    }

    #[test]
    fn blobs_shape_yields_unknown_kind() {
        let doc = json!({ "blobs": [ { "downloadUrl": "https://x/1.json", "name": "a" } ] });
        let out = parse_index(&doc).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, MrfKind::Unknown);
    }

    #[test]
    fn direct_shape_yields_in_network_kind() {
        let doc = json!({ "in_network_files": [ { "location": "https://x/rates.json" } ] });
        let out = parse_index(&doc).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, MrfKind::InNetworkRates);
    }

    #[test]
    fn unrecognized_shape_is_an_error() {
        let doc = json!({ "something_else": [] });
        assert!(matches!(parse_index(&doc), Err(TocError::UnknownIndexShape)));
    }

    #[test]
    fn provider_reference_url_attached_to_in_network_descriptors_only() {
        let doc = json!({
            "reporting_structure": [
                {
                    "provider_references": [ { "location": "https://x/providers.json" } ],
                    "in_network_files": [ { "location": "https://x/rates.json" } ],
                    "allowed_amount_file": { "location": "https://x/allowed.json" }
                }
            ]
        });
        let out = parse_index(&doc).unwrap();
        assert_eq!(out[0].provider_reference_url.as_deref(), Some("https://x/providers.json"));
        assert!(out[1].provider_reference_url.is_none());
    }
}
