//! Aetna-family handler.
//!
//! Grounded on `payers/aetna.py::AetnaHandler`: merges hybrid provider info
//! (embedded `provider_groups` + referenced `provider_references`) by
//! positional alignment, coerces TIN/NPI representations, lowercases
//! `billing_class`, and flags Florida-described plans.

use serde_json::{json, Value};

pub fn adapt(item: &Value) -> Vec<Value> {
    let mut item = item.clone();

    if let Some(rate_groups) = item.get_mut("negotiated_rates").and_then(Value::as_array_mut) {
        for group in rate_groups.iter_mut() {
            normalize_hybrid_providers(group);
            normalize_pricing(group);
        }
    }
    normalize_metadata(&mut item);

    vec![item]
}

fn normalize_hybrid_providers(rate_group: &mut Value) {
    let refs: Vec<Value> = rate_group
        .get("provider_references")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    if let Some(groups) = rate_group.get_mut("provider_groups").and_then(Value::as_array_mut) {
        if !groups.is_empty() && !refs.is_empty() {
            for (i, pg) in groups.iter_mut().enumerate() {
                if let Some(reference_id) = refs.get(i) {
                    pg["provider_reference_id"] = reference_id.clone();
                }
                if pg.get("providers").is_none() && pg.get("npi").is_some() {
                    let npi = pg["npi"].clone();
                    let provider_name = pg.get("provider_name").cloned().unwrap_or(json!(""));
                    pg["providers"] = json!([{ "npi": npi, "provider_name": provider_name }]);
                }
            }
        }

        for pg in groups.iter_mut() {
            normalize_provider_group(pg);
        }
    }
}

fn normalize_provider_group(pg: &mut Value) {
    if let Some(Value::String(tin)) = pg.get("tin") {
        let tin = tin.clone();
        pg["tin"] = json!({ "type": "ein", "value": tin });
    }

    if let Some(providers) = pg.get_mut("providers").and_then(Value::as_array_mut) {
        for provider in providers.iter_mut() {
            if let Some(Value::String(npi)) = provider.get("npi") {
                if let Ok(parsed) = npi.parse::<i64>() {
                    provider["npi"] = json!(parsed);
                }
            }
        }
    }
}

fn normalize_pricing(rate_group: &mut Value) {
    if let Some(prices) = rate_group.get_mut("negotiated_prices").and_then(Value::as_array_mut) {
        for price in prices.iter_mut() {
            if let Some(Value::String(bc)) = price.get("billing_class") {
                let lower = bc.to_lowercase();
                price["billing_class"] = json!(lower);
            }
            if let Some(code) = price.get("service_code").and_then(Value::as_str) {
                price["service_code"] = json!([code]);
            }
        }
    }
}

fn normalize_metadata(record: &mut Value) {
    let mentions_florida = record
        .get("description")
        .and_then(Value::as_str)
        .map(|d| d.to_lowercase().contains("florida"))
        .unwrap_or(false);
    if mentions_florida {
        record["state_plan"] = json!("FL");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_reference_id_into_incomplete_embedded_group() {
        let item = json!({
            "negotiated_rates": [
                {
                    "provider_groups": [ { "provider_name": "Incomplete" } ],
                    "provider_references": [42]
                }
            ]
        });
        let out = adapt(&item);
        let pg = &out[0]["negotiated_rates"][0]["provider_groups"][0];
        assert_eq!(pg["provider_reference_id"], json!(42));
    }

    #[test]
    fn annotates_reference_id_even_when_embedded_group_already_has_npi() {
        let item = json!({
            "negotiated_rates": [
                {
                    "provider_groups": [ { "npi": "1111111111" } ],
                    "provider_references": [42]
                }
            ]
        });
        let out = adapt(&item);
        let pg = &out[0]["negotiated_rates"][0]["provider_groups"][0];
        assert_eq!(pg["provider_reference_id"], json!(42));
        assert_eq!(pg["providers"][0]["npi"], json!(1111111111_i64));
    }

    #[test]
    fn coerces_string_npi_to_integer_and_tin_to_object() {
        let item = json!({
            "negotiated_rates": [
                {
                    "provider_groups": [
                        { "npi": "1111111111", "tin": "12-3456789" }
                    ]
                }
            ]
        });
        let out = adapt(&item);
        let pg = &out[0]["negotiated_rates"][0]["provider_groups"][0];
        assert_eq!(pg["providers"][0]["npi"], json!(1111111111_i64));
        assert_eq!(pg["tin"]["type"], json!("ein"));
    }

    #[test]
    fn sets_state_plan_for_florida_description() {
        let item = json!({ "description": "Aetna Florida PPO" });
        let out = adapt(&item);
        assert_eq!(out[0]["state_plan"], json!("FL"));
    }
}
