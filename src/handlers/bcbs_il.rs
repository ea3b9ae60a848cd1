//! BCBS-IL handler.
//!
//! Grounded on `payers/bcbs_il.py::Bcbs_IlHandler._parse_complex_structure`.
//! Only the defined complex-structure path is ported; the original's dead
//! `patterns`-referencing branches (mentioned in spec §9's Open Questions)
//! do not appear anywhere in the recovered source, so nothing is invented for
//! them here — this handler preserves only the complex-structure path.

use serde_json::{json, Value};

pub fn adapt(item: &Value) -> Vec<Value> {
    match item.get("negotiated_rates") {
        Some(Value::Number(n)) => vec![json!({
            "billing_code": item.get("billing_code").cloned().unwrap_or(Value::Null),
            "billing_code_type": item.get("billing_code_type").cloned().unwrap_or(Value::Null),
            "description": item.get("description").cloned().unwrap_or(Value::Null),
            "negotiated_rates": [
                { "negotiated_prices": [ { "negotiated_rate": n } ] }
            ],
        })],
        _ => vec![coerce_opaque_provider_references(item)],
    }
}

/// `provider_references` in BCBS-IL's complex structure are bare numeric
/// ids, not dictionaries; store them as opaque strings so the Streaming
/// Parser's normal `provider_references` resolution path treats them as
/// (likely unresolved) reference ids rather than failing to deserialize.
fn coerce_opaque_provider_references(item: &Value) -> Value {
    let mut item = item.clone();
    if let Some(groups) = item.get_mut("negotiated_rates").and_then(Value::as_array_mut) {
        for group in groups.iter_mut() {
            if let Some(refs) = group.get_mut("provider_references").and_then(Value::as_array_mut) {
                for r in refs.iter_mut() {
                    if let Some(n) = r.as_f64() {
                        *r = json!(format!("{n}"));
                    }
                }
            }
        }
    }
    item
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_negotiated_rates_becomes_direct_rate() {
        let item = json!({ "billing_code": "99213", "negotiated_rates": 42.0 });
        let out = adapt(&item);
        assert_eq!(out[0]["negotiated_rates"][0]["negotiated_prices"][0]["negotiated_rate"], json!(42.0));
    }

    #[test]
    fn bare_numeric_provider_reference_ids_become_strings() {
        let item = json!({
            "negotiated_rates": [
                { "provider_references": [1.0, 2.0] }
            ]
        });
        let out = adapt(&item);
        let refs = out[0]["negotiated_rates"][0]["provider_references"].as_array().unwrap();
        assert_eq!(refs[0], json!("1"));
        assert_eq!(refs[1], json!("2"));
    }
}
