//! Centene-family handler.
//!
//! Grounded on `payers/centene.py::CenteneHandler.parse_in_network`, with
//! the additional coercions spec §4.3 lists beyond the Python original
//! (decimal rate, lowercase enums, singleton-wrap fields).

use serde_json::{json, Value};

pub fn adapt(item: &Value) -> Vec<Value> {
    let mut item = item.clone();

    if let Some(rate_groups) = item.get_mut("negotiated_rates").and_then(Value::as_array_mut) {
        for group in rate_groups.iter_mut() {
            // Centene sometimes places bare NPI/TIN directly under
            // provider_groups instead of wrapping them in a providers[] array.
            if let Some(groups) = group.get_mut("provider_groups").and_then(Value::as_array_mut) {
                for pg in groups.iter_mut() {
                    if pg.get("npi").is_some() && pg.get("providers").is_none() {
                        let wrapped = json!({ "providers": [pg.clone()] });
                        *pg = wrapped;
                    }
                }
            }

            if let Some(prices) = group.get_mut("negotiated_prices").and_then(Value::as_array_mut) {
                for price in prices.iter_mut() {
                    coerce_decimal_rate(price);
                    lowercase_field(price, "negotiated_type");
                    singleton_wrap(price, "service_code");
                    singleton_wrap(price, "billing_code_modifier");
                }
            }
        }
    }
    lowercase_field(&mut item, "negotiation_arrangement");

    vec![item]
}

fn coerce_decimal_rate(price: &mut Value) {
    if let Some(Value::String(s)) = price.get("negotiated_rate") {
        if let Ok(parsed) = s.parse::<f64>() {
            price["negotiated_rate"] = json!(parsed);
        }
    }
}

fn lowercase_field(value: &mut Value, field: &str) {
    if let Some(Value::String(s)) = value.get(field) {
        let lower = s.to_lowercase();
        value[field] = json!(lower);
    }
}

fn singleton_wrap(value: &mut Value, field: &str) {
    if let Some(s) = value.get(field).and_then(Value::as_str) {
        let wrapped = json!([s]);
        value[field] = wrapped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_bare_npi_provider_group_in_providers_array() {
        let item = json!({
            "negotiated_rates": [
                { "provider_groups": [ { "npi": "1234567890" } ] }
            ]
        });
        let out = adapt(&item);
        assert_eq!(out.len(), 1);
        let pg = &out[0]["negotiated_rates"][0]["provider_groups"][0];
        assert!(pg["providers"][0]["npi"] == json!("1234567890"));
    }

    #[test]
    fn coerces_string_rate_and_lowercases_type() {
        let item = json!({
            "negotiated_rates": [
                {
                    "negotiated_prices": [
                        { "negotiated_rate": "50.0", "negotiated_type": "NEGOTIATED", "service_code": "11" }
                    ]
                }
            ]
        });
        let out = adapt(&item);
        let price = &out[0]["negotiated_rates"][0]["negotiated_prices"][0];
        assert_eq!(price["negotiated_rate"], json!(50.0));
        assert_eq!(price["negotiated_type"], json!("negotiated"));
        assert_eq!(price["service_code"], json!(["11"]));
    }
}
