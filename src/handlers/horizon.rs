//! Horizon BCBS handler.
//!
//! Grounded on `payers/horizon.py::HorizonHandler`: parses `STATE_AREA`
//! geographic region codes and coerces string TINs to object form.

use serde_json::{json, Value};

pub fn adapt(item: &Value) -> Vec<Value> {
    let mut item = item.clone();

    if let Some(rate_groups) = item.get_mut("negotiated_rates").and_then(Value::as_array_mut) {
        for group in rate_groups.iter_mut() {
            normalize_geographic_data(group);
            normalize_provider_groups(group);
        }
    }

    vec![item]
}

fn normalize_geographic_data(rate_group: &mut Value) {
    if let Some(prices) = rate_group.get_mut("negotiated_prices").and_then(Value::as_array_mut) {
        for price in prices.iter_mut() {
            if let Some(Value::String(region)) = price.get("geographic_region").cloned() {
                price["service_geography"] = json!(parse_region(&region));
                if let Some(obj) = price.as_object_mut() {
                    obj.remove("geographic_region");
                }
            }
            if let Some(Value::String(bc)) = price.get("billing_class") {
                let lower = bc.to_lowercase();
                price["billing_class"] = json!(lower);
            }
        }
    }
}

fn parse_region(region: &str) -> Value {
    match region.split_once('_') {
        Some((state, area)) => json!({
            "state": state,
            "region": area.to_lowercase(),
            "full_code": region,
        }),
        None => json!({
            "state": region,
            "region": "statewide",
            "full_code": region,
        }),
    }
}

fn normalize_provider_groups(rate_group: &mut Value) {
    if let Some(groups) = rate_group.get_mut("provider_groups").and_then(Value::as_array_mut) {
        for pg in groups.iter_mut() {
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
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_state_area_region_code() {
        let item = json!({
            "negotiated_rates": [
                { "negotiated_prices": [ { "geographic_region": "NJ_NORTH" } ] }
            ]
        });
        let out = adapt(&item);
        let geo = &out[0]["negotiated_rates"][0]["negotiated_prices"][0]["service_geography"];
        assert_eq!(geo["state"], json!("NJ"));
        assert_eq!(geo["region"], json!("north"));
        assert_eq!(geo["full_code"], json!("NJ_NORTH"));
    }

    #[test]
    fn statewide_region_without_underscore() {
        assert_eq!(parse_region("NJ")["region"], json!("statewide"));
    }

    #[test]
    fn coerces_string_tin_to_object() {
        let item = json!({
            "negotiated_rates": [
                { "provider_groups": [ { "tin": "12-3456789" } ] }
            ]
        });
        let out = adapt(&item);
        let pg = &out[0]["negotiated_rates"][0]["provider_groups"][0];
        assert_eq!(pg["tin"]["value"], json!("12-3456789"));
    }
}
