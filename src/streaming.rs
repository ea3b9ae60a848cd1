//! Streaming Parser (C4).
//!
//! Generalizes the teacher's whole-document `serde_json::from_reader`
//! parsing (kept in `parser.rs` for the small ToC/AllowedAmount/
//! ProviderReference files) into a true incremental walk over the
//! `in_network` array: a custom `Visitor` drives `serde_json::Deserializer`
//! directly so each in-network item is decoded, flattened into zero or more
//! `RawRateTuple`s, and dropped before the next item is read. Peak heap is
//! O(depth × one in-network item), not O(file size), per spec §4.4's bounded
//! memory contract.

use std::collections::HashMap;
use std::fmt;

use serde::de::{DeserializeSeed, Deserializer as _, MapAccess, SeqAccess, Visitor};
use serde_json::Value;

use crate::error::ParseError;
use crate::handlers::PayerHandler;
use crate::types::{ProviderInfo, RawRateTuple};

/// A resolved entry from the top-level (or out-of-band) provider reference
/// table, keyed by `provider_group_id`.
pub type ProviderTable = HashMap<i64, Value>;

/// Counters incremented for conditions spec §8 treats as silent skips, not
/// errors.
#[derive(Debug, Default, Clone)]
pub struct StreamStats {
    pub items_seen: usize,
    pub tuples_emitted: usize,
    pub skipped_no_rate: usize,
}

/// Parses a single in-network document from `reader`, applying `handler`'s
/// structural adaptation to each item and invoking `emit` once per resulting
/// `RawRateTuple`, in document order. `provider_table` is consulted for
/// `provider_references` resolution; an embedded top-level
/// `provider_references` array is folded into it if encountered before
/// `in_network` in document order (the common case for real TiC files).
pub fn stream_in_network<R, F>(
    reader: R,
    handler: PayerHandler,
    mut provider_table: ProviderTable,
    mut emit: F,
) -> Result<StreamStats, ParseError>
where
    R: std::io::Read,
    F: FnMut(RawRateTuple),
{
    let mut stats = StreamStats::default();
    let mut de = serde_json::Deserializer::from_reader(reader);

    de.deserialize_map(RootVisitor {
        handler,
        provider_table: &mut provider_table,
        stats: &mut stats,
        emit: &mut emit,
    })
    .map_err(ParseError::from)?;

    Ok(stats)
}

/// Returns early (no rows yielded) when the root document's magic key is
/// `allowed_amounts` (out-of-scope per spec §4.4) or when the root is a bare
/// JSON array (treated as a legacy flat list and yielded as-is via `emit`,
/// one raw tuple per element, with no handler adaptation).
struct RootVisitor<'a, F> {
    handler: PayerHandler,
    provider_table: &'a mut ProviderTable,
    stats: &'a mut StreamStats,
    emit: &'a mut F,
}

impl<'de, 'a, F> Visitor<'de> for RootVisitor<'a, F>
where
    F: FnMut(RawRateTuple),
{
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an in-network MRF document")
    }

    fn visit_map<A>(mut self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "allowed_amounts" => {
                    let _ignored: serde::de::IgnoredAny = map.next_value()?;
                    return Ok(());
                }
                "provider_references" => {
                    let entries: Vec<Value> = map.next_value()?;
                    fold_provider_references(self.provider_table, entries);
                }
                "in_network" => {
                    map.next_value_seed(InNetworkSeed {
                        handler: self.handler,
                        provider_table: self.provider_table,
                        stats: self.stats,
                        emit: self.emit,
                    })?;
                }
                _ => {
                    let _ignored: serde::de::IgnoredAny = map.next_value()?;
                }
            }
        }
        Ok(())
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        // Legacy flat-list root: yield each element as-is, one tuple per
        // element, no handler adaptation.
        while let Some(item) = seq.next_element::<Value>()? {
            if let Some(tuple) = tuple_from_price_entry(&item, None) {
                (self.emit)(tuple);
                self.stats.tuples_emitted += 1;
            }
        }
        Ok(())
    }
}

fn fold_provider_references(table: &mut ProviderTable, entries: Vec<Value>) {
    for entry in entries {
        if let Some(id) = entry.get("provider_group_id").and_then(Value::as_i64) {
            table.insert(id, entry);
        }
    }
}

struct InNetworkSeed<'a, F> {
    handler: PayerHandler,
    provider_table: &'a mut ProviderTable,
    stats: &'a mut StreamStats,
    emit: &'a mut F,
}

impl<'de, 'a, F> DeserializeSeed<'de> for InNetworkSeed<'a, F>
where
    F: FnMut(RawRateTuple),
{
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        deserializer.deserialize_seq(InNetworkSeqVisitor {
            handler: self.handler,
            provider_table: self.provider_table,
            stats: self.stats,
            emit: self.emit,
        })
    }
}

struct InNetworkSeqVisitor<'a, F> {
    handler: PayerHandler,
    provider_table: &'a mut ProviderTable,
    stats: &'a mut StreamStats,
    emit: &'a mut F,
}

impl<'de, 'a, F> Visitor<'de> for InNetworkSeqVisitor<'a, F>
where
    F: FnMut(RawRateTuple),
{
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("the in_network array")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        // Each element is fully materialized (one in-network item — bounded
        // size) then immediately processed and dropped; the array itself is
        // never collected into a Vec.
        while let Some(raw_item) = seq.next_element::<Value>()? {
            self.stats.items_seen += 1;
            for adapted in self.handler.adapt_in_network(&raw_item) {
                process_in_network_item(&adapted, self.provider_table, self.stats, self.emit);
            }
        }
        Ok(())
    }
}

fn process_in_network_item(
    item: &Value,
    provider_table: &ProviderTable,
    stats: &mut StreamStats,
    emit: &mut impl FnMut(RawRateTuple),
) {
    let billing_code = item.get("billing_code").and_then(Value::as_str).unwrap_or("").to_string();
    let billing_code_type = item
        .get("billing_code_type")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let description = item.get("description").and_then(Value::as_str).unwrap_or("").to_string();

    let empty = Vec::new();
    let rate_groups = item.get("negotiated_rates").and_then(Value::as_array).unwrap_or(&empty);

    for group in rate_groups {
        let prices = group.get("negotiated_prices").and_then(Value::as_array).cloned().unwrap_or_default();

        for price in &prices {
            let negotiated_rate = price.get("negotiated_rate").and_then(Value::as_f64);
            if negotiated_rate.is_none() {
                stats.skipped_no_rate += 1;
                continue;
            }

            let service_codes = service_codes_of(price);
            let billing_class = price.get("billing_class").and_then(Value::as_str).unwrap_or("").to_string();
            let negotiated_type = price.get("negotiated_type").and_then(Value::as_str).unwrap_or("").to_string();
            let expiration_date = price.get("expiration_date").and_then(Value::as_str).map(str::to_string);

            let base = RawRateTuple {
                billing_code: billing_code.clone(),
                billing_code_type: billing_code_type.clone(),
                description: description.clone(),
                negotiated_rate,
                service_codes,
                billing_class,
                negotiated_type,
                expiration_date,
                provider_info: None,
                missing_provider_ref: false,
            };

            for tuple in provider_tuples(group, provider_table, &base) {
                emit(tuple);
                stats.tuples_emitted += 1;
            }
        }
    }
}

fn service_codes_of(price: &Value) -> Vec<String> {
    match price.get("service_code") {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        _ => Vec::new(),
    }
}

/// Applies the emission rules of spec §4.4 to one rate group, given a
/// template tuple with provider_info left unset.
///
/// `provider_groups` takes priority over a group-level `provider_references`
/// array: a hybrid group (both present, as Aetna emits) merges the embedded
/// group's own npi/tin with the name/tin resolved from the positionally- or
/// explicitly-aligned reference table entry, rather than letting the
/// reference branch discard the embedded provider.
fn provider_tuples(group: &Value, table: &ProviderTable, template: &RawRateTuple) -> Vec<RawRateTuple> {
    if let Some(groups) = group.get("provider_groups").and_then(Value::as_array) {
        let refs = group.get("provider_references").and_then(Value::as_array);
        let mut out = Vec::new();
        for (i, pg) in groups.iter().enumerate() {
            let reference = resolve_group_reference(pg, refs, i, table);
            if let Some(providers) = pg.get("providers").and_then(Value::as_array) {
                for p in providers {
                    let info = merge_provider_info(provider_info_from_value(p), reference.clone());
                    out.push(tuple_with_provider(template, info));
                }
            } else {
                let info = merge_provider_info(provider_info_from_value(pg), reference);
                out.push(tuple_with_provider(template, info));
            }
        }
        return out;
    }

    if let Some(refs) = group.get("provider_references").and_then(Value::as_array) {
        let mut out = Vec::with_capacity(refs.len());
        for r in refs {
            match resolve_ref_value(r, table) {
                Some(info) => out.push(tuple_with_provider(template, info)),
                None => {
                    let mut t = template.clone();
                    t.missing_provider_ref = true;
                    out.push(t);
                }
            }
        }
        return out;
    }

    vec![template.clone()]
}

/// Resolves the reference table entry for one embedded provider group: its
/// own `provider_reference_id` (set by a handler like Aetna's) if present,
/// otherwise the group-level `provider_references` entry at the same index.
fn resolve_group_reference(pg: &Value, refs: Option<&Vec<Value>>, index: usize, table: &ProviderTable) -> Option<ProviderInfo> {
    if let Some(rid) = pg.get("provider_reference_id") {
        if let Some(info) = resolve_ref_value(rid, table) {
            return Some(info);
        }
    }
    refs.and_then(|r| r.get(index)).and_then(|r| resolve_ref_value(r, table))
}

fn resolve_ref_value(r: &Value, table: &ProviderTable) -> Option<ProviderInfo> {
    let id = r.as_i64().or_else(|| r.as_str().and_then(|s| s.parse().ok()))?;
    table.get(&id).map(provider_info_from_value)
}

/// Combines an embedded group's own provider info with a resolved reference
/// entry's, preferring the embedded values and falling back to the
/// reference's only where the embedded side is empty.
fn merge_provider_info(primary: ProviderInfo, reference: Option<ProviderInfo>) -> ProviderInfo {
    match reference {
        None => primary,
        Some(r) => ProviderInfo {
            npi: if primary.npi.is_empty() { r.npi } else { primary.npi },
            tin: primary.tin.or(r.tin),
            provider_name: primary.provider_name.or(r.provider_name),
        },
    }
}

fn tuple_with_provider(template: &RawRateTuple, info: ProviderInfo) -> RawRateTuple {
    let mut t = template.clone();
    t.provider_info = Some(info);
    t
}

fn provider_info_from_value(v: &Value) -> ProviderInfo {
    let npi = match v.get("npi") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|x| x.as_i64().map(|n| n.to_string()).or_else(|| x.as_str().map(str::to_string)))
            .collect(),
        Some(Value::Number(n)) => vec![n.to_string()],
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    };

    let tin = match v.get("tin") {
        Some(Value::Object(_)) => v.get("tin").and_then(|t| t.get("value")).and_then(Value::as_str).map(str::to_string),
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    };

    // Aetna's hybrid normalization fills a synthesized `providers[]` entry's
    // name with "" rather than omitting it; treat blank the same as absent so
    // the reference-table merge can still fall back to a resolved name.
    let provider_name = v
        .get("provider_group_name")
        .or_else(|| v.get("provider_name"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    ProviderInfo { npi, tin, provider_name }
}

/// Used only for the legacy flat-array root shape, where each element is a
/// pre-flattened record (no `negotiated_rates` nesting).
fn tuple_from_price_entry(item: &Value, table: Option<&ProviderTable>) -> Option<RawRateTuple> {
    let _ = table;
    let negotiated_rate = item.get("negotiated_rate").and_then(Value::as_f64);
    Some(RawRateTuple {
        billing_code: item.get("billing_code").and_then(Value::as_str).unwrap_or("").to_string(),
        billing_code_type: item.get("billing_code_type").and_then(Value::as_str).unwrap_or("").to_string(),
        description: item.get("description").and_then(Value::as_str).unwrap_or("").to_string(),
        negotiated_rate,
        service_codes: service_codes_of(item),
        billing_class: item.get("billing_class").and_then(Value::as_str).unwrap_or("").to_string(),
        negotiated_type: item.get("negotiated_type").and_then(Value::as_str).unwrap_or("").to_string(),
        expiration_date: item.get("expiration_date").and_then(Value::as_str).map(str::to_string),
        provider_info: item.get("provider_info").map(provider_info_from_value),
        missing_provider_ref: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(json: &str, handler: PayerHandler) -> (Vec<RawRateTuple>, StreamStats) {
        let mut rows = Vec::new();
        let stats = stream_in_network(json.as_bytes(), handler, ProviderTable::new(), |t| rows.push(t)).unwrap();
        (rows, stats)
    }

    #[test_log::test]
    fn scenario_1_single_item_one_rate_one_provider_group() {
        let json = r#"{
            "in_network": [
                {
                    "billing_code": "99213",
                    "billing_code_type": "CPT",
                    "negotiated_rates": [
                        {
                            "provider_groups": [ { "npi": "1234567890", "tin": "12-3456789" } ],
                            "negotiated_prices": [ { "negotiated_rate": 125.00, "billing_class": "professional", "service_code": "11" } ]
                        }
                    ]
                }
            ]
        }"#;
        let (rows, stats) = run(json, PayerHandler::Default);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].service_codes, vec!["11".to_string()]);
        assert_eq!(rows[0].negotiated_rate, Some(125.0));
        assert_eq!(stats.tuples_emitted, 1);
    }

    #[test]
    fn scenario_5_null_rate_is_skipped_not_fatal() {
        let json = r#"{
            "in_network": [
                { "billing_code": "A", "negotiated_rates": [ { "negotiated_prices": [ { "negotiated_rate": 10.0 } ] } ] },
                { "billing_code": "B", "negotiated_rates": [ { "negotiated_prices": [ { "negotiated_rate": null } ] } ] },
                { "billing_code": "C", "negotiated_rates": [ { "negotiated_prices": [ { "negotiated_rate": 20.0 } ] } ] }
            ]
        }"#;
        let (rows, stats) = run(json, PayerHandler::Default);
        assert_eq!(rows.len(), 2);
        assert_eq!(stats.skipped_no_rate, 1);
    }

    #[test]
    fn allowed_amounts_root_yields_nothing() {
        let json = r#"{ "allowed_amounts": [ { "foo": "bar" } ] }"#;
        let (rows, _stats) = run(json, PayerHandler::Default);
        assert!(rows.is_empty());
    }

    #[test]
    fn scenario_4_provider_reference_merge() {
        // Aetna-shape item: embedded provider_groups carries the npi, a
        // sibling provider_references array names the same group by id, and
        // the top-level reference table resolves that id to a name. Both
        // must survive into the emitted row.
        let json = r#"{
            "provider_references": [ { "provider_group_id": 42, "provider_group_name": "Acme Group" } ],
            "in_network": [
                {
                    "billing_code": "99213",
                    "negotiated_rates": [
                        {
                            "provider_groups": [ { "npi": "1111111111" } ],
                            "provider_references": [42],
                            "negotiated_prices": [ { "negotiated_rate": 75.0, "service_code": "11" } ]
                        }
                    ]
                }
            ]
        }"#;
        let (rows, _stats) = run(json, PayerHandler::Aetna);
        assert_eq!(rows.len(), 1);
        let info = rows[0].provider_info.as_ref().unwrap();
        assert_eq!(info.npi, vec!["1111111111".to_string()]);
        assert_eq!(info.provider_name.as_deref(), Some("Acme Group"));
        assert!(!rows[0].missing_provider_ref);
    }

    #[test]
    fn unresolved_provider_reference_is_flagged_not_dropped() {
        let json = r#"{
            "in_network": [
                {
                    "billing_code": "99213",
                    "negotiated_rates": [
                        {
                            "provider_references": [999],
                            "negotiated_prices": [ { "negotiated_rate": 75.0 } ]
                        }
                    ]
                }
            ]
        }"#;
        let (rows, _stats) = run(json, PayerHandler::Default);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].missing_provider_ref);
        assert!(rows[0].provider_info.is_none());
    }
}
