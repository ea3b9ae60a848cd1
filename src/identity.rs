//! Deterministic UUID v5 identity assignment (C6).
//!
//! Every identifier is `UUID5(UUID5(DNS, "healthcare.<category>"), content)`
//! where `content` joins its components with `|`. No timestamps, counters, or
//! randomness enter any identity computation, and no process-wide cache is
//! used: identity is a pure function of its inputs.

use uuid::Uuid;

fn namespace(category: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, format!("healthcare.{category}").as_bytes())
}

fn generate(category: &str, components: &[&str]) -> Uuid {
    let content = components.join("|");
    Uuid::new_v5(&namespace(category), content.as_bytes())
}

pub fn payer_uuid(payer_name: &str, parent_org: &str) -> Uuid {
    generate("payers", &[payer_name, parent_org])
}

pub fn organization_uuid(tin: &str, org_name: &str) -> Uuid {
    generate("organizations", &[tin, org_name])
}

pub fn provider_uuid(npi: &str) -> Uuid {
    generate("providers", &[npi])
}

pub fn rate_uuid(
    payer_uuid: &Uuid,
    organization_uuid: &Uuid,
    service_code: &str,
    negotiated_rate: f64,
    expiration_date: &str,
) -> Uuid {
    let rate_str = format!("{negotiated_rate:.2}");
    generate(
        "rates",
        &[
            &payer_uuid.to_string(),
            &organization_uuid.to_string(),
            service_code,
            &rate_str,
            expiration_date,
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payer_uuid_is_deterministic() {
        let a = payer_uuid("Acme Health", "");
        let b = payer_uuid("Acme Health", "");
        assert_eq!(a, b);
    }

    #[test]
    fn different_components_yield_different_uuids() {
        assert_ne!(payer_uuid("Acme Health", ""), payer_uuid("Other Health", ""));
        assert_ne!(organization_uuid("12-3456789", "Acme"), organization_uuid("98-7654321", "Acme"));
        assert_ne!(provider_uuid("1234567890"), provider_uuid("9999999999"));
    }

    #[test]
    fn rate_uuid_is_stable_across_equivalent_rate_formatting() {
        let payer = payer_uuid("Acme", "");
        let org = organization_uuid("12-3456789", "Acme Group");
        let a = rate_uuid(&payer, &org, "99213", 125.0, "9999-12-31");
        let b = rate_uuid(&payer, &org, "99213", 125.00, "9999-12-31");
        assert_eq!(a, b);
    }

    #[test]
    fn rate_uuid_changes_with_rate_value() {
        let payer = payer_uuid("Acme", "");
        let org = organization_uuid("12-3456789", "Acme Group");
        let a = rate_uuid(&payer, &org, "99213", 125.0, "9999-12-31");
        let b = rate_uuid(&payer, &org, "99213", 126.0, "9999-12-31");
        assert_ne!(a, b);
    }

    #[test]
    fn empty_component_is_valid() {
        let with_empty = payer_uuid("Acme", "");
        let with_value = payer_uuid("Acme", "Parent Corp");
        assert_ne!(with_empty, with_value);
    }
}
