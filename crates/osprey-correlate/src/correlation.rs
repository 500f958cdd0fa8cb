//! Cross-record correlations for a target.
//!
//! Correlations are currently drawn from the "Domain" record. Fields that are
//! missing, empty or of an unexpected shape are treated as absent; nothing in
//! here fails.

use osprey_core::{title_case, ScanCategory, Target};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Registration record fields that describe the registrant.
const REGISTRANT_FIELDS: &[&str] = &[
    "name",
    "org",
    "organization",
    "address",
    "city",
    "state",
    "zipcode",
    "zip",
    "country",
];

/// Identifiers shared between a target's records.
///
/// Empty fields are left out when serialized, so an empty set serializes as
/// `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationSet {
    /// Contact addresses, deduplicated and sorted
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub emails: BTreeSet<String>,
    /// Registrant details keyed by title-cased field name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub registrant_info: BTreeMap<String, Value>,
    /// Registrar name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registrar: Option<String>,
    /// Lower-cased name servers, deduplicated and sorted
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub name_servers: BTreeSet<String>,
}

impl CorrelationSet {
    /// True when no correlation of any kind was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
            && self.registrant_info.is_empty()
            && self.registrar.is_none()
            && self.name_servers.is_empty()
    }

    /// The registrant's name, if the record had one.
    #[must_use]
    pub fn registrant_name(&self) -> Option<String> {
        self.registrant_info.get("Name").and_then(display_string)
    }
}

/// Find correlations in `target`'s records.
#[must_use]
pub fn find_correlations(target: &Target) -> CorrelationSet {
    let mut set = CorrelationSet::default();

    let Some(domain) = target
        .record(&ScanCategory::Domain)
        .and_then(Value::as_object)
    else {
        debug!(target = %target.name(), "no domain record to correlate");
        return set;
    };

    collect_domain(domain, &mut set);
    debug!(
        target = %target.name(),
        emails = set.emails.len(),
        name_servers = set.name_servers.len(),
        registrant_fields = set.registrant_info.len(),
        has_registrar = set.registrar.is_some(),
        "found correlations"
    );
    set
}

fn collect_domain(record: &Map<String, Value>, set: &mut CorrelationSet) {
    if let Some(emails) = record.get("emails") {
        set.emails.extend(strings(emails).map(str::to_string));
    }

    for field in REGISTRANT_FIELDS {
        if let Some(value) = record.get(*field).filter(|v| is_present(v)) {
            set.registrant_info.insert(title_case(field), value.clone());
        }
    }

    set.registrar = record.get("registrar").and_then(registrar);

    if let Some(name_servers) = record.get("name_servers") {
        set.name_servers
            .extend(strings(name_servers).map(str::to_lowercase));
    }
}

/// Non-empty trimmed strings from a string or an array of strings.
fn strings(value: &Value) -> Box<dyn Iterator<Item = &str> + '_> {
    fn non_empty(s: &str) -> Option<&str> {
        let s = s.trim();
        (!s.is_empty()).then_some(s)
    }

    match value {
        Value::String(s) => Box::new(non_empty(s).into_iter()),
        Value::Array(items) => Box::new(
            items
                .iter()
                .filter_map(Value::as_str)
                .filter_map(non_empty),
        ),
        _ => Box::new(std::iter::empty()),
    }
}

/// The registrar string as written, or the first non-blank one of a list.
fn registrar(value: &Value) -> Option<String> {
    let not_blank = |s: &&str| !s.trim().is_empty();
    let name = match value {
        Value::String(s) => Some(s.as_str()).filter(not_blank),
        Value::Array(items) => items.iter().filter_map(Value::as_str).find(not_blank),
        _ => None,
    };
    name.map(str::to_string)
}

/// Null, `false`, zero and empty strings, arrays and objects count as absent.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// A value as a single display string, joining arrays with ", ".
pub(crate) fn display_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(display_string).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osprey_core::TargetName;
    use serde_json::json;

    fn domain_target(record: Value) -> Target {
        let mut target = Target::new(TargetName::new("example.com").expect("valid"));
        target.insert(ScanCategory::Domain, record);
        target
    }

    #[test]
    fn test_scenario_correlations() {
        let target = domain_target(json!({
            "emails": ["b@x.com", "a@x.com"],
            "registrar": "ACME",
            "name_servers": "ns1.x.com"
        }));
        let set = find_correlations(&target);

        assert_eq!(
            serde_json::to_value(&set).expect("serialize"),
            json!({
                "emails": ["a@x.com", "b@x.com"],
                "registrar": "ACME",
                "name_servers": ["ns1.x.com"]
            })
        );
    }

    #[test]
    fn test_single_email_string() {
        let set = find_correlations(&domain_target(json!({ "emails": "admin@example.com" })));
        assert_eq!(
            set.emails.into_iter().collect::<Vec<_>>(),
            vec!["admin@example.com"]
        );
    }

    #[test]
    fn test_name_servers_are_case_folded_and_sorted() {
        let set = find_correlations(&domain_target(json!({
            "name_servers": ["NS2.EXAMPLE.COM", "ns1.example.com", "ns2.example.com", " Ns1.Example.com "]
        })));
        assert_eq!(
            set.name_servers.into_iter().collect::<Vec<_>>(),
            vec!["ns1.example.com", "ns2.example.com"]
        );
    }

    #[test]
    fn test_duplicate_emails_collapse() {
        let set = find_correlations(&domain_target(json!({
            "emails": ["b@x.com", "a@x.com", "b@x.com", "", "  "]
        })));
        assert_eq!(
            set.emails.into_iter().collect::<Vec<_>>(),
            vec!["a@x.com", "b@x.com"]
        );
    }

    #[test]
    fn test_registrant_fields() {
        let set = find_correlations(&domain_target(json!({
            "name": "Jane Doe",
            "org": "Example Org",
            "city": "Springfield",
            "state": "",
            "zipcode": null,
            "country": "US",
            "address": ["1 Main St", "Suite 2"]
        })));

        assert_eq!(
            set.registrant_info.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["Address", "City", "Country", "Name", "Org"]
        );
        assert_eq!(set.registrant_info["Address"], json!(["1 Main St", "Suite 2"]));
        assert_eq!(set.registrant_name().as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn test_registrant_aliases() {
        let set = find_correlations(&domain_target(json!({
            "organization": "Example Org",
            "zip": "62701"
        })));
        assert_eq!(set.registrant_info["Organization"], json!("Example Org"));
        assert_eq!(set.registrant_info["Zip"], json!("62701"));
        assert_eq!(set.registrant_name(), None);
    }

    #[test]
    fn test_empty_record_is_empty() {
        let set = find_correlations(&domain_target(json!({})));
        assert!(set.is_empty());
        assert_eq!(serde_json::to_value(&set).expect("serialize"), json!({}));
    }

    #[test]
    fn test_target_without_domain_record() {
        let mut target = Target::new(TargetName::new("octocat").expect("valid"));
        target.insert(ScanCategory::Username, json!(["https://github.com/octocat"]));
        assert!(find_correlations(&target).is_empty());
    }

    #[test]
    fn test_wrong_shapes_are_ignored() {
        let set = find_correlations(&domain_target(json!({
            "emails": 42,
            "registrar": { "name": "ACME" },
            "name_servers": [1, null, "ns1.x.com"],
            "name": false
        })));
        assert!(set.emails.is_empty());
        assert_eq!(set.registrar, None);
        assert_eq!(
            set.name_servers.into_iter().collect::<Vec<_>>(),
            vec!["ns1.x.com"]
        );
        assert!(set.registrant_info.is_empty());

        assert!(find_correlations(&domain_target(json!("not an object"))).is_empty());
    }

    #[test]
    fn test_registrar_list_takes_first_name() {
        let set = find_correlations(&domain_target(json!({
            "registrar": ["", "ACME Registrar, Inc.", "ACME"]
        })));
        assert_eq!(set.registrar.as_deref(), Some("ACME Registrar, Inc."));
    }

    #[test]
    fn test_registrar_is_copied_verbatim() {
        let set = find_correlations(&domain_target(json!({ "registrar": "  ACME Inc. " })));
        assert_eq!(set.registrar.as_deref(), Some("  ACME Inc. "));

        let set = find_correlations(&domain_target(json!({ "registrar": ["   ", " Gandi "] })));
        assert_eq!(set.registrar.as_deref(), Some(" Gandi "));

        let set = find_correlations(&domain_target(json!({ "registrar": "   " })));
        assert_eq!(set.registrar, None);
    }
}
