//! Domain registration and network ownership lookups over RDAP.
//!
//! RDAP responses are flattened into whois-style key/value records so the
//! correlation engine can read `emails`, `registrar`, `name_servers` and the
//! registrant fields without knowing the protocol.

use crate::collector::RecordLookup;
use crate::error::{CollectorError, Result};
use crate::http::{check_status, client_from_config};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use osprey_core::AppConfig;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::net::IpAddr;
use tracing::{debug, info};

/// RDAP-backed lookup for the "Domain" category.
#[derive(Debug, Clone)]
pub struct RdapDomainLookup {
    client: Client,
    endpoint: String,
}

impl RdapDomainLookup {
    /// Create a lookup against `endpoint` (the domain is appended).
    #[must_use]
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Create a lookup from application config.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            client_from_config(&config.scanning)?,
            config.rdap.domain_endpoint.clone(),
        ))
    }
}

#[async_trait]
impl RecordLookup for RdapDomainLookup {
    async fn lookup(&self, target: &str) -> Result<Value> {
        let domain = normalize_domain(target)?;
        let url = format!("{}{domain}", self.endpoint);
        info!(%domain, "querying RDAP for domain");

        let response = self.client.get(&url).send().await?;
        let response = check_status(response, "rdap", &domain)?;
        let body: Value = response.json().await?;
        parse_domain_response(&body)
    }

    fn name(&self) -> &str {
        "rdap-domain"
    }
}

/// RDAP-backed lookup for the "IP Address" category.
#[derive(Debug, Clone)]
pub struct RdapIpLookup {
    client: Client,
    endpoint: String,
}

impl RdapIpLookup {
    /// Create a lookup against `endpoint` (the address is appended).
    #[must_use]
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Create a lookup from application config.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            client_from_config(&config.scanning)?,
            config.rdap.ip_endpoint.clone(),
        ))
    }
}

#[async_trait]
impl RecordLookup for RdapIpLookup {
    async fn lookup(&self, target: &str) -> Result<Value> {
        let address = parse_public_ip(target)?;
        let url = format!("{}{address}", self.endpoint);
        info!(%address, "querying RDAP for IP address");

        let response = self.client.get(&url).send().await?;
        let response = check_status(response, "rdap", &address.to_string())?;
        let body: Value = response.json().await?;
        parse_ip_response(&body)
    }

    fn name(&self) -> &str {
        "rdap-ip"
    }
}

fn normalize_domain(target: &str) -> Result<String> {
    let domain = target.trim().trim_end_matches('.').to_lowercase();
    if domain.is_empty() {
        return Err(CollectorError::invalid_target(target, "empty domain"));
    }
    if !domain.contains('.') {
        return Err(CollectorError::invalid_target(target, "domain needs a TLD"));
    }
    if domain
        .chars()
        .any(|c| c.is_whitespace() || c == '/' || c == '@' || c == ':')
    {
        return Err(CollectorError::invalid_target(
            target,
            "not a bare domain name",
        ));
    }
    Ok(domain)
}

/// Parse `target` as an IP address that a public registry can know about.
pub(crate) fn parse_public_ip(target: &str) -> Result<IpAddr> {
    let address: IpAddr = target
        .trim()
        .parse()
        .map_err(|_| CollectorError::invalid_target(target, "not an IP address"))?;

    let reserved = match address {
        IpAddr::V4(v4) => {
            if v4.is_private() {
                Some("private address")
            } else if v4.is_loopback() {
                Some("loopback address")
            } else if v4.is_link_local() {
                Some("link-local address")
            } else if v4.is_unspecified() || v4.is_broadcast() {
                Some("unroutable address")
            } else if v4.is_multicast() {
                Some("multicast address")
            } else if v4.is_documentation() {
                Some("documentation address")
            } else {
                None
            }
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            if v6.is_loopback() {
                Some("loopback address")
            } else if v6.is_unspecified() {
                Some("unroutable address")
            } else if v6.is_multicast() {
                Some("multicast address")
            } else if first & 0xfe00 == 0xfc00 {
                Some("unique local address")
            } else if first & 0xffc0 == 0xfe80 {
                Some("link-local address")
            } else {
                None
            }
        }
    };

    match reserved {
        Some(reason) => Err(CollectorError::invalid_target(target, reason)),
        None => Ok(address),
    }
}

/// Flatten an RDAP domain object into a whois-style record.
pub fn parse_domain_response(body: &Value) -> Result<Value> {
    let object = body
        .as_object()
        .ok_or_else(|| CollectorError::malformed("rdap", "domain response is not an object"))?;

    let mut record = Map::new();

    if let Some(name) = str_field(object, "ldhName").or_else(|| str_field(object, "unicodeName")) {
        record.insert("domain_name".to_string(), json!(name.to_lowercase()));
    }

    let status = string_array(object.get("status"));
    if !status.is_empty() {
        record.insert("status".to_string(), json!(status));
    }

    insert_events(
        object,
        &mut record,
        &[
            ("registration", "creation_date"),
            ("expiration", "expiration_date"),
            ("last changed", "updated_date"),
        ],
    );

    let name_servers: Vec<String> = object
        .get("nameservers")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|ns| ns.get("ldhName").and_then(Value::as_str))
        .map(str::to_lowercase)
        .collect();
    if !name_servers.is_empty() {
        record.insert("name_servers".to_string(), json!(name_servers));
    }

    let mut emails = Vec::new();
    for entity in flatten_entities(object.get("entities")) {
        let card = VCard::from_entity(entity);
        for email in &card.emails {
            if !emails.contains(email) {
                emails.push(email.clone());
            }
        }

        let roles = roles(entity);
        if roles.iter().any(|r| r == "registrar") && !record.contains_key("registrar") {
            if let Some(name) = card.full_name.clone().or_else(|| card.org.clone()) {
                record.insert("registrar".to_string(), json!(name));
            }
            if let Some(iana_id) = iana_registrar_id(entity) {
                record.insert("registrar_iana_id".to_string(), json!(iana_id));
            }
        }

        if roles.iter().any(|r| r == "registrant") && !record.contains_key("name") {
            insert_opt(&mut record, "name", card.full_name.clone());
            insert_opt(&mut record, "org", card.org.clone());
            if let Some(adr) = &card.address {
                insert_opt(&mut record, "address", adr.street.clone());
                insert_opt(&mut record, "city", adr.city.clone());
                insert_opt(&mut record, "state", adr.state.clone());
                insert_opt(&mut record, "zipcode", adr.zipcode.clone());
                insert_opt(&mut record, "country", adr.country.clone());
            }
        }
    }
    if !emails.is_empty() {
        record.insert("emails".to_string(), json!(emails));
    }

    debug!(fields = record.len(), "parsed RDAP domain response");
    Ok(Value::Object(record))
}

/// Flatten an RDAP IP network object into a key/value record.
pub fn parse_ip_response(body: &Value) -> Result<Value> {
    let object = body
        .as_object()
        .ok_or_else(|| CollectorError::malformed("rdap", "ip response is not an object"))?;

    let mut record = Map::new();
    for (rdap_key, key) in [
        ("handle", "handle"),
        ("name", "name"),
        ("type", "type"),
        ("country", "country"),
        ("parentHandle", "parent_handle"),
        ("startAddress", "start_address"),
        ("endAddress", "end_address"),
        ("ipVersion", "ip_version"),
    ] {
        insert_opt(&mut record, key, str_field(object, rdap_key).map(str::to_string));
    }

    let cidrs: Vec<String> = object
        .get("cidr0_cidrs")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|c| {
            let prefix = c
                .get("v4prefix")
                .or_else(|| c.get("v6prefix"))
                .and_then(Value::as_str)?;
            let length = c.get("length").and_then(Value::as_u64)?;
            Some(format!("{prefix}/{length}"))
        })
        .collect();
    if !cidrs.is_empty() {
        record.insert("cidr".to_string(), json!(cidrs.join(", ")));
    } else if let (Some(start), Some(end)) = (
        str_field(object, "startAddress"),
        str_field(object, "endAddress"),
    ) {
        record.insert("cidr".to_string(), json!(format!("{start} - {end}")));
    }

    insert_events(
        object,
        &mut record,
        &[
            ("registration", "registration_date"),
            ("last changed", "last_changed_date"),
        ],
    );

    let mut emails = Vec::new();
    let mut entities = Vec::new();
    for entity in flatten_entities(object.get("entities")) {
        let card = VCard::from_entity(entity);
        for email in &card.emails {
            if !emails.contains(email) {
                emails.push(email.clone());
            }
        }

        let mut summary = Map::new();
        insert_opt(&mut summary, "handle", str_field_of(entity, "handle"));
        insert_opt(&mut summary, "name", card.full_name.clone().or(card.org.clone()));
        let roles = roles(entity);
        if !roles.is_empty() {
            summary.insert("roles".to_string(), json!(roles));
        }
        if !summary.is_empty() {
            entities.push(Value::Object(summary));
        }
    }
    if !emails.is_empty() {
        record.insert("emails".to_string(), json!(emails));
    }
    if !entities.is_empty() {
        record.insert("entities".to_string(), Value::Array(entities));
    }

    debug!(fields = record.len(), "parsed RDAP ip response");
    Ok(Value::Object(record))
}

fn str_field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn str_field_of(value: &Value, key: &str) -> Option<String> {
    value
        .as_object()
        .and_then(|o| str_field(o, key))
        .map(str::to_string)
}

fn string_array(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

fn roles(entity: &Value) -> Vec<String> {
    string_array(entity.get("roles"))
}

fn insert_opt(record: &mut Map<String, Value>, key: &str, value: Option<String>) {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        record.insert(key.to_string(), json!(value));
    }
}

/// Copy RDAP events into `record`, normalizing dates to RFC 3339 UTC.
fn insert_events(object: &Map<String, Value>, record: &mut Map<String, Value>, mapping: &[(&str, &str)]) {
    let Some(events) = object.get("events").and_then(Value::as_array) else {
        return;
    };
    for event in events {
        let action = event.get("eventAction").and_then(Value::as_str);
        let date = event.get("eventDate").and_then(Value::as_str);
        let (Some(action), Some(date)) = (action, date) else {
            continue;
        };
        if let Some((_, key)) = mapping.iter().find(|(a, _)| *a == action) {
            record.insert((*key).to_string(), json!(normalize_date(date)));
        }
    }
}

fn normalize_date(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc).to_rfc3339())
        .unwrap_or_else(|_| raw.to_string())
}

/// Depth-first list of an entity tree (registrars nest abuse contacts).
fn flatten_entities(entities: Option<&Value>) -> Vec<&Value> {
    let mut out = Vec::new();
    let mut stack: Vec<&Value> = entities
        .and_then(Value::as_array)
        .map(|a| a.iter().rev().collect())
        .unwrap_or_default();
    while let Some(entity) = stack.pop() {
        out.push(entity);
        if let Some(children) = entity.get("entities").and_then(Value::as_array) {
            stack.extend(children.iter().rev());
        }
    }
    out
}

fn iana_registrar_id(entity: &Value) -> Option<String> {
    entity
        .get("publicIds")
        .and_then(Value::as_array)?
        .iter()
        .find(|id| id.get("type").and_then(Value::as_str) == Some("IANA Registrar ID"))
        .and_then(|id| id.get("identifier"))
        .and_then(|id| match id {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

#[derive(Debug, Default)]
struct PostalAddress {
    street: Option<String>,
    city: Option<String>,
    state: Option<String>,
    zipcode: Option<String>,
    country: Option<String>,
}

/// The parts of a jCard (RFC 7095) we care about.
#[derive(Debug, Default)]
struct VCard {
    full_name: Option<String>,
    org: Option<String>,
    emails: Vec<String>,
    address: Option<PostalAddress>,
}

impl VCard {
    fn from_entity(entity: &Value) -> Self {
        let mut card = Self::default();
        let Some(properties) = entity
            .get("vcardArray")
            .and_then(Value::as_array)
            .and_then(|a| a.get(1))
            .and_then(Value::as_array)
        else {
            return card;
        };

        for property in properties {
            let Some(parts) = property.as_array() else {
                continue;
            };
            let name = parts.first().and_then(Value::as_str).unwrap_or_default();
            let params = parts.get(1);
            let value = parts.get(3);
            match name {
                "fn" => card.full_name = value.and_then(first_text),
                "org" => card.org = value.and_then(first_text),
                "email" => {
                    if let Some(email) = value.and_then(first_text) {
                        card.emails.push(email.to_lowercase());
                    }
                }
                "adr" => card.address = Some(parse_adr(params, value)),
                _ => {}
            }
        }
        card
    }
}

fn first_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Array(items) => items.iter().find_map(first_text),
        _ => None,
    }
}

fn joined_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        _ => None,
    }
}

fn parse_adr(params: Option<&Value>, value: Option<&Value>) -> PostalAddress {
    let components = value.and_then(Value::as_array);
    let component = |index: usize| joined_text(components.and_then(|c| c.get(index)));

    let country = component(6).or_else(|| {
        params
            .and_then(|p| p.get("cc"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });

    PostalAddress {
        street: component(2),
        city: component(3),
        state: component(4),
        zipcode: component(5),
        country,
    }
}
