//! Shared types used across Osprey.
//!
//! This module defines the target/record data model that the scanner, the
//! identity store and the correlation engine all exchange.

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Newtype for target names with validation.
///
/// Names are case-sensitive and are also used as storage keys, so they must
/// not be blank and must not contain path separators or `..`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetName(String);

impl TargetName {
    /// Create a new `TargetName`.
    ///
    /// # Errors
    /// Returns error if the name is blank or would escape its storage directory.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(name: &str) -> Result<(), ValidationError> {
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyTargetName);
        }

        let reason = if name.contains('/') || name.contains('\\') {
            Some("must not contain path separators")
        } else if name.contains("..") {
            Some("must not contain '..'")
        } else if name.starts_with('.') {
            Some("must not start with '.'")
        } else if name.chars().any(char::is_control) {
            Some("must not contain control characters")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(ValidationError::InvalidTargetName {
                name: name.to_string(),
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }
}

impl fmt::Display for TargetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for TargetName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TargetName> for String {
    fn from(name: TargetName) -> Self {
        name.0
    }
}

impl FromStr for TargetName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Kind of scan that produced a record.
///
/// Each category has a human label (`"IP Address"`) and a storage key
/// (`"ip_address"`). The two are interchangeable through
/// [`ScanCategory::storage_key`] and [`ScanCategory::from_storage_key`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ScanCategory {
    /// Account existence across many sites
    Username,
    /// Domain registration record
    Domain,
    /// Network block ownership record
    IpAddress,
    /// Enriched profiles of discovered accounts
    Profiles,
    /// A persisted category this build does not know how to scan
    Other(String),
}

impl ScanCategory {
    /// Categories that have a lookup strategy.
    #[must_use]
    pub fn scannable() -> [Self; 3] {
        [Self::Username, Self::Domain, Self::IpAddress]
    }

    /// Human-readable label.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Username => "Username",
            Self::Domain => "Domain",
            Self::IpAddress => "IP Address",
            Self::Profiles => "Profiles",
            Self::Other(label) => label,
        }
    }

    /// Storage key: lower-case label with spaces replaced by underscores.
    #[must_use]
    pub fn storage_key(&self) -> String {
        match self {
            Self::Username => "username".to_string(),
            Self::Domain => "domain".to_string(),
            Self::IpAddress => "ip_address".to_string(),
            Self::Profiles => "profiles".to_string(),
            Self::Other(label) => label.trim().to_lowercase().replace([' ', '-'], "_"),
        }
    }

    /// Inverse of [`storage_key`](Self::storage_key).
    #[must_use]
    pub fn from_storage_key(key: &str) -> Self {
        match key {
            "username" => Self::Username,
            "domain" => Self::Domain,
            "ip_address" => Self::IpAddress,
            "profiles" => Self::Profiles,
            other => Self::Other(title_case(&other.replace('_', " "))),
        }
    }

    /// Parse a user-supplied label leniently (`"ip"`, `"IP Address"`, `"ip_address"`).
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let normalized = label.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "username" | "user" => Self::Username,
            "domain" | "whois" => Self::Domain,
            "ip_address" | "ip" => Self::IpAddress,
            "profiles" | "profile" => Self::Profiles,
            _ => Self::Other(title_case(label.trim())),
        }
    }

    /// Whether the lookup iterates many independent sub-sources.
    #[must_use]
    pub fn is_enumerable(&self) -> bool {
        matches!(self, Self::Username)
    }
}

impl fmt::Display for ScanCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for ScanCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ValidationError::EmptyCategory);
        }
        Ok(Self::from_label(s))
    }
}

impl From<String> for ScanCategory {
    fn from(value: String) -> Self {
        Self::from_label(&value)
    }
}

impl From<ScanCategory> for String {
    fn from(category: ScanCategory) -> Self {
        category.label().to_string()
    }
}

/// Title-case every word: first letter upper-case, the rest lower-case.
#[must_use]
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_letter = false;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if prev_is_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(ch);
            prev_is_letter = false;
        }
    }
    out
}

/// Convert any serializable value into a record payload.
///
/// `chrono` timestamps serialize as ISO-8601 strings, so the resulting
/// document only ever contains primitives, arrays and string-keyed objects.
///
/// # Errors
/// Returns [`ValidationError::Payload`] if the value has no JSON form
/// (for example a map with non-string keys).
pub fn to_payload<T: Serialize + ?Sized>(value: &T) -> Result<Value, ValidationError> {
    Ok(serde_json::to_value(value)?)
}

/// One category's payload for a target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    /// Category the payload belongs to
    pub category: ScanCategory,
    /// Category-specific JSON document
    pub payload: Value,
}

impl ScanRecord {
    /// Build a record from any serializable payload.
    pub fn new<T: Serialize + ?Sized>(
        category: ScanCategory,
        payload: &T,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            category,
            payload: to_payload(payload)?,
        })
    }
}

/// A named target and every record collected for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    name: TargetName,
    records: BTreeMap<ScanCategory, Value>,
}

impl Target {
    /// Create a target with no records.
    #[must_use]
    pub fn new(name: TargetName) -> Self {
        Self {
            name,
            records: BTreeMap::new(),
        }
    }

    /// Target name.
    #[must_use]
    pub fn name(&self) -> &TargetName {
        &self.name
    }

    /// Payload stored for `category`, if any.
    #[must_use]
    pub fn record(&self, category: &ScanCategory) -> Option<&Value> {
        self.records.get(category)
    }

    /// Insert or replace a category payload, returning the previous one.
    pub fn insert(&mut self, category: ScanCategory, payload: Value) -> Option<Value> {
        self.records.insert(category, payload)
    }

    /// Iterate records in category order.
    pub fn records(&self) -> impl Iterator<Item = (&ScanCategory, &Value)> {
        self.records.iter()
    }

    /// Categories that have a record.
    pub fn categories(&self) -> impl Iterator<Item = &ScanCategory> {
        self.records.keys()
    }

    /// Number of categories with a record.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing has been collected for this target.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Secondary details for one discovered account.
///
/// Only `site` and `url` are guaranteed; every other field is filled in by
/// enrichment when the profile page could be read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    /// Site name as reported by the account enumerator
    pub site: String,
    /// Profile URL
    pub url: String,
    /// Profile biography
    #[serde(default)]
    pub bio: Option<String>,
    /// Avatar image URL
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Follower count as displayed by the site (e.g. `"1.2k"`)
    #[serde(default)]
    pub followers: Option<String>,
    /// Following count as displayed by the site
    #[serde(default)]
    pub following: Option<String>,
}

impl ProfileRecord {
    /// A record with only `site` and `url` set.
    #[must_use]
    pub fn new(site: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    /// True if enrichment filled in at least one secondary field.
    #[must_use]
    pub fn has_details(&self) -> bool {
        self.bio.is_some()
            || self.avatar_url.is_some()
            || self.followers.is_some()
            || self.following.is_some()
    }
}

/// Wrapper around `chrono::DateTime<Utc>` for consistent timestamp handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp representing the current moment.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Get the inner `DateTime<Utc>`.
    #[must_use]
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Format as RFC3339 string.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}
