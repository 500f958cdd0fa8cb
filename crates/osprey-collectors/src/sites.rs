//! Account site definitions loaded from TOML.
//!
//! A definitions file holds a list of `[[site]]` tables. The built-in list is
//! compiled into the binary; `scanning.sites_file` replaces it.

use crate::error::{CollectorError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

const BUILTIN_SITES: &str = include_str!("../sites/default.toml");

/// How a site signals that an account does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Any non-2xx status means "no such account"
    StatusCode,
    /// The body contains one of `error_message`
    Message,
    /// The site redirects away from the profile URL
    ResponseUrl,
}

/// One site to probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteDefinition {
    /// Display name
    pub name: String,
    /// Profile URL template; `{}` is replaced by the username
    pub url: String,
    /// URL actually requested, when different from the profile URL
    #[serde(default)]
    pub probe_url: Option<String>,
    /// How absence is detected
    pub error_type: DetectionMethod,
    /// Absence markers for [`DetectionMethod::Message`]
    #[serde(default)]
    pub error_message: Vec<String>,
    /// Usernames must match this pattern to be probed
    #[serde(default)]
    pub regex_check: Option<String>,
}

impl SiteDefinition {
    /// Profile URL for `username`.
    #[must_use]
    pub fn profile_url(&self, username: &str) -> String {
        self.url.replace("{}", username)
    }

    /// URL to request for `username`.
    #[must_use]
    pub fn probe_url(&self, username: &str) -> String {
        self.probe_url
            .as_deref()
            .unwrap_or(&self.url)
            .replace("{}", username)
    }

    /// Compile `regex_check`, if any.
    pub fn compiled_regex(&self) -> Result<Option<Regex>> {
        self.regex_check
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| {
                CollectorError::Definitions(format!("{}: invalid regex_check: {e}", self.name))
            })
    }

    /// Check the definition is usable.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CollectorError::Definitions(
                "site name must not be empty".to_string(),
            ));
        }
        if !self.url.contains("{}") {
            return Err(CollectorError::Definitions(format!(
                "{}: url must contain a '{{}}' placeholder",
                self.name
            )));
        }
        if let Some(probe) = &self.probe_url {
            if !probe.contains("{}") {
                return Err(CollectorError::Definitions(format!(
                    "{}: probe_url must contain a '{{}}' placeholder",
                    self.name
                )));
            }
        }
        if self.error_type == DetectionMethod::Message && self.error_message.is_empty() {
            return Err(CollectorError::Definitions(format!(
                "{}: error_type \"message\" requires error_message",
                self.name
            )));
        }
        self.compiled_regex()?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SiteFile {
    #[serde(default, rename = "site")]
    sites: Vec<toml::Value>,
}

/// Loader for site definitions.
pub struct SiteLoader;

impl SiteLoader {
    /// The compiled-in site list.
    pub fn builtin() -> Result<Vec<SiteDefinition>> {
        Self::from_toml_str(BUILTIN_SITES, "<builtin>")
    }

    /// Load definitions from a TOML file.
    ///
    /// # Errors
    /// Returns error if the file can't be read or is not valid TOML.
    /// Individual invalid definitions are logged and skipped.
    pub fn load_from_path(path: &Path) -> Result<Vec<SiteDefinition>> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CollectorError::Definitions(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents, &path.display().to_string())
    }

    /// Load from `path` when given, otherwise the built-in list.
    pub fn load(path: Option<&Path>) -> Result<Vec<SiteDefinition>> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::builtin(),
        }
    }

    /// Parse definitions, skipping invalid entries.
    pub fn from_toml_str(contents: &str, origin: &str) -> Result<Vec<SiteDefinition>> {
        let file: SiteFile = toml::from_str(contents).map_err(|e| {
            CollectorError::Definitions(format!("failed to parse {origin}: {e}"))
        })?;

        let mut definitions = Vec::with_capacity(file.sites.len());
        for raw in file.sites {
            let definition: SiteDefinition = match raw.try_into() {
                Ok(definition) => definition,
                Err(e) => {
                    warn!(origin, error = %e, "skipping unparsable site definition");
                    continue;
                }
            };

            if let Err(e) = definition.validate() {
                warn!(origin, error = %e, "skipping invalid site definition");
                continue;
            }

            if definitions
                .iter()
                .any(|d: &SiteDefinition| d.name == definition.name)
            {
                warn!(origin, site = %definition.name, "skipping duplicate site definition");
                continue;
            }

            debug!(site = %definition.name, "loaded site definition");
            definitions.push(definition);
        }

        info!(count = definitions.len(), origin, "loaded site definitions");
        Ok(definitions)
    }
}
