//! Data service configuration.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use datakit_core::{Error, Result};

use crate::keys::SearchKeyMap;
use crate::sequence::SequenceDirective;

/// Declarative configuration of a data service.
///
/// # Example
///
/// ```
/// use datakit_service::DataServiceConfig;
///
/// let config = DataServiceConfig::from_json(r#"{
///     "name": "Community.Thread",
///     "sequences": [{ "keys": ["SiteId", "ThreadId"], "seed": 1000 }],
///     "search": { "keys": [{ "tag": "Subject", "fields": ["Subject"] }] }
/// }"#).unwrap();
///
/// assert_eq!(config.sequences[0].seed, 1000);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataServiceConfig {
    /// Logical name; the entity's default name when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Sequence-generated fields.
    #[serde(default)]
    pub sequences: Vec<SequenceDirective>,
    /// Search tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchKeyMap>,
}

impl DataServiceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a JSON document.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn sequence(mut self, directive: SequenceDirective) -> Self {
        self.sequences.push(directive);
        self
    }

    pub fn search(mut self, keys: SearchKeyMap) -> Self {
        self.search = Some(keys);
        self
    }

    /// The trimmed name, or `fallback` when none is configured.
    pub fn resolve_name(&self, fallback: &str) -> String {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(fallback)
            .to_string()
    }

    /// Check names and field references.
    pub fn validate(&self) -> Result<()> {
        let service = self.name.as_deref().unwrap_or("<unnamed>");

        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(Error::config(service, "service name is blank"));
            }
            check_identifier(service, "service name", name.trim())?;
        }

        for directive in &self.sequences {
            if directive.keys.is_empty() {
                return Err(Error::config(service, "sequence directive declares no keys"));
            }
            for key in &directive.keys {
                check_identifier(service, "sequence key", key)?;
            }
            if let Some(name) = &directive.sequence {
                check_identifier(service, "sequence name", name)?;
            }
        }

        if let Some(search) = &self.search {
            for key in &search.keys {
                if key.fields.is_empty() {
                    return Err(Error::config(
                        service,
                        format!("search tag '{}' declares no fields", key.tag),
                    ));
                }
                check_identifier(service, "search tag", &key.tag)?;
                for field in &key.fields {
                    check_identifier(service, "search field", field)?;
                }
            }
        }

        Ok(())
    }
}

fn identifier_pattern() -> std::result::Result<&'static Regex, &'static regex::Error> {
    static PATTERN: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$"))
        .as_ref()
}

fn check_identifier(service: &str, what: &str, value: &str) -> Result<()> {
    let pattern = identifier_pattern()
        .map_err(|e| Error::config(service, format!("identifier pattern: {e}")))?;
    if pattern.is_match(value) {
        Ok(())
    } else {
        Err(Error::config(
            service,
            format!("{} '{}' is not a valid identifier", what, value),
        ))
    }
}
