//! Host entry records and their localized body field

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{InkbridgeError, Result};

/// System metadata the host attaches to every entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySys {
    pub id: String,
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_version: Option<u64>,
}

/// A structured content record owned by the host.
///
/// Fields map a field id to a per-locale value. Only the body field is
/// interpreted here; every other field is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub sys: EntrySys,
    #[serde(default)]
    pub fields: BTreeMap<String, BTreeMap<String, Value>>,
}

impl Entry {
    /// Create an entry with no fields
    pub fn new<S: Into<String>>(id: S, version: u64) -> Self {
        Self {
            sys: EntrySys {
                id: id.into(),
                version,
                published_version: None,
            },
            fields: BTreeMap::new(),
        }
    }

    /// Builder helper setting a localized string field
    pub fn with_field(mut self, field_id: &str, locale: &str, value: &str) -> Self {
        self.set_body(field_id, locale, value);
        self
    }

    pub fn id(&self) -> &str {
        &self.sys.id
    }

    /// Read the localized body.
    ///
    /// A missing field or locale is `Ok(None)`; a value that is not a string
    /// means the entry has an unexpected shape.
    pub fn body(&self, field_id: &str, locale: &str) -> Result<Option<&str>> {
        match self.fields.get(field_id).and_then(|f| f.get(locale)) {
            None => Ok(None),
            Some(Value::String(body)) => Ok(Some(body)),
            Some(other) => Err(InkbridgeError::load_failure(
                self.id(),
                format!(
                    "field '{}' locale '{}' is not a string: {}",
                    field_id, locale, other
                ),
            )),
        }
    }

    /// Whether the body field shape exists for the locale
    pub fn has_body(&self, field_id: &str, locale: &str) -> bool {
        self.fields
            .get(field_id)
            .is_some_and(|f| f.contains_key(locale))
    }

    /// Assign the localized body, creating the field shape if absent
    pub fn set_body(&mut self, field_id: &str, locale: &str, markdown: &str) {
        self.fields
            .entry(field_id.to_string())
            .or_default()
            .insert(locale.to_string(), Value::String(markdown.to_string()));
    }

    /// Default a missing body to an empty string; returns whether it was created
    pub fn ensure_body(&mut self, field_id: &str, locale: &str) -> bool {
        if self.has_body(field_id, locale) {
            return false;
        }
        self.set_body(field_id, locale, "");
        true
    }

    /// Whether the entry was published within `slack` versions.
    ///
    /// The host bumps the version once on publish, so an entry whose version
    /// is still below `published_version + slack` has not been edited since.
    pub fn is_recently_published(&self, slack: u64) -> bool {
        self.sys
            .published_version
            .is_some_and(|published| self.sys.version < published.saturating_add(slack))
    }
}
