//! Wire types exchanged with the identifier service

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::checksum::Checksum;

/// Service namespace for permanent identifiers
pub const NAMESPACE: &str = "minid";
/// Service namespace for test identifiers
pub const NAMESPACE_TEST: &str = "minid-test";

/// A registered identifier as returned by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifierRecord {
    pub identifier: String,
    #[serde(default)]
    pub checksums: Vec<Checksum>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub location: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landing_page: Option<String>,
    #[serde(default)]
    pub visible_to: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub admins: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default)]
    pub replaces: Option<String>,
    #[serde(default)]
    pub replaced_by: Option<String>,
}

fn default_active() -> bool {
    true
}

impl IdentifierRecord {
    pub fn title(&self) -> Option<&str> {
        self.metadata.get("title").and_then(Value::as_str)
    }

    /// File size in bytes, when it was recorded
    pub fn length(&self) -> Option<u64> {
        self.metadata.get("length").and_then(Value::as_u64)
    }
}

/// Result of a lookup; checksum lookups can match several identifiers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentifierLookup {
    #[serde(default)]
    pub identifiers: Vec<IdentifierRecord>,
}

impl From<IdentifierRecord> for IdentifierLookup {
    fn from(record: IdentifierRecord) -> Self {
        Self {
            identifiers: vec![record],
        }
    }
}

/// Body of a create request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewIdentifier {
    pub namespace: String,
    pub visible_to: Vec<String>,
    pub metadata: Map<String, Value>,
    pub location: Vec<String>,
    pub checksums: Vec<Checksum>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replaces: Option<String>,
}

/// Body of an update request.
///
/// Absent fields are left untouched by the service. For the version links,
/// `Some(None)` is sent as an explicit `null` and clears the link.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IdentifierUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaces: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaced_by: Option<Option<String>>,
}

impl IdentifierUpdate {
    /// Set `metadata.title`
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert("title".to_string(), Value::String(title.into()));
        self
    }

    pub fn locations(mut self, locations: Vec<String>) -> Self {
        self.location = Some(locations);
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn replaces(mut self, replaces: Option<String>) -> Self {
        self.replaces = Some(replaces);
        self
    }

    pub fn replaced_by(mut self, replaced_by: Option<String>) -> Self {
        self.replaced_by = Some(replaced_by);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
