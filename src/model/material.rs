use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Internal row identifier. Never leaves the wire boundary; materials are
/// addressed externally by their UUID.
pub type Id = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialType {
    pub id: Id,
    pub name: String,
}

/// One key/value annotation on a material. `id` is None until the row has
/// been persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadatum {
    pub id: Option<Id>,
    pub key: String,
    pub value: Option<String>,
}

/// A fully-loaded material as read back from the store: attributes plus its
/// resolved type, metadata rows in insertion order, and lineage expressed as
/// external ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub id: Id,
    pub external_id: String,
    pub name: String,
    pub material_type: MaterialType,
    pub metadata: Vec<Metadatum>,
    pub parents: Vec<String>,
    pub children: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Generate a fresh external id in canonical lowercase form.
pub fn generate_external_id() -> String {
    Uuid::new_v4().to_string()
}

/// Check the canonical UUID shape: 36 characters, hyphens at offsets
/// 8/13/18/23, hex digits everywhere else. Case-insensitive.
pub fn is_valid_external_id(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 36 {
        return false;
    }
    bytes.iter().enumerate().all(|(i, b)| match i {
        8 | 13 | 18 | 23 => *b == b'-',
        _ => b.is_ascii_hexdigit(),
    })
}

/// Lowercase an external id for lookups and storage. Matching is
/// case-insensitive but rows are kept in canonical lowercase.
pub fn normalize_external_id(value: &str) -> String {
    value.to_ascii_lowercase()
}
