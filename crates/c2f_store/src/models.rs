//! Row models (map to/from SQL rows) and the decrypted domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroize;

use crate::error::StoreError;

// ── Rows ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EntryRow {
    pub id: String,
    /// Plaintext; the only searchable column.
    pub title: String,
    pub notes: Option<String>,
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AttributeRow {
    pub id: String,
    pub entry_id: String,
    #[sqlx(rename = "type")]
    pub kind: i64,
    pub key: String,
    /// Base64 AES-256-GCM ciphertext of the value.
    pub ciphertext: String,
    /// Base64 12-byte nonce.
    pub nonce: String,
    /// Base64 16-byte authentication tag.
    pub tag: String,
    pub is_sensitive: bool,
    pub sort_order: i64,
}

// ── Attribute type ───────────────────────────────────────────────────────────

/// Semantic tag of an attribute. Persisted as its integer discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttributeType {
    Username = 0,
    Password = 1,
    Url = 2,
    ApiKey = 3,
    Text = 4,
    Email = 5,
    Port = 6,
    Host = 7,
    Application = 8,
    Custom = 9,
}

impl AttributeType {
    pub fn as_i64(self) -> i64 {
        self as i64
    }
}

impl TryFrom<i64> for AttributeType {
    type Error = StoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Username,
            1 => Self::Password,
            2 => Self::Url,
            3 => Self::ApiKey,
            4 => Self::Text,
            5 => Self::Email,
            6 => Self::Port,
            7 => Self::Host,
            8 => Self::Application,
            9 => Self::Custom,
            other => {
                return Err(StoreError::InvalidRecord(format!("unknown attribute type {other}")))
            }
        })
    }
}

// ── Domain ───────────────────────────────────────────────────────────────────

/// A named secret, e.g. a service account, with its ordered attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,
    pub title: String,
    pub notes: Option<String>,
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Soft-delete flag. Deleted entries are never returned by list/search.
    pub is_deleted: bool,
    pub attributes: Vec<Attribute>,
}

impl Entry {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            notes: None,
            icon: None,
            created_at: now,
            modified_at: now,
            is_deleted: false,
            attributes: Vec::new(),
        }
    }

    /// Append an attribute at the end of the current ordering.
    pub fn push_attribute(&mut self, mut attribute: Attribute) {
        attribute.entry_id = self.id;
        attribute.sort_order = self
            .attributes
            .iter()
            .map(|a| a.sort_order + 1)
            .max()
            .unwrap_or(0);
        self.attributes.push(attribute);
    }

    pub(crate) fn from_row(row: EntryRow, attributes: Vec<Attribute>) -> Result<Self, StoreError> {
        Ok(Self {
            id: parse_id(&row.id)?,
            title: row.title,
            notes: row.notes,
            icon: row.icon,
            created_at: row.created_at,
            modified_at: row.modified_at,
            is_deleted: row.is_deleted,
            attributes,
        })
    }
}

/// One typed field of an entry. `value` is plaintext and exists only in
/// memory; it is wiped when the attribute is dropped.
///
/// `is_sensitive` only controls UI masking. Every value is encrypted at rest.
#[derive(Clone, Serialize, Deserialize)]
pub struct Attribute {
    pub id: Uuid,
    pub entry_id: Uuid,
    pub kind: AttributeType,
    /// Display label, e.g. "Admin Username".
    pub key: String,
    pub value: String,
    pub is_sensitive: bool,
    pub sort_order: i64,
}

impl Attribute {
    pub fn new(kind: AttributeType, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            entry_id: Uuid::nil(),
            kind,
            key: key.into(),
            value: value.into(),
            is_sensitive: true,
            sort_order: 0,
        }
    }
}

impl Drop for Attribute {
    fn drop(&mut self) {
        self.value.zeroize();
    }
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("id", &self.id)
            .field("entry_id", &self.entry_id)
            .field("kind", &self.kind)
            .field("key", &self.key)
            .field("value", &"[REDACTED]")
            .field("is_sensitive", &self.is_sensitive)
            .field("sort_order", &self.sort_order)
            .finish()
    }
}

// ── Load reports ─────────────────────────────────────────────────────────────

/// Why an attribute was left out of a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// The tag did not verify: tampering, corruption, or a stale key.
    Integrity,
    /// The stored record could not be parsed (bad base64, lengths, type tag).
    Malformed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedAttribute {
    pub attribute_id: String,
    pub key: String,
    pub reason: DropReason,
}

/// Attributes of one entry, plus any that could not be decrypted.
#[derive(Debug, Default)]
pub struct LoadedAttributes {
    pub attributes: Vec<Attribute>,
    pub dropped: Vec<DroppedAttribute>,
}

/// An entry as read back from the store.
///
/// A single undecryptable attribute does not hide the entry; it is listed in
/// `dropped` instead so the loss is visible.
#[derive(Debug)]
pub struct LoadedEntry {
    pub entry: Entry,
    pub dropped: Vec<DroppedAttribute>,
}

impl LoadedEntry {
    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty()
    }
}

pub(crate) fn parse_id(raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw).map_err(|e| StoreError::InvalidRecord(format!("bad id {raw:?}: {e}")))
}
