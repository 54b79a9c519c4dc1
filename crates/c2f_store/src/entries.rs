//! Entry and attribute CRUD with field-level encryption.
//!
//! Deletion policy is deliberately asymmetric:
//! - entries are soft-deleted (flag + timestamp), their attributes stay on
//!   disk and structurally recoverable;
//! - attributes are hard-deleted, ciphertext and all.
//!
//! Every save re-encrypts every attribute value, so each write gets a fresh
//! nonce whether or not the value changed.

use c2f_crypto::{CryptoError, EncodedData};
use chrono::Utc;
use uuid::Uuid;

use crate::db::Store;
use crate::error::StoreError;
use crate::models::{
    parse_id, Attribute, AttributeRow, AttributeType, DropReason, DroppedAttribute, Entry, EntryRow,
    LoadedAttributes, LoadedEntry,
};

const SELECT_LIVE_ENTRIES: &str = "SELECT id, title, notes, icon, created_at, modified_at, is_deleted \
     FROM entries WHERE is_deleted = 0 ORDER BY title COLLATE NOCASE, id";

const SELECT_LIVE_ENTRY: &str = "SELECT id, title, notes, icon, created_at, modified_at, is_deleted \
     FROM entries WHERE id = ? AND is_deleted = 0";

const SELECT_ANY_ENTRY: &str = "SELECT id, title, notes, icon, created_at, modified_at, is_deleted \
     FROM entries WHERE id = ?";

const SELECT_ATTRIBUTES: &str = "SELECT id, entry_id, type, key, ciphertext, nonce, tag, is_sensitive, sort_order \
     FROM attributes WHERE entry_id = ? ORDER BY sort_order, id";

const UPSERT_ENTRY: &str = "INSERT INTO entries (id, title, notes, icon, created_at, modified_at, is_deleted) \
     VALUES (?, ?, ?, ?, ?, ?, ?) \
     ON CONFLICT(id) DO UPDATE SET \
        title = excluded.title, \
        notes = excluded.notes, \
        icon = excluded.icon, \
        modified_at = excluded.modified_at, \
        is_deleted = excluded.is_deleted";

const UPSERT_ATTRIBUTE: &str = "INSERT INTO attributes (id, entry_id, type, key, ciphertext, nonce, tag, is_sensitive, sort_order) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
     ON CONFLICT(id) DO UPDATE SET \
        type = excluded.type, \
        key = excluded.key, \
        ciphertext = excluded.ciphertext, \
        nonce = excluded.nonce, \
        tag = excluded.tag, \
        is_sensitive = excluded.is_sensitive, \
        sort_order = excluded.sort_order \
     WHERE attributes.entry_id = excluded.entry_id";

impl Store {
    // ── Reads ────────────────────────────────────────────────────────────────

    /// All live entries, ordered by title, with decrypted attributes.
    pub async fn list_entries(&self) -> Result<Vec<LoadedEntry>, StoreError> {
        let rows: Vec<EntryRow> = sqlx::query_as(SELECT_LIVE_ENTRIES)
            .fetch_all(&self.pool)
            .await?;
        self.load_entries(rows).await
    }

    /// A live entry by id; `None` if it does not exist or is soft-deleted.
    pub async fn get_entry(&self, id: Uuid) -> Result<Option<LoadedEntry>, StoreError> {
        let row: Option<EntryRow> = sqlx::query_as(SELECT_LIVE_ENTRY)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.load_entry(row).await?)),
            None => Ok(None),
        }
    }

    /// Raw read that also returns soft-deleted entries (with `is_deleted`
    /// set). For recovery and operator tooling, not for normal listing.
    pub async fn get_entry_raw(&self, id: Uuid) -> Result<Option<LoadedEntry>, StoreError> {
        let row: Option<EntryRow> = sqlx::query_as(SELECT_ANY_ENTRY)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.load_entry(row).await?)),
            None => Ok(None),
        }
    }

    /// Live entries whose title contains `query`, case-insensitively.
    ///
    /// Only titles are searched; attribute values exist on disk solely as
    /// ciphertext. Filtering happens before any attribute is decrypted.
    pub async fn search_entries(&self, query: &str) -> Result<Vec<LoadedEntry>, StoreError> {
        let needle = query.to_lowercase();
        let rows: Vec<EntryRow> = sqlx::query_as(SELECT_LIVE_ENTRIES)
            .fetch_all(&self.pool)
            .await?;
        let matching: Vec<EntryRow> = rows
            .into_iter()
            .filter(|row| row.title.to_lowercase().contains(&needle))
            .collect();
        tracing::debug!(matches = matching.len(), "title search");
        self.load_entries(matching).await
    }

    /// Decrypted attributes of one entry, ordered by sort position.
    pub async fn get_attributes(&self, entry_id: Uuid) -> Result<LoadedAttributes, StoreError> {
        self.load_attributes(&entry_id.to_string()).await
    }

    // ── Writes ───────────────────────────────────────────────────────────────

    /// Upsert `entry` and all of its attributes in one transaction.
    ///
    /// Stamps `modified_at` and assigns each attribute to this entry.
    /// Attributes missing from `entry.attributes` are not removed; use
    /// `delete_attribute` for that. Nothing is written if encryption fails.
    pub async fn save_entry(&self, entry: &mut Entry) -> Result<(), StoreError> {
        entry.modified_at = Utc::now();

        let mut sealed = Vec::with_capacity(entry.attributes.len());
        for attribute in entry.attributes.iter_mut() {
            attribute.entry_id = entry.id;
            sealed.push(self.encrypt_value(&attribute.value)?);
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query(UPSERT_ENTRY)
            .bind(entry.id.to_string())
            .bind(&entry.title)
            .bind(&entry.notes)
            .bind(&entry.icon)
            .bind(entry.created_at)
            .bind(entry.modified_at)
            .bind(entry.is_deleted)
            .execute(&mut *tx)
            .await?;
        for (attribute, encoded) in entry.attributes.iter().zip(&sealed) {
            upsert_attribute(&mut *tx, attribute, encoded).await?;
        }
        tx.commit().await?;

        tracing::debug!(entry_id = %entry.id, attributes = sealed.len(), "entry saved");
        Ok(())
    }

    /// Upsert a single attribute of an existing live entry.
    pub async fn save_attribute(&self, attribute: &Attribute) -> Result<(), StoreError> {
        let encoded = self.encrypt_value(&attribute.value)?;

        let mut tx = self.pool.begin().await?;
        let owner: Option<(String,)> = sqlx::query_as("SELECT id FROM entries WHERE id = ? AND is_deleted = 0")
            .bind(attribute.entry_id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
        if owner.is_none() {
            return Err(StoreError::NotFound(format!("entry {}", attribute.entry_id)));
        }
        upsert_attribute(&mut *tx, attribute, &encoded).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Soft delete: sets the flag and bumps `modified_at`. Attributes stay.
    pub async fn delete_entry(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE entries SET is_deleted = 1, modified_at = ? WHERE id = ? AND is_deleted = 0")
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("entry {id}")));
        }
        tracing::info!(entry_id = %id, "entry soft-deleted");
        Ok(())
    }

    /// Hard delete: the attribute row and its ciphertext are gone.
    pub async fn delete_attribute(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM attributes WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("attribute {id}")));
        }
        tracing::debug!(attribute_id = %id, "attribute deleted");
        Ok(())
    }

    // ── Loading ──────────────────────────────────────────────────────────────

    async fn load_entries(&self, rows: Vec<EntryRow>) -> Result<Vec<LoadedEntry>, StoreError> {
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            // One damaged row must not hide every other entry.
            if let Err(err) = parse_id(&row.id) {
                tracing::warn!(entry_id = %row.id, "skipping entry with malformed id: {err}");
                continue;
            }
            entries.push(self.load_entry(row).await?);
        }
        Ok(entries)
    }

    async fn load_entry(&self, row: EntryRow) -> Result<LoadedEntry, StoreError> {
        let loaded = self.load_attributes(&row.id).await?;
        Ok(LoadedEntry {
            entry: Entry::from_row(row, loaded.attributes)?,
            dropped: loaded.dropped,
        })
    }

    /// Decrypt every attribute of `entry_id`. A record that fails to decrypt
    /// or parse is dropped and reported; a locked session or a database
    /// error aborts the whole load.
    async fn load_attributes(&self, entry_id: &str) -> Result<LoadedAttributes, StoreError> {
        let rows: Vec<AttributeRow> = sqlx::query_as(SELECT_ATTRIBUTES)
            .bind(entry_id)
            .fetch_all(&self.pool)
            .await?;

        let mut loaded = LoadedAttributes::default();
        for row in rows {
            match self.decode_attribute(&row) {
                Ok(attribute) => loaded.attributes.push(attribute),
                Err(err) => match drop_reason(&err) {
                    Some(reason) => {
                        tracing::warn!(
                            entry_id,
                            attribute_id = %row.id,
                            ?reason,
                            "dropping attribute that cannot be decrypted: {err}"
                        );
                        loaded.dropped.push(DroppedAttribute {
                            attribute_id: row.id.clone(),
                            key: row.key.clone(),
                            reason,
                        });
                    }
                    None => return Err(err),
                },
            }
        }
        Ok(loaded)
    }

    fn decode_attribute(&self, row: &AttributeRow) -> Result<Attribute, StoreError> {
        let encoded = EncodedData {
            ciphertext: row.ciphertext.clone(),
            nonce: row.nonce.clone(),
            tag: row.tag.clone(),
        };
        let value = self.decrypt_value(&encoded)?;

        Ok(Attribute {
            id: parse_id(&row.id)?,
            entry_id: parse_id(&row.entry_id)?,
            kind: AttributeType::try_from(row.kind)?,
            key: row.key.clone(),
            value: value.as_str().to_owned(),
            is_sensitive: row.is_sensitive,
            sort_order: row.sort_order,
        })
    }
}

/// Per-record failures that drop one attribute; `None` means abort.
fn drop_reason(err: &StoreError) -> Option<DropReason> {
    match err {
        StoreError::Crypto(CryptoError::AeadDecrypt) => Some(DropReason::Integrity),
        StoreError::Crypto(e) if e.is_integrity_failure() => Some(DropReason::Malformed),
        StoreError::InvalidRecord(_) => Some(DropReason::Malformed),
        _ => None,
    }
}

/// Insert or update one attribute row. An id already owned by a different
/// entry is refused with `Conflict`; attributes never move between entries.
async fn upsert_attribute(
    conn: &mut sqlx::SqliteConnection,
    attribute: &Attribute,
    encoded: &EncodedData,
) -> Result<(), StoreError> {
    let result = sqlx::query(UPSERT_ATTRIBUTE)
        .bind(attribute.id.to_string())
        .bind(attribute.entry_id.to_string())
        .bind(attribute.kind.as_i64())
        .bind(&attribute.key)
        .bind(&encoded.ciphertext)
        .bind(&encoded.nonce)
        .bind(&encoded.tag)
        .bind(attribute.is_sensitive)
        .bind(attribute.sort_order)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::Conflict(format!(
            "attribute {} belongs to another entry",
            attribute.id
        )));
    }
    Ok(())
}
