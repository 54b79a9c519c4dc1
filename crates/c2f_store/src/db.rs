//! Database abstraction over SQLite via sqlx.

use std::path::Path;

use c2f_crypto::{EncodedData, EncryptedData, SessionKeyManager};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use zeroize::Zeroizing;

use crate::error::StoreError;

/// Central store handle.  Cheap to clone (Arc internally).
///
/// The session manager is injected rather than created here, so the same
/// key slot can be shared with whatever owns the lock/unlock UX.
#[derive(Clone)]
pub struct Store {
    pub pool: SqlitePool,
    pub session: SessionKeyManager,
}

impl Store {
    /// Open (or create) the SQLite database at `db_path` and ensure the
    /// schema exists.
    ///
    /// WAL journal mode and foreign-key enforcement are configured at
    /// connection time, not inside a migration: SQLite refuses to change
    /// `journal_mode` inside the transaction sqlx wraps each migration in.
    pub async fn open(db_path: &Path, session: SessionKeyManager) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let opts = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(opts).await?;
        let store = Self { pool, session };
        store.initialize().await?;

        tracing::info!(path = %db_path.display(), "store opened");
        Ok(store)
    }

    /// Ensure the schema exists by applying any pending migration under
    /// `migrations/`. Safe to call any number of times.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    /// Encrypt a plaintext value with the session key, ready for storage.
    pub(crate) fn encrypt_value(&self, plaintext: &str) -> Result<EncodedData, StoreError> {
        Ok(self.session.encrypt_with_session_key(plaintext)?.encode())
    }

    /// Decrypt a stored value with the session key.
    ///
    /// Returns the raw `CryptoError` so callers can tell an integrity failure
    /// (drop the field) from a locked session (abort the read).
    pub(crate) fn decrypt_value(
        &self,
        encoded: &EncodedData,
    ) -> Result<Zeroizing<String>, c2f_crypto::CryptoError> {
        let data = EncryptedData::decode(encoded)?;
        self.session.decrypt_with_session_key(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::Store;
    use c2f_crypto::{SessionKeyManager, VaultKey};

    #[tokio::test]
    async fn open_is_idempotent_and_enforces_foreign_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("nested").join("secrets.db");

        let store = Store::open(&db_path, SessionKeyManager::new()).await.expect("open store");
        store.initialize().await.expect("second initialize");
        store.close().await;

        let store = Store::open(&db_path, SessionKeyManager::new()).await.expect("reopen store");

        // Orphan attribute rows must be rejected.
        let orphan = sqlx::query(
            "INSERT INTO attributes (id, entry_id, type, key, ciphertext, nonce, tag, is_sensitive, sort_order) VALUES (?, ?, 0, 'k', 'c', 'n', 't', 1, 0)",
        )
        .bind("attr-1")
        .bind("no-such-entry")
        .execute(&store.pool)
        .await;
        assert!(orphan.is_err());
    }

    #[tokio::test]
    async fn helpers_require_unlocked_session() {
        let dir = tempfile::tempdir().expect("tempdir");
        let session = SessionKeyManager::new();
        let store = Store::open(&dir.path().join("secrets.db"), session.clone())
            .await
            .expect("open store");

        assert!(matches!(store.encrypt_value("x"), Err(crate::StoreError::VaultLocked)));

        session.set_session_key(VaultKey::from_bytes([5u8; 32]));
        let encoded = store.encrypt_value("hello").expect("encrypt");
        assert_ne!(encoded.ciphertext, "hello");
        assert_eq!(store.decrypt_value(&encoded).expect("decrypt").as_str(), "hello");
    }
}
