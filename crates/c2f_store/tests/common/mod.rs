#![allow(dead_code)]

use c2f_crypto::{SessionKeyManager, VaultKey};
use c2f_store::Store;
use tempfile::TempDir;

pub const TEST_KEY: [u8; 32] = [0x11; 32];

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Fresh store in its own temp dir, still locked.
pub async fn locked_store() -> (TempDir, Store) {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Store::open(&dir.path().join("secrets.db"), SessionKeyManager::new())
        .await
        .expect("open store");
    (dir, store)
}

/// Fresh store unlocked with a fixed key, skipping Argon2.
pub async fn unlocked_store() -> (TempDir, Store) {
    let (dir, store) = locked_store().await;
    store.session.set_session_key(VaultKey::from_bytes(TEST_KEY));
    (dir, store)
}

pub async fn raw_attribute(store: &Store, id: &str) -> (String, String, String) {
    sqlx::query_as("SELECT ciphertext, nonce, tag FROM attributes WHERE id = ?")
        .bind(id)
        .fetch_one(&store.pool)
        .await
        .expect("attribute row")
}

pub async fn set_raw_ciphertext(store: &Store, id: &str, ciphertext: &str) {
    sqlx::query("UPDATE attributes SET ciphertext = ? WHERE id = ?")
        .bind(ciphertext)
        .bind(id)
        .execute(&store.pool)
        .await
        .expect("update ciphertext");
}
