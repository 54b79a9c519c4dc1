//! Master-password lifecycle against a real database.
//!
//! These run the full Argon2id parameters, so they are slower than the
//! store tests; keep the count small.

mod common;

use std::time::Duration;

use c2f_store::{Attribute, AttributeType, Entry, Settings, StoreError};
use common::{locked_store, set_raw_ciphertext};

const MASTER: &str = "correct horse battery";
const NEW_MASTER: &str = "staple-2-elephant";

fn secret_entry() -> Entry {
    let mut entry = Entry::new("AWS Console");
    entry.push_attribute(Attribute::new(AttributeType::Password, "Password", "Secr3t!"));
    entry
}

#[tokio::test]
async fn setup_lock_unlock_cycle() -> anyhow::Result<()> {
    let (_dir, store) = locked_store().await;
    assert!(!store.is_initialised().await?);
    assert!(matches!(store.unlock(MASTER).await, Err(StoreError::NotInitialised)));

    store.setup_master_password(MASTER).await?;
    assert!(store.is_initialised().await?);
    assert!(store.session.has_session_key());

    let mut entry = secret_entry();
    store.save_entry(&mut entry).await?;

    store.lock();
    assert!(!store.session.has_session_key());
    assert!(matches!(store.get_entry(entry.id).await, Err(StoreError::VaultLocked)));

    assert!(matches!(
        store.unlock("not the password").await,
        Err(StoreError::AuthenticationFailed)
    ));
    assert!(!store.session.has_session_key());

    store.unlock(MASTER).await?;
    let loaded = store.get_entry(entry.id).await?.expect("entry");
    assert!(loaded.is_clean());
    assert_eq!(loaded.entry.attributes[0].value, "Secr3t!");
    Ok(())
}

#[tokio::test]
async fn wrong_unlock_keeps_an_open_session_open() -> anyhow::Result<()> {
    let (_dir, store) = locked_store().await;
    store.setup_master_password(MASTER).await?;

    assert!(store.unlock("wrong-password").await.is_err());
    assert!(store.session.has_session_key());
    Ok(())
}

#[tokio::test]
async fn setup_is_guarded() -> anyhow::Result<()> {
    let (_dir, store) = locked_store().await;

    assert!(matches!(
        store.setup_master_password("short").await,
        Err(StoreError::WeakPassword { min_len: 8 })
    ));
    assert!(!store.is_initialised().await?);

    store.setup_master_password(MASTER).await?;
    assert!(matches!(
        store.setup_master_password(NEW_MASTER).await,
        Err(StoreError::AlreadyInitialised)
    ));

    // The verifier on disk is neither the password nor anything that opens it.
    let creds = store.get_settings().await?.credentials.expect("credentials");
    assert!(!creds.password_hash.contains(MASTER));
    assert_ne!(creds.password_hash, creds.password_salt);
    Ok(())
}

#[tokio::test]
async fn rotation_reencrypts_and_swaps_credentials() -> anyhow::Result<()> {
    let (_dir, store) = locked_store().await;
    store.setup_master_password(MASTER).await?;
    let mut entry = secret_entry();
    store.save_entry(&mut entry).await?;
    let before = store.get_settings().await?.credentials.expect("credentials");

    assert!(matches!(
        store.rotate_credentials("wrong-password", NEW_MASTER).await,
        Err(StoreError::AuthenticationFailed)
    ));
    assert!(matches!(
        store.rotate_credentials(MASTER, "tiny").await,
        Err(StoreError::WeakPassword { .. })
    ));

    store.rotate_credentials(MASTER, NEW_MASTER).await?;
    let after = store.get_settings().await?.credentials.expect("credentials");
    assert_ne!(before.password_salt, after.password_salt);
    assert_ne!(before.password_hash, after.password_hash);

    // Still readable under the freshly installed key.
    let loaded = store.get_entry(entry.id).await?.expect("entry");
    assert!(loaded.is_clean());
    assert_eq!(loaded.entry.attributes[0].value, "Secr3t!");

    store.lock();
    assert!(matches!(store.unlock(MASTER).await, Err(StoreError::AuthenticationFailed)));
    store.unlock(NEW_MASTER).await?;
    let loaded = store.get_entry(entry.id).await?.expect("entry");
    assert_eq!(loaded.entry.attributes[0].value, "Secr3t!");
    Ok(())
}

#[tokio::test]
async fn rotation_refuses_to_orphan_undecryptable_attributes() -> anyhow::Result<()> {
    let (_dir, store) = locked_store().await;
    store.setup_master_password(MASTER).await?;

    let mut entry = secret_entry();
    entry.push_attribute(Attribute::new(AttributeType::Username, "User", "admin"));
    let broken_id = entry.attributes[0].id.to_string();
    store.save_entry(&mut entry).await?;
    set_raw_ciphertext(&store, &broken_id, "AAAAAAAAAA==").await;

    let before = store.get_settings().await?.credentials;
    assert!(matches!(
        store.rotate_credentials(MASTER, NEW_MASTER).await,
        Err(StoreError::UndecryptableAttributes { count: 1 })
    ));
    assert_eq!(store.get_settings().await?.credentials, before);

    // The healthy attribute was not touched either.
    let loaded = store.get_entry(entry.id).await?.expect("entry");
    assert_eq!(loaded.dropped.len(), 1);
    assert_eq!(loaded.entry.attributes[0].value, "admin");
    Ok(())
}

#[tokio::test]
async fn unlock_applies_auto_lock_preference() -> anyhow::Result<()> {
    let (_dir, store) = locked_store().await;
    store.setup_master_password(MASTER).await?;
    assert_eq!(store.session.idle_timeout(), Some(Duration::from_secs(5 * 60)));

    let mut settings: Settings = store.get_settings().await?;
    settings.auto_lock_enabled = false;
    store.save_settings(&settings).await?;
    assert_eq!(store.session.idle_timeout(), None);

    // Preferences never clobber credentials.
    assert!(store.is_initialised().await?);

    store.lock();
    settings.auto_lock_enabled = true;
    settings.auto_lock_minutes = 1;
    store.save_settings(&settings).await?;
    store.unlock(MASTER).await?;
    assert_eq!(store.session.idle_timeout(), Some(Duration::from_secs(60)));
    Ok(())
}
