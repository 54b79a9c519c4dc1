//! Master-password lifecycle: first-run setup, unlock, lock, rotation.
//!
//! Salt, verifier and session key are only ever changed together. Rotation
//! re-encrypts every stored attribute under the new key inside the same
//! transaction that writes the new salt and verifier, and installs the new
//! key only after that transaction commits.
//!
//! Argon2 runs on tokio's blocking pool.

use c2f_crypto::aead::{self, EncodedData, EncryptedData};
use c2f_crypto::kdf::{self, VaultKey, SALT_LEN};
use zeroize::Zeroizing;

use crate::db::Store;
use crate::error::StoreError;
use crate::settings::{write_credentials, Settings, StoredCredentials, KEY_PASSWORD_HASH};

pub const MIN_PASSWORD_LEN: usize = 8;

fn check_strength(password: &str) -> Result<(), StoreError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(StoreError::WeakPassword {
            min_len: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

async fn derive_key_and_hash(
    password: &str,
    salt: [u8; SALT_LEN],
) -> Result<(VaultKey, String), StoreError> {
    let password = Zeroizing::new(password.to_owned());
    let derived = tokio::task::spawn_blocking(move || kdf::derive_key_and_hash(&password, &salt)).await??;
    Ok(derived)
}

/// Derive under the stored salt and check the verifier. `None` on mismatch.
async fn derive_verified(
    password: &str,
    credentials: &StoredCredentials,
) -> Result<Option<VaultKey>, StoreError> {
    let salt = credentials.salt()?;
    let stored_hash = credentials.password_hash.clone();
    let password = Zeroizing::new(password.to_owned());

    let key = tokio::task::spawn_blocking(move || {
        let key = kdf::derive_key(&password, &salt)?;
        Ok::<_, c2f_crypto::CryptoError>(kdf::verify_key(&key, &stored_hash)?.then_some(key))
    })
    .await??;
    Ok(key)
}

impl Store {
    /// True once a master password has been set up.
    pub async fn is_initialised(&self) -> Result<bool, StoreError> {
        Ok(self.get_settings().await?.credentials.is_some())
    }

    /// First run: create salt + verifier for `password` and unlock.
    pub async fn setup_master_password(&self, password: &str) -> Result<(), StoreError> {
        check_strength(password)?;
        if self.is_initialised().await? {
            return Err(StoreError::AlreadyInitialised);
        }

        let salt = kdf::generate_salt();
        let (key, hash) = derive_key_and_hash(password, salt).await?;
        let credentials = StoredCredentials::new(hash, &salt);

        let mut tx = self.pool.begin().await?;
        let existing: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ? AND value != ''")
            .bind(KEY_PASSWORD_HASH)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            return Err(StoreError::AlreadyInitialised);
        }
        write_credentials(&mut *tx, &credentials).await?;
        tx.commit().await?;

        let settings = self.get_settings().await?;
        self.install_key(key, &settings);
        tracing::info!("master password set up; vault unlocked");
        Ok(())
    }

    /// Verify `password` and install the derived key.
    ///
    /// A wrong password yields `AuthenticationFailed` and leaves the session
    /// exactly as it was.
    pub async fn unlock(&self, password: &str) -> Result<(), StoreError> {
        let settings = self.get_settings().await?;
        let credentials = settings.credentials.as_ref().ok_or(StoreError::NotInitialised)?;

        match derive_verified(password, credentials).await? {
            Some(key) => {
                self.install_key(key, &settings);
                tracing::info!("vault unlocked");
                Ok(())
            }
            None => {
                tracing::warn!("unlock rejected: wrong master password");
                Err(StoreError::AuthenticationFailed)
            }
        }
    }

    /// Zeroize the session key. Safe to call while already locked.
    pub fn lock(&self) {
        self.session.clear_session_key();
        tracing::info!("vault locked");
    }

    /// Change the master password.
    ///
    /// Verifies `current`, derives a new key under a fresh salt, re-encrypts
    /// every stored attribute (including those of soft-deleted entries) and
    /// writes the new salt + verifier in one transaction, then installs the
    /// new key. If any stored attribute is already undecryptable under the
    /// current key, nothing changes and `UndecryptableAttributes` is returned:
    /// rotating would otherwise orphan it permanently.
    pub async fn rotate_credentials(&self, current: &str, new: &str) -> Result<(), StoreError> {
        check_strength(new)?;
        let settings = self.get_settings().await?;
        let credentials = settings.credentials.as_ref().ok_or(StoreError::NotInitialised)?;

        let current_key = match derive_verified(current, credentials).await? {
            Some(key) => key,
            None => {
                tracing::warn!("credential rotation rejected: wrong current password");
                return Err(StoreError::AuthenticationFailed);
            }
        };
        let new_salt = kdf::generate_salt();
        let (new_key, new_hash) = derive_key_and_hash(new, new_salt).await?;

        let mut tx = self.pool.begin().await?;
        let rows: Vec<(String, String, String, String)> =
            sqlx::query_as("SELECT id, ciphertext, nonce, tag FROM attributes ORDER BY id")
                .fetch_all(&mut *tx)
                .await?;

        let mut resealed = Vec::with_capacity(rows.len());
        let mut undecryptable = 0usize;
        for (id, ciphertext, nonce, tag) in rows {
            let encoded = EncodedData { ciphertext, nonce, tag };
            let plaintext = match EncryptedData::decode(&encoded)
                .and_then(|data| aead::decrypt(&data, current_key.as_bytes()))
            {
                Ok(plaintext) => plaintext,
                Err(err) => {
                    tracing::warn!(attribute_id = %id, "cannot re-encrypt attribute: {err}");
                    undecryptable += 1;
                    continue;
                }
            };
            resealed.push((id, aead::encrypt(&plaintext, new_key.as_bytes())?.encode()));
        }
        if undecryptable > 0 {
            return Err(StoreError::UndecryptableAttributes { count: undecryptable });
        }

        for (id, sealed) in &resealed {
            sqlx::query("UPDATE attributes SET ciphertext = ?, nonce = ?, tag = ? WHERE id = ?")
                .bind(&sealed.ciphertext)
                .bind(&sealed.nonce)
                .bind(&sealed.tag)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        write_credentials(&mut *tx, &StoredCredentials::new(new_hash, &new_salt)).await?;
        tx.commit().await?;

        self.install_key(new_key, &settings);
        tracing::info!(reencrypted = resealed.len(), "credentials rotated");
        Ok(())
    }

    fn install_key(&self, key: VaultKey, settings: &Settings) {
        self.session.set_idle_timeout(settings.auto_lock_timeout());
        self.session.set_session_key(key);
    }
}
