//! Settings record: plaintext key/value pairs in the `settings` table.
//!
//! The password verifier and its salt are the only cryptographic material
//! ever persisted. They are written exclusively by the credential operations
//! in `credentials.rs` so that salt, verifier and session key always change
//! together; `save_settings` only touches the preference keys.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use c2f_crypto::kdf::SALT_LEN;
use serde::{Deserialize, Serialize};

use crate::db::Store;
use crate::error::StoreError;

pub(crate) const KEY_PASSWORD_HASH: &str = "password_hash";
pub(crate) const KEY_PASSWORD_SALT: &str = "password_salt";
const KEY_CLIPBOARD_CLEAR_SECONDS: &str = "clipboard_clear_seconds";
const KEY_AUTO_LOCK_ENABLED: &str = "auto_lock_enabled";
const KEY_AUTO_LOCK_MINUTES: &str = "auto_lock_minutes";
const KEY_THEME: &str = "theme";

pub const DEFAULT_CLIPBOARD_CLEAR_SECONDS: u32 = 30;
pub const DEFAULT_AUTO_LOCK_MINUTES: u32 = 5;
pub const DEFAULT_AUTO_LOCK_ENABLED: bool = true;
pub const DEFAULT_THEME: &str = "Dark";

/// Stored password verifier + the salt it (and the vault key) derive from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
    /// Base64 verifier from `c2f_crypto::kdf::hash_password`.
    pub password_hash: String,
    /// Base64 32-byte Argon2id salt.
    pub password_salt: String,
}

impl StoredCredentials {
    pub fn new(password_hash: String, salt: &[u8; SALT_LEN]) -> Self {
        Self {
            password_hash,
            password_salt: STANDARD.encode(salt),
        }
    }

    pub fn salt(&self) -> Result<[u8; SALT_LEN], StoreError> {
        let bytes = STANDARD
            .decode(&self.password_salt)
            .map_err(|e| StoreError::InvalidRecord(format!("password salt: {e}")))?;
        let len = bytes.len();
        bytes
            .try_into()
            .map_err(|_| StoreError::InvalidRecord(format!("password salt is {len} bytes, expected {SALT_LEN}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// `None` until a master password has been set up. Read-only here.
    pub credentials: Option<StoredCredentials>,
    pub clipboard_clear_seconds: u32,
    pub auto_lock_enabled: bool,
    pub auto_lock_minutes: u32,
    pub theme: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            credentials: None,
            clipboard_clear_seconds: DEFAULT_CLIPBOARD_CLEAR_SECONDS,
            auto_lock_enabled: DEFAULT_AUTO_LOCK_ENABLED,
            auto_lock_minutes: DEFAULT_AUTO_LOCK_MINUTES,
            theme: DEFAULT_THEME.to_string(),
        }
    }
}

impl Settings {
    /// Build from stored pairs. Unknown keys are ignored; missing or
    /// unparsable values keep their defaults.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut settings = Settings::default();
        let mut hash = None;
        let mut salt = None;

        for (key, value) in pairs {
            match key.as_str() {
                KEY_PASSWORD_HASH if !value.is_empty() => hash = Some(value),
                KEY_PASSWORD_SALT if !value.is_empty() => salt = Some(value),
                KEY_CLIPBOARD_CLEAR_SECONDS => {
                    settings.clipboard_clear_seconds =
                        parse_or_default(&key, &value, DEFAULT_CLIPBOARD_CLEAR_SECONDS)
                }
                KEY_AUTO_LOCK_MINUTES => {
                    settings.auto_lock_minutes = parse_or_default(&key, &value, DEFAULT_AUTO_LOCK_MINUTES)
                }
                KEY_AUTO_LOCK_ENABLED => settings.auto_lock_enabled = value == "1",
                KEY_THEME if !value.is_empty() => settings.theme = value,
                _ => {}
            }
        }

        settings.credentials = match (hash, salt) {
            (Some(password_hash), Some(password_salt)) => Some(StoredCredentials {
                password_hash,
                password_salt,
            }),
            (None, None) => None,
            _ => {
                tracing::warn!("settings hold only half of the password credentials; treating as not set up");
                None
            }
        };
        settings
    }

    /// Preference pairs written by `save_settings`. Credentials are excluded.
    pub fn preference_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            (KEY_CLIPBOARD_CLEAR_SECONDS, self.clipboard_clear_seconds.to_string()),
            (KEY_AUTO_LOCK_ENABLED, if self.auto_lock_enabled { "1" } else { "0" }.to_string()),
            (KEY_AUTO_LOCK_MINUTES, self.auto_lock_minutes.to_string()),
            (KEY_THEME, self.theme.clone()),
        ]
    }

    /// Idle timeout for the session key, or `None` when auto-lock is off.
    pub fn auto_lock_timeout(&self) -> Option<Duration> {
        if self.auto_lock_enabled && self.auto_lock_minutes > 0 {
            Some(Duration::from_secs(u64::from(self.auto_lock_minutes) * 60))
        } else {
            None
        }
    }
}

fn parse_or_default(key: &str, value: &str, default: u32) -> u32 {
    value.trim().parse().unwrap_or_else(|_| {
        tracing::warn!(key, "unparsable setting value; using default {default}");
        default
    })
}

const UPSERT_SETTING: &str =
    "INSERT INTO settings (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value";

impl Store {
    pub async fn get_settings(&self) -> Result<Settings, StoreError> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM settings")
            .fetch_all(&self.pool)
            .await?;
        Ok(Settings::from_pairs(rows))
    }

    /// Persist the preference keys. Stored credentials are left untouched.
    pub async fn save_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for (key, value) in settings.preference_pairs() {
            sqlx::query(UPSERT_SETTING)
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        // Keep the running session in step with the new policy.
        if self.session.has_session_key() {
            self.session.set_idle_timeout(settings.auto_lock_timeout());
        }
        Ok(())
    }
}

/// Write verifier + salt on an open connection (normally inside a transaction).
pub(crate) async fn write_credentials(
    conn: &mut sqlx::SqliteConnection,
    credentials: &StoredCredentials,
) -> Result<(), StoreError> {
    sqlx::query(UPSERT_SETTING)
        .bind(KEY_PASSWORD_HASH)
        .bind(&credentials.password_hash)
        .execute(&mut *conn)
        .await?;
    sqlx::query(UPSERT_SETTING)
        .bind(KEY_PASSWORD_SALT)
        .bind(&credentials.password_salt)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
