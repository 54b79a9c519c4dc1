//! Session key manager: the one in-memory copy of the vault key.
//!
//! States: Locked (no key) ⇄ Unlocked (exactly one key).
//!
//! The key lives in a `VaultKey`, which zeroizes itself on drop, so every
//! transition that discards a key (replace, clear, idle expiry, dropping the
//! last handle) wipes it. Encrypt/decrypt while Locked fail with
//! `CryptoError::SessionLocked`, never with an AEAD error.
//!
//! Optional idle auto-lock: once `idle_timeout` has elapsed since the key was
//! last used, the next encrypt/decrypt wipes the key and reports Locked.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use zeroize::Zeroizing;

use crate::aead::{self, EncryptedData};
use crate::error::CryptoError;
use crate::kdf::{VaultKey, KEY_LEN};

struct Unlocked {
    key: VaultKey,
    last_activity: Instant,
}

struct Inner {
    slot: Option<Unlocked>,
    idle_timeout: Option<Duration>,
}

impl Inner {
    fn is_expired(&self, now: Instant) -> bool {
        match (&self.slot, self.idle_timeout) {
            (Some(unlocked), Some(timeout)) => now.duration_since(unlocked.last_activity) >= timeout,
            _ => false,
        }
    }
}

/// Cheap-to-clone handle; all clones share the same single key slot.
#[derive(Clone)]
pub struct SessionKeyManager {
    inner: Arc<RwLock<Inner>>,
}

impl SessionKeyManager {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                slot: None,
                idle_timeout: None,
            })),
        }
    }

    /// Install `key`. A previously held key is dropped (and thereby zeroized).
    pub fn set_session_key(&self, key: VaultKey) {
        let mut inner = self.inner.write();
        let replaced = inner.slot.replace(Unlocked {
            key,
            last_activity: Instant::now(),
        });
        drop(inner);
        if replaced.is_some() {
            tracing::debug!("session key replaced");
        } else {
            tracing::debug!("session unlocked");
        }
    }

    /// Zeroize and drop the held key. No-op when already locked.
    pub fn clear_session_key(&self) {
        let taken = self.inner.write().slot.take();
        if taken.is_some() {
            tracing::debug!("session locked");
        }
    }

    /// Pure query: true while a key is held and the idle timeout (if any)
    /// has not elapsed.
    pub fn has_session_key(&self) -> bool {
        let inner = self.inner.read();
        inner.slot.is_some() && !inner.is_expired(Instant::now())
    }

    /// Set the idle auto-lock timeout. `None` disables auto-lock.
    ///
    /// A key that already expired under the old timeout is wiped first, so
    /// widening the timeout never revives it.
    pub fn set_idle_timeout(&self, timeout: Option<Duration>) {
        let mut inner = self.inner.write();
        let expired = inner.is_expired(Instant::now());
        if expired {
            inner.slot = None;
        }
        inner.idle_timeout = timeout;
        drop(inner);
        if expired {
            tracing::info!("session auto-locked after inactivity");
        }
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.inner.read().idle_timeout
    }

    /// Wipe the key if the idle timeout has elapsed. Returns true if it did.
    pub fn expire_if_idle(&self) -> bool {
        let mut inner = self.inner.write();
        if inner.is_expired(Instant::now()) {
            inner.slot = None;
            drop(inner);
            tracing::info!("session auto-locked after inactivity");
            true
        } else {
            false
        }
    }

    /// Time left before auto-lock. `None` while locked or without a timeout.
    pub fn time_until_lock(&self) -> Option<Duration> {
        let inner = self.inner.read();
        let unlocked = inner.slot.as_ref()?;
        let timeout = inner.idle_timeout?;
        Some(timeout.saturating_sub(unlocked.last_activity.elapsed()))
    }

    pub fn encrypt_with_session_key(&self, plaintext: &str) -> Result<EncryptedData, CryptoError> {
        self.with_key(|key| aead::encrypt(plaintext, key))
    }

    pub fn decrypt_with_session_key(
        &self,
        data: &EncryptedData,
    ) -> Result<Zeroizing<String>, CryptoError> {
        self.with_key(|key| aead::decrypt(data, key))
    }

    /// Run `f` with the raw key, refreshing the activity timer.
    /// Fails with `SessionLocked` when no key is held or auto-lock fired.
    fn with_key<F, R>(&self, f: F) -> Result<R, CryptoError>
    where
        F: FnOnce(&[u8; KEY_LEN]) -> Result<R, CryptoError>,
    {
        let mut inner = self.inner.write();
        let now = Instant::now();
        if inner.is_expired(now) {
            inner.slot = None;
            drop(inner);
            tracing::info!("session auto-locked after inactivity");
            return Err(CryptoError::SessionLocked);
        }
        match inner.slot.as_mut() {
            Some(unlocked) => {
                unlocked.last_activity = now;
                f(unlocked.key.as_bytes())
            }
            None => Err(CryptoError::SessionLocked),
        }
    }
}

impl Default for SessionKeyManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionKeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeyManager")
            .field("unlocked", &self.has_session_key())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> VaultKey {
        VaultKey::from_bytes([byte; KEY_LEN])
    }

    #[test]
    fn starts_locked() {
        let session = SessionKeyManager::new();
        assert!(!session.has_session_key());
        assert!(matches!(
            session.encrypt_with_session_key("x"),
            Err(CryptoError::SessionLocked)
        ));
    }

    #[test]
    fn unlocked_round_trip() {
        let session = SessionKeyManager::new();
        session.set_session_key(key(1));
        assert!(session.has_session_key());

        let data = session.encrypt_with_session_key("Secr3t!").unwrap();
        assert_eq!(session.decrypt_with_session_key(&data).unwrap().as_str(), "Secr3t!");
    }

    #[test]
    fn clear_yields_state_error_not_crypto_error() {
        let session = SessionKeyManager::new();
        session.set_session_key(key(1));
        let data = session.encrypt_with_session_key("value").unwrap();

        session.clear_session_key();
        assert!(!session.has_session_key());
        assert!(matches!(
            session.encrypt_with_session_key("value"),
            Err(CryptoError::SessionLocked)
        ));
        assert!(matches!(
            session.decrypt_with_session_key(&data),
            Err(CryptoError::SessionLocked)
        ));
    }

    #[test]
    fn clear_is_idempotent() {
        let session = SessionKeyManager::new();
        session.clear_session_key();
        session.clear_session_key();
        assert!(!session.has_session_key());
    }

    #[test]
    fn replacing_key_switches_cipher_key() {
        let session = SessionKeyManager::new();
        session.set_session_key(key(1));
        let data = session.encrypt_with_session_key("value").unwrap();

        session.set_session_key(key(2));
        assert!(session.has_session_key());
        assert!(matches!(
            session.decrypt_with_session_key(&data),
            Err(CryptoError::AeadDecrypt)
        ));
    }

    #[test]
    fn clones_share_the_slot() {
        let session = SessionKeyManager::new();
        let other = session.clone();
        session.set_session_key(key(9));
        assert!(other.has_session_key());
        other.clear_session_key();
        assert!(!session.has_session_key());
    }

    #[test]
    fn idle_timeout_locks() {
        let session = SessionKeyManager::new();
        session.set_session_key(key(1));
        session.set_idle_timeout(Some(Duration::ZERO));

        // has_session_key does not mutate; the next use wipes the key.
        assert!(!session.has_session_key());
        assert!(matches!(
            session.encrypt_with_session_key("x"),
            Err(CryptoError::SessionLocked)
        ));

        session.set_idle_timeout(None);
        assert!(!session.has_session_key());
    }

    #[test]
    fn expired_key_stays_gone_when_timeout_is_lifted() {
        let session = SessionKeyManager::new();
        session.set_session_key(key(1));
        session.set_idle_timeout(Some(Duration::ZERO));
        assert!(!session.has_session_key());

        session.set_idle_timeout(None);
        assert!(!session.has_session_key());
        assert!(matches!(
            session.encrypt_with_session_key("x"),
            Err(CryptoError::SessionLocked)
        ));

        session.set_session_key(key(2));
        session.set_idle_timeout(Some(Duration::from_secs(3600)));
        assert!(session.has_session_key());
    }

    #[test]
    fn expire_if_idle_respects_timeout() {
        let session = SessionKeyManager::new();
        session.set_session_key(key(1));
        session.set_idle_timeout(Some(Duration::from_secs(3600)));
        assert!(!session.expire_if_idle());
        assert!(session.has_session_key());
        assert!(session.time_until_lock().unwrap() <= Duration::from_secs(3600));

        session.set_idle_timeout(Some(Duration::ZERO));
        assert!(session.expire_if_idle());
        session.set_idle_timeout(None);
        assert!(!session.has_session_key());
    }
}
