use c2f_crypto::CryptoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Vault is locked — unlock with password first")]
    VaultLocked,

    #[error("Crypto error: {0}")]
    Crypto(CryptoError),

    #[error("Invalid master password")]
    AuthenticationFailed,

    #[error("No master password has been set up")]
    NotInitialised,

    #[error("A master password is already set up")]
    AlreadyInitialised,

    #[error("Password must be at least {min_len} characters")]
    WeakPassword { min_len: usize },

    #[error("{count} stored attribute(s) cannot be decrypted with the current key; credentials left unchanged")]
    UndecryptableAttributes { count: usize },

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Cannot determine data directory")]
    NoDataDir,

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Locked-session errors become `VaultLocked` so a caller can never confuse a
/// missing key with a tampered record.
impl From<CryptoError> for StoreError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::SessionLocked => StoreError::VaultLocked,
            other => StoreError::Crypto(other),
        }
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::Task(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_session_maps_to_vault_locked() {
        assert!(matches!(
            StoreError::from(CryptoError::SessionLocked),
            StoreError::VaultLocked
        ));
        assert!(matches!(
            StoreError::from(CryptoError::AeadDecrypt),
            StoreError::Crypto(CryptoError::AeadDecrypt)
        ));
    }
}
