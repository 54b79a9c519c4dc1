use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("AEAD encryption failed")]
    AeadEncrypt,

    #[error("AEAD decryption failed (authentication tag mismatch — possible tampering or wrong key)")]
    AeadDecrypt,

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Invalid {field} length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Session key not set — unlock the vault first")]
    SessionLocked,

    #[error("Decrypted value is not valid UTF-8")]
    Utf8,

    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}

impl CryptoError {
    /// True for failures that mean the ciphertext could not be authenticated
    /// or parsed, as opposed to caller misuse.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            CryptoError::AeadDecrypt
                | CryptoError::InvalidLength { .. }
                | CryptoError::Utf8
                | CryptoError::Base64Decode(_)
        )
    }
}
