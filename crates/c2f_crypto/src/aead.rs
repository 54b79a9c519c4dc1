//! Authenticated Encryption with Associated Data
//!
//! Uses AES-256-GCM with an empty associated-data context.
//! Key size: 32 bytes.  Nonce: 12 bytes (random, fresh per call).  Tag: 16 bytes.
//!
//! Field format: three independent blobs, stored base64-encoded in separate
//! columns:
//!   ciphertext (same length as the UTF-8 plaintext) | nonce | tag
//!
//! There is no nonce counter. Every `encrypt` draws 96 random bits from the
//! OS RNG; at vault write volumes a collision is negligible.

use aes_gcm::{
    aead::{AeadInPlace, KeyInit},
    Aes256Gcm, Nonce, Tag,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::{rngs::OsRng, RngCore};
use zeroize::{Zeroize, Zeroizing};

use crate::error::CryptoError;
use crate::kdf::KEY_LEN;

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// One encrypted field. Meaningless without the exact key that produced it.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedData {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_LEN],
    pub tag: [u8; TAG_LEN],
}

/// Text-safe form of [`EncryptedData`], as persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedData {
    pub ciphertext: String,
    pub nonce: String,
    pub tag: String,
}

impl EncryptedData {
    /// Build from raw parts, rejecting wrong nonce/tag lengths up front.
    pub fn from_parts(ciphertext: Vec<u8>, nonce: &[u8], tag: &[u8]) -> Result<Self, CryptoError> {
        let nonce: [u8; NONCE_LEN] = nonce.try_into().map_err(|_| CryptoError::InvalidLength {
            field: "nonce",
            expected: NONCE_LEN,
            actual: nonce.len(),
        })?;
        let tag: [u8; TAG_LEN] = tag.try_into().map_err(|_| CryptoError::InvalidLength {
            field: "tag",
            expected: TAG_LEN,
            actual: tag.len(),
        })?;
        Ok(Self { ciphertext, nonce, tag })
    }

    pub fn encode(&self) -> EncodedData {
        EncodedData {
            ciphertext: STANDARD.encode(&self.ciphertext),
            nonce: STANDARD.encode(self.nonce),
            tag: STANDARD.encode(self.tag),
        }
    }

    pub fn decode(encoded: &EncodedData) -> Result<Self, CryptoError> {
        let ciphertext = STANDARD.decode(&encoded.ciphertext)?;
        let nonce = STANDARD.decode(&encoded.nonce)?;
        let tag = STANDARD.decode(&encoded.tag)?;
        Self::from_parts(ciphertext, &nonce, &tag)
    }
}

impl std::fmt::Debug for EncryptedData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedData")
            .field("ciphertext_len", &self.ciphertext.len())
            .field("nonce", &self.nonce)
            .finish_non_exhaustive()
    }
}

fn cipher(key: &[u8; KEY_LEN]) -> Result<Aes256Gcm, CryptoError> {
    Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::InvalidKey("AES-256 key must be 32 bytes".into()))
}

/// Encrypt `plaintext` under `key` with a fresh random nonce.
pub fn encrypt(plaintext: &str, key: &[u8; KEY_LEN]) -> Result<EncryptedData, CryptoError> {
    let cipher = cipher(key)?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let mut buffer = plaintext.as_bytes().to_vec();
    let tag = match cipher.encrypt_in_place_detached(Nonce::from_slice(&nonce), b"", &mut buffer) {
        Ok(tag) => tag,
        Err(_) => {
            buffer.zeroize();
            return Err(CryptoError::AeadEncrypt);
        }
    };

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(&tag);
    Ok(EncryptedData {
        ciphertext: buffer,
        nonce,
        tag: tag_bytes,
    })
}

/// Decrypt and authenticate. Returns no bytes at all unless the tag verifies.
pub fn decrypt(data: &EncryptedData, key: &[u8; KEY_LEN]) -> Result<Zeroizing<String>, CryptoError> {
    let cipher = cipher(key)?;

    let mut buffer = Zeroizing::new(data.ciphertext.clone());
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(&data.nonce),
            b"",
            &mut *buffer,
            Tag::from_slice(&data.tag),
        )
        .map_err(|_| CryptoError::AeadDecrypt)?;

    let bytes = std::mem::take(&mut *buffer);
    match String::from_utf8(bytes) {
        Ok(text) => Ok(Zeroizing::new(text)),
        Err(err) => {
            err.into_bytes().zeroize();
            Err(CryptoError::Utf8)
        }
    }
}
