//! Key derivation
//!
//! `derive_key`: Argon2id, turns the master password + 32-byte salt into
//!   the 32-byte key that encrypts every attribute value.
//!
//! `hash_password`: the same Argon2id run, reduced to a storable verifier.
//!   The verifier is a domain-separated SHA-256 digest of the derived key, so
//!   the settings table never holds the encryption key itself. Because both
//!   come from the same (password, salt) pair, changing either one means a
//!   new key AND a new verifier.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

pub const SALT_LEN: usize = 32;
pub const KEY_LEN: usize = 32;

pub const KDF_TIME_COST: u32 = 3;
pub const KDF_MEMORY_COST: u32 = 64 * 1024; // KiB, i.e. 64 MiB
pub const KDF_PARALLELISM: u32 = 4;

const VERIFIER_DOMAIN: &[u8] = b"c2f-password-verifier-v1\x00";

// ── Vault key ────────────────────────────────────────────────────────────────

/// 32-byte symmetric key derived from the master password. Zeroized on drop.
///
/// Deliberately not `Clone`: a key has one owner at a time, and handing it to
/// the session manager moves it there.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct VaultKey([u8; KEY_LEN]);

impl VaultKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VaultKey([REDACTED])")
    }
}

// ── Argon2id ─────────────────────────────────────────────────────────────────

/// OWASP baseline for interactive unlock: 3 passes over 64 MiB, 4 lanes.
fn argon2_params() -> Params {
    Params::new(
        KDF_MEMORY_COST,
        KDF_TIME_COST,
        KDF_PARALLELISM,
        Some(KEY_LEN),
    )
    .expect("Static Argon2 params are always valid")
}

/// Generate a fresh random salt. Store it in the settings table (not secret).
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive the vault key. Deterministic for identical (password, salt).
///
/// Memory-hard and deliberately slow; async callers should run it on a
/// blocking thread.
pub fn derive_key(password: &str, salt: &[u8; SALT_LEN]) -> Result<VaultKey, CryptoError> {
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params());
    let mut output = [0u8; KEY_LEN];
    let result = argon2
        .hash_password_into(password.as_bytes(), salt, &mut output)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()));
    let key = VaultKey(output);
    output.zeroize();
    result.map(|_| key)
}

/// Compute the storable verifier for `password` under `salt`.
pub fn hash_password(password: &str, salt: &[u8; SALT_LEN]) -> Result<String, CryptoError> {
    let key = derive_key(password, salt)?;
    Ok(verifier_for_key(&key))
}

/// One Argon2 run producing both the key and its verifier.
pub fn derive_key_and_hash(
    password: &str,
    salt: &[u8; SALT_LEN],
) -> Result<(VaultKey, String), CryptoError> {
    let key = derive_key(password, salt)?;
    let verifier = verifier_for_key(&key);
    Ok((key, verifier))
}

/// Recompute the verifier and compare it with `stored_hash` in constant time.
///
/// A malformed `stored_hash` is reported as an error rather than a mismatch,
/// since it means the settings record is damaged, not that the password is
/// wrong.
pub fn verify_password(
    password: &str,
    salt: &[u8; SALT_LEN],
    stored_hash: &str,
) -> Result<bool, CryptoError> {
    let key = derive_key(password, salt)?;
    verify_key(&key, stored_hash)
}

/// Check an already-derived key against a stored verifier.
pub fn verify_key(key: &VaultKey, stored_hash: &str) -> Result<bool, CryptoError> {
    let stored = decode_verifier(stored_hash)?;
    let computed = verifier_digest(key);
    Ok(constant_time_eq(&computed, &stored))
}

fn verifier_digest(key: &VaultKey) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(VERIFIER_DOMAIN);
    hasher.update(key.as_bytes());
    hasher.finalize().into()
}

fn verifier_for_key(key: &VaultKey) -> String {
    STANDARD.encode(verifier_digest(key))
}

fn decode_verifier(stored_hash: &str) -> Result<[u8; 32], CryptoError> {
    let bytes = STANDARD.decode(stored_hash)?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| CryptoError::InvalidLength {
        field: "password hash",
        expected: 32,
        actual,
    })
}

/// No early exit: every byte is compared regardless of earlier mismatches.
fn constant_time_eq(a: &[u8; 32], b: &[u8; 32]) -> bool {
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
