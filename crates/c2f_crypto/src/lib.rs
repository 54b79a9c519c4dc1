//! c2f_crypto — Click2Fetch cryptographic core
//!
//! # Design principles
//! - NO custom crypto; all primitives come from audited Rust crates.
//! - Zeroize all secret material on drop.
//! - Keys are opaque newtypes with redacted `Debug`; the session manager
//!   only lends its key to a closure for the duration of one operation.
//!
//! # Module layout
//! - `kdf`      — Argon2id key derivation, salts, password verifier
//! - `aead`     — AES-256-GCM field encryption (ciphertext, nonce, tag)
//! - `session`  — single-slot session key with lock/unlock and idle expiry
//! - `error`    — unified error type

pub mod aead;
pub mod error;
pub mod kdf;
pub mod session;

pub use aead::{EncodedData, EncryptedData};
pub use error::CryptoError;
pub use kdf::VaultKey;
pub use session::SessionKeyManager;
