//! c2f_store — Encrypted local secrets store for Click2Fetch
//!
//! # Encryption strategy
//! SQLite does NOT natively encrypt.  We use application-level encryption:
//! - Every attribute value is stored as AES-256-GCM ciphertext with its
//!   nonce and tag in separate base64 columns, regardless of whether the
//!   attribute is marked sensitive.
//! - The vault key is derived from the master password via Argon2id and held
//!   in memory only while the vault is unlocked (`SessionKeyManager`).
//! - Entry metadata (title, notes, icon, timestamps) is plaintext so titles
//!   can be searched.
//!
//! # Read policy
//! An attribute that fails to decrypt is left out of the result and listed
//! in `LoadedEntry::dropped`; it never hides the rest of its entry.
//!
//! # Migration
//! SQLx migrations in `migrations/` run on open and via `Store::initialize`.

pub mod credentials;
pub mod db;
pub mod entries;
pub mod error;
pub mod models;
pub mod paths;
pub mod settings;

pub use c2f_crypto::SessionKeyManager;
pub use credentials::MIN_PASSWORD_LEN;
pub use db::Store;
pub use error::StoreError;
pub use models::{
    Attribute, AttributeType, DropReason, DroppedAttribute, Entry, LoadedAttributes, LoadedEntry,
};
pub use settings::{Settings, StoredCredentials};
