//! Cryptographic core for encrypted key backups.
//!
//! Provides Argon2id key derivation, authenticated encryption with a
//! selectable AEAD, and secure random material generation.

pub mod aead;
pub mod kdf;

pub use aead::{Algorithm, EncryptionResult, decrypt, encrypt};
pub use kdf::{CostParams, derive_key, generate_nonce, generate_salt};

/// Length of the KDF salt (32 bytes).
pub const SALT_LEN: usize = 32;
/// Length of the AEAD nonce (12 bytes for both supported ciphers).
pub const NONCE_LEN: usize = 12;
/// Length of the authentication tag (16 bytes).
pub const TAG_LEN: usize = 16;
/// Length of the encryption key (32 bytes / 256 bits).
pub const KEY_LEN: usize = 32;
