use std::fmt;

use crate::crypto::{NONCE_LEN, SALT_LEN, TAG_LEN};

/// Errors produced by the encryption core.
#[derive(Debug)]
pub enum CryptoError {
    /// The requested algorithm token is not one this build knows.
    UnsupportedAlgorithm(String),
    /// The OS secure random source is unavailable. Fatal, never retried.
    RandomUnavailable,
    /// Argon2 rejected the supplied cost parameters.
    InvalidParams(String),
    /// The AEAD seal operation failed.
    Encryption,
    /// The AEAD open operation failed. Tampering, truncation, and a wrong
    /// passphrase are all reported the same way.
    Authentication,
    /// Zero-length key material was passed to encrypt.
    EmptyPlaintext,
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::UnsupportedAlgorithm(a) => write!(f, "unsupported algorithm: {a}"),
            CryptoError::RandomUnavailable => write!(f, "OS random generator unavailable"),
            CryptoError::InvalidParams(m) => write!(f, "invalid Argon2 parameters: {m}"),
            CryptoError::Encryption => write!(f, "encryption failed"),
            CryptoError::Authentication => write!(f, "decryption failed (wrong passphrase?)"),
            CryptoError::EmptyPlaintext => write!(f, "refusing to encrypt empty key material"),
        }
    }
}

impl std::error::Error for CryptoError {}

/// Structural validation failures for a parsed artifact.
///
/// Each variant corresponds to one check in [`crate::format::validate`];
/// the first failing check is the one reported.
#[derive(Debug)]
pub enum FormatError {
    UnsupportedVersion(String),
    UnsupportedAlgorithm(String),
    UnsupportedKdf(String),
    SaltLength(usize),
    NonceLength(usize),
    TagLength(usize),
    EmptyCiphertext,
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::UnsupportedVersion(v) => write!(f, "unsupported file version: {v}"),
            FormatError::UnsupportedAlgorithm(a) => write!(f, "unsupported algorithm: {a}"),
            FormatError::UnsupportedKdf(k) => write!(f, "unsupported KDF: {k}"),
            FormatError::SaltLength(n) => {
                write!(f, "invalid salt length: expected {SALT_LEN}, got {n}")
            }
            FormatError::NonceLength(n) => {
                write!(f, "invalid nonce length: expected {NONCE_LEN}, got {n}")
            }
            FormatError::TagLength(n) => {
                write!(f, "invalid tag length: expected {TAG_LEN}, got {n}")
            }
            FormatError::EmptyCiphertext => write!(f, "empty ciphertext"),
        }
    }
}

impl std::error::Error for FormatError {}
