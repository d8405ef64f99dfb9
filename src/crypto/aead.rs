use std::fmt;
use std::str::FromStr;

use aes_gcm::Aes256Gcm;
use chacha20poly1305::{
    ChaCha20Poly1305,
    aead::{Aead, KeyInit},
};
use zeroize::Zeroizing;

use super::{NONCE_LEN, SALT_LEN, TAG_LEN};
use crate::crypto::kdf::{CostParams, derive_key, generate_nonce, generate_salt};
use crate::error::CryptoError;
use crate::format::Artifact;

/// The two supported AEAD constructions.
///
/// Both use 256-bit keys, 96-bit nonces, and 128-bit tags, so every field
/// of the persisted artifact has the same shape regardless of algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Aes256Gcm,
    ChaCha20Poly1305,
}

impl Algorithm {
    /// The token recorded in the artifact header.
    pub fn token(&self) -> &'static str {
        match self {
            Algorithm::Aes256Gcm => "AES-256-GCM",
            Algorithm::ChaCha20Poly1305 => "ChaCha20-Poly1305",
        }
    }

    /// Resolve a header token. Only the exact recorded spellings match.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "AES-256-GCM" => Some(Algorithm::Aes256Gcm),
            "ChaCha20-Poly1305" => Some(Algorithm::ChaCha20Poly1305),
            _ => None,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Algorithm {
    type Err = CryptoError;

    /// Accepts the short CLI spellings as well as the header tokens.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aes" | "aes-gcm" | "aes-256-gcm" => Ok(Algorithm::Aes256Gcm),
            "chacha20" | "chacha20-poly1305" => Ok(Algorithm::ChaCha20Poly1305),
            _ => Err(CryptoError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// Output of one encryption operation.
#[derive(Debug)]
pub struct EncryptionResult {
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_LEN],
}

/// Encrypt key material under a passphrase-derived key.
///
/// Generates a fresh salt and nonce, derives the key with Argon2id, seals
/// with no associated data, and splits the trailing authentication tag.
/// The derived key is zeroed before this function returns.
pub fn encrypt(
    plaintext: &[u8],
    passphrase: &[u8],
    algorithm: Algorithm,
    params: CostParams,
) -> Result<EncryptionResult, CryptoError> {
    if plaintext.is_empty() {
        return Err(CryptoError::EmptyPlaintext);
    }

    let salt = generate_salt()?;
    let key = derive_key(passphrase, &salt, params)?;
    let nonce = generate_nonce()?;

    let mut sealed = seal(algorithm, key.as_ref(), &nonce, plaintext)?;
    if sealed.len() < TAG_LEN {
        return Err(CryptoError::Encryption);
    }

    let tag_vec = sealed.split_off(sealed.len() - TAG_LEN);
    let tag: [u8; TAG_LEN] = tag_vec
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::Encryption)?;

    Ok(EncryptionResult {
        salt,
        nonce,
        ciphertext: sealed,
        tag,
    })
}

/// Decrypt an artifact with the passphrase it was sealed under.
///
/// The salt, nonce, algorithm, and cost parameters all come from the
/// artifact itself, so artifacts written with older settings stay
/// decryptable. Every open failure is reported as the same opaque
/// authentication error. The derived key is zeroed on both paths.
pub fn decrypt(artifact: &Artifact, passphrase: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let header = &artifact.header;

    let algorithm = Algorithm::from_token(&header.algorithm)
        .ok_or_else(|| CryptoError::UnsupportedAlgorithm(header.algorithm.clone()))?;
    let params = CostParams::new(header.iterations, header.memory, header.threads)?;

    let key = derive_key(passphrase, &artifact.salt, params)?;

    let mut sealed = Vec::with_capacity(artifact.ciphertext.len() + artifact.tag.len());
    sealed.extend_from_slice(&artifact.ciphertext);
    sealed.extend_from_slice(&artifact.tag);

    let plaintext = open(algorithm, key.as_ref(), &artifact.nonce, &sealed)?;
    Ok(Zeroizing::new(plaintext))
}

/// Single dispatch point for the seal direction.
fn seal(
    algorithm: Algorithm,
    key: &[u8],
    nonce: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    match algorithm {
        Algorithm::Aes256Gcm => {
            let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::Encryption)?;
            cipher
                .encrypt(aes_gcm::Nonce::from_slice(nonce), plaintext)
                .map_err(|_| CryptoError::Encryption)
        }
        Algorithm::ChaCha20Poly1305 => {
            let cipher =
                ChaCha20Poly1305::new_from_slice(key).map_err(|_| CryptoError::Encryption)?;
            cipher
                .encrypt(chacha20poly1305::Nonce::from_slice(nonce), plaintext)
                .map_err(|_| CryptoError::Encryption)
        }
    }
}

/// Single dispatch point for the open direction.
fn open(
    algorithm: Algorithm,
    key: &[u8],
    nonce: &[u8],
    sealed: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    // A truncated nonce can only come from an unvalidated artifact; report
    // it the same way as any other failed open.
    if nonce.len() != NONCE_LEN {
        return Err(CryptoError::Authentication);
    }

    match algorithm {
        Algorithm::Aes256Gcm => {
            let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::Authentication)?;
            cipher
                .decrypt(aes_gcm::Nonce::from_slice(nonce), sealed)
                .map_err(|_| CryptoError::Authentication)
        }
        Algorithm::ChaCha20Poly1305 => {
            let cipher =
                ChaCha20Poly1305::new_from_slice(key).map_err(|_| CryptoError::Authentication)?;
            cipher
                .decrypt(chacha20poly1305::Nonce::from_slice(nonce), sealed)
                .map_err(|_| CryptoError::Authentication)
        }
    }
}
