//! Structural validation of a parsed artifact.
//!
//! Runs before any decryption so malformed artifacts are rejected without
//! touching key material. Version and KDF pinning is strict: anything not
//! byte-identical to the recognized tokens is rejected.

use super::{Artifact, KDF_ARGON2ID, VERSION};
use crate::crypto::{Algorithm, NONCE_LEN, SALT_LEN, TAG_LEN};
use crate::error::FormatError;

/// Check every structural invariant of an artifact.
///
/// Checks run in a fixed order and the first failure is reported.
pub fn validate(artifact: &Artifact) -> Result<(), FormatError> {
    let header = &artifact.header;

    if header.version != VERSION {
        return Err(FormatError::UnsupportedVersion(header.version.clone()));
    }

    if Algorithm::from_token(&header.algorithm).is_none() {
        return Err(FormatError::UnsupportedAlgorithm(header.algorithm.clone()));
    }

    if header.kdf != KDF_ARGON2ID {
        return Err(FormatError::UnsupportedKdf(header.kdf.clone()));
    }

    if artifact.salt.len() != SALT_LEN {
        return Err(FormatError::SaltLength(artifact.salt.len()));
    }

    if artifact.nonce.len() != NONCE_LEN {
        return Err(FormatError::NonceLength(artifact.nonce.len()));
    }

    if artifact.tag.len() != TAG_LEN {
        return Err(FormatError::TagLength(artifact.tag.len()));
    }

    if artifact.ciphertext.is_empty() {
        return Err(FormatError::EmptyCiphertext);
    }

    Ok(())
}
