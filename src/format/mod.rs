//! Encrypted artifact format.
//!
//! An artifact is a self-describing JSON document: a metadata header plus
//! the cryptographic fields (salt, nonce, ciphertext, tag) encoded as
//! standard base64. Parsing is deliberately permissive — unknown header
//! tokens survive deserialization so that [`validate`] can reject them
//! with a precise reason.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{Algorithm, CostParams};

pub mod validate;

pub use validate::validate;

/// The single file format version this build reads and writes.
pub const VERSION: &str = "1.0";
/// The single recognized key derivation function.
pub const KDF_ARGON2ID: &str = "Argon2id";

/// Metadata describing how an artifact was encrypted.
///
/// Token fields stay `String`s: the parser accepts whatever is on disk and
/// the validator decides what is trusted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub version: String,
    pub algorithm: String,
    pub kdf: String,
    pub iterations: u32,
    /// Argon2 memory cost in MB.
    pub memory: u32,
    pub threads: u8,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

impl Header {
    pub fn new(algorithm: Algorithm, params: CostParams, comment: String) -> Self {
        Self {
            version: VERSION.to_string(),
            algorithm: algorithm.token().to_string(),
            kdf: KDF_ARGON2ID.to_string(),
            iterations: params.iterations(),
            memory: params.memory_mb(),
            threads: params.threads(),
            timestamp: Utc::now(),
            comment,
        }
    }
}

/// One encrypted key backup: header plus cryptographic fields.
///
/// Immutable once written; restoring never mutates an artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub header: Header,
    #[serde(with = "base64_bytes")]
    pub salt: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub nonce: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub tag: Vec<u8>,
}

impl Artifact {
    pub fn new(header: Header, result: crate::crypto::EncryptionResult) -> Self {
        Self {
            header,
            salt: result.salt.to_vec(),
            nonce: result.nonce.to_vec(),
            ciphertext: result.ciphertext,
            tag: result.tag.to_vec(),
        }
    }

    /// Serialize to pretty-printed JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    /// Parse an artifact from JSON bytes.
    ///
    /// Succeeding here means only that the document is well-formed; run
    /// [`validate`] before trusting any field.
    pub fn from_json(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{NONCE_LEN, SALT_LEN, TAG_LEN};

    fn sample() -> Artifact {
        Artifact {
            header: Header::new(
                Algorithm::Aes256Gcm,
                CostParams::new(1, 8, 1).unwrap(),
                "laptop key".to_string(),
            ),
            salt: vec![1u8; SALT_LEN],
            nonce: vec![2u8; NONCE_LEN],
            ciphertext: vec![3u8; 40],
            tag: vec![4u8; TAG_LEN],
        }
    }

    #[test]
    fn json_roundtrip() {
        let artifact = sample();

        let bytes = artifact.to_json().unwrap();
        let parsed = Artifact::from_json(&bytes).unwrap();

        assert_eq!(parsed.header.version, VERSION);
        assert_eq!(parsed.header.algorithm, "AES-256-GCM");
        assert_eq!(parsed.header.kdf, KDF_ARGON2ID);
        assert_eq!(parsed.header.iterations, 1);
        assert_eq!(parsed.header.memory, 8);
        assert_eq!(parsed.header.threads, 1);
        assert_eq!(parsed.header.comment, "laptop key");
        assert_eq!(parsed.salt, artifact.salt);
        assert_eq!(parsed.nonce, artifact.nonce);
        assert_eq!(parsed.ciphertext, artifact.ciphertext);
        assert_eq!(parsed.tag, artifact.tag);
    }

    #[test]
    fn byte_fields_are_base64_strings() {
        let bytes = sample().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        let salt = value["salt"].as_str().unwrap();
        assert_eq!(
            base64::Engine::decode(&base64::engine::general_purpose::STANDARD, salt).unwrap(),
            vec![1u8; SALT_LEN]
        );
    }

    #[test]
    fn empty_comment_is_omitted() {
        let mut artifact = sample();
        artifact.header.comment.clear();

        let bytes = artifact.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert!(value["header"].get("comment").is_none());
    }

    #[test]
    fn parser_keeps_unrecognized_tokens() {
        let mut artifact = sample();
        artifact.header.version = "9.9".to_string();
        artifact.header.algorithm = "ROT13".to_string();

        let bytes = artifact.to_json().unwrap();
        let parsed = Artifact::from_json(&bytes).unwrap();

        // Policy belongs to the validator, not the parser.
        assert_eq!(parsed.header.version, "9.9");
        assert_eq!(parsed.header.algorithm, "ROT13");
    }

    #[test]
    fn malformed_json_fails_to_parse() {
        assert!(Artifact::from_json(b"{not json").is_err());
        assert!(Artifact::from_json(b"{}").is_err());
    }

    #[test]
    fn timestamp_is_rfc3339() {
        let bytes = sample().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        let ts = value["header"]["timestamp"].as_str().unwrap();
        assert!(ts.parse::<DateTime<Utc>>().is_ok());
    }
}
