//! JSON canonicalization and digest helpers.
//!
//! Two distinct digests are computed over schema/credential JSON in this
//! pipeline:
//!
//! * the **ECS digest** — SHA-384 over the JCS (RFC 8785) canonical bytes of
//!   a credential schema with `$id` stripped, used to classify a schema's
//!   ECS type by comparing against four reference digests;
//! * the **SRI digest** — `<alg>-<base64>` per the Subresource Integrity
//!   spec, used to verify on-chain schema/credential content against a
//!   `digestSRI` claim, with the hash algorithm taken from the claim rather
//!   than fixed to SHA-384.
//!
//! Canonicalization itself is delegated to `serde_jcs`, consistent with how
//! the rest of this codebase prefers an ecosystem crate over a hand-rolled
//! equivalent.

use base64ct::{Base64, Encoding};
use serde_json::Value;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::error::{Error, Result};

/// Canonicalizes `value` per RFC 8785 and returns the resulting bytes.
///
/// # Errors
///
/// Returns an error if `value` cannot be serialized (e.g. contains
/// non-finite floats, which JCS cannot represent).
pub fn canonicalize(value: &Value) -> Result<Vec<u8>> {
    serde_jcs::to_vec(value)
        .map_err(|e| Error::Other(anyhow::anyhow!("JCS canonicalization failed: {e}")))
}

/// Parses `schema_text` as JSON, removes a top-level `$id` if present, and
/// returns the SHA-384 digest of the JCS-canonical bytes.
///
/// Digest computation is insensitive to `$id`: two schemas that differ only
/// in `$id` (e.g. the same schema re-published under a different VPR URI)
/// produce the same digest and therefore the same ECS classification.
///
/// # Errors
///
/// Returns an error if `schema_text` is not valid JSON or cannot be
/// canonicalized.
pub fn ecs_digest(schema_text: &str) -> Result<[u8; 48]> {
    let mut value: Value = serde_json::from_str(schema_text)
        .map_err(|e| Error::Other(anyhow::anyhow!("invalid JSON schema: {e}")))?;
    if let Value::Object(map) = &mut value {
        map.remove("$id");
    }
    let bytes = canonicalize(&value)?;
    let digest = Sha384::digest(&bytes);
    Ok(digest.into())
}

/// Hex-encodes an ECS digest for comparison against the four configured
/// reference digests.
#[must_use]
pub fn to_hex(digest: &[u8]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Supported SRI hash algorithms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SriAlgorithm {
    /// `sha256-...`
    Sha256,
    /// `sha384-...`
    Sha384,
    /// `sha512-...`
    Sha512,
}

impl SriAlgorithm {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "sha256" => Some(Self::Sha256),
            "sha384" => Some(Self::Sha384),
            "sha512" => Some(Self::Sha512),
            _ => None,
        }
    }

    fn digest(self, bytes: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha256 => Sha256::digest(bytes).to_vec(),
            Self::Sha384 => Sha384::digest(bytes).to_vec(),
            Self::Sha512 => Sha512::digest(bytes).to_vec(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }
}

/// Computes the SRI digest of `bytes` using `alg` (`"sha256"`, `"sha384"`,
/// or `"sha512"`), formatted as `<alg>-<base64>`.
///
/// # Errors
///
/// Returns an error if `alg` names an unsupported hash function.
pub fn sri_digest(alg: &str, bytes: &[u8]) -> Result<String> {
    let algorithm = SriAlgorithm::parse(alg)
        .ok_or_else(|| Error::Other(anyhow::anyhow!("unsupported SRI algorithm: {alg}")))?;
    let hash = algorithm.digest(bytes);
    Ok(format!("{}-{}", algorithm.name(), Base64::encode_string(&hash)))
}

/// Splits a `<alg>-<base64>` SRI string into its algorithm and digest bytes.
///
/// # Errors
///
/// Returns an error if `sri` is not well-formed.
pub fn parse_sri(sri: &str) -> Result<(&str, Vec<u8>)> {
    let (alg, encoded) = sri
        .split_once('-')
        .ok_or_else(|| Error::Other(anyhow::anyhow!("malformed SRI digest: {sri}")))?;
    let bytes = Base64::decode_vec(encoded)
        .map_err(|e| Error::Other(anyhow::anyhow!("malformed SRI digest base64: {e}")))?;
    Ok((alg, bytes))
}

/// Verifies that `bytes` match a declared `digestSRI` value, using whichever
/// algorithm the declaration names.
///
/// # Errors
///
/// Returns an error if the declared digest is malformed or names an
/// unsupported algorithm.
pub fn verify_sri(declared: &str, bytes: &[u8]) -> Result<bool> {
    let (alg, expected) = parse_sri(declared)?;
    let algorithm = SriAlgorithm::parse(alg)
        .ok_or_else(|| Error::Other(anyhow::anyhow!("unsupported SRI algorithm: {alg}")))?;
    Ok(algorithm.digest(bytes) == expected)
}
