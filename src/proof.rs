//! # Signature Verification
//!
//! Format-dispatched signature verification for the three credential
//! securing mechanisms. Low-level cryptographic primitives (Ed25519 point
//! arithmetic, JWS parsing) are provided by `ed25519-dalek` and standard
//! base64/multibase decoding; only their pass/fail outcome is consumed by
//! the credential evaluator.
//!
//! **`w3c-jsonld` canonicalization.** The reference algorithm for Data
//! Integrity proofs canonicalizes both the proof options and the document
//! via URDNA2015 to N-Quads before hashing. No RDF canonicalization crate
//! is available in this stack, so this module substitutes JCS (RFC 8785)
//! canonicalization of the same two JSON structures — sufficient to detect
//! any tampering with the signed content, since JCS is still a
//! deterministic, injective encoding of the same JSON value, but it is not
//! a drop-in replacement for cross-implementation N-Quads interop. This is
//! recorded as a deliberate simplification in the project's design notes.

use base64ct::{Base64UrlUnpadded, Encoding};
use credibil_did::DidResolver;
use ed25519_dalek::{Signature, Verifier as _, VerifyingKey};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::core::did_jwk;
use crate::model::{AnonCredsCredential, DataIntegrityProof, JsonLdCredential};

/// Verifies a `w3c-jsonld` credential's embedded Data Integrity proof.
///
/// # Errors
///
/// Returns an error describing why verification failed: missing/invalid
/// proof shape, key resolution failure, or signature mismatch.
pub async fn verify_jsonld<R>(credential: &JsonLdCredential, resolver: &R) -> anyhow::Result<()>
where
    R: DidResolver + Clone + Send + Sync,
{
    let proof = credential
        .proof
        .as_ref()
        .and_then(|p| p.as_slice().first())
        .ok_or_else(|| anyhow::anyhow!("credential has no embedded proof"))?;

    let document_json = serde_json::to_value(credential)?;
    let Value::Object(mut document_map) = document_json else {
        return Err(anyhow::anyhow!("credential did not serialize to an object"));
    };
    document_map.remove("proof");

    let proof_options = proof_options_json(proof, &document_map)?;

    let document_bytes = crate::jcs::canonicalize(&Value::Object(document_map))?;
    let options_bytes = crate::jcs::canonicalize(&proof_options)?;

    let mut verify_data = Vec::with_capacity(64);
    verify_data.extend_from_slice(&Sha256::digest(&options_bytes));
    verify_data.extend_from_slice(&Sha256::digest(&document_bytes));

    let (_base, signature_bytes) = multibase::decode(&proof.proof_value)
        .map_err(|e| anyhow::anyhow!("proofValue is not valid multibase: {e}"))?;
    let signature_bytes: [u8; 64] = signature_bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("proofValue is not a 64-byte Ed25519 signature"))?;
    let signature = Signature::from_bytes(&signature_bytes);

    let jwk = did_jwk(&proof.verification_method, resolver).await?;
    let key = verifying_key_from_jwk(&jwk.x)?;

    key.verify(&verify_data, &signature).map_err(|e| anyhow::anyhow!("signature invalid: {e}"))
}

fn proof_options_json(proof: &DataIntegrityProof, document: &Map<String, Value>) -> anyhow::Result<Value> {
    let mut options = serde_json::to_value(proof)?;
    let Value::Object(map) = &mut options else {
        return Err(anyhow::anyhow!("proof did not serialize to an object"));
    };
    map.remove("proofValue");
    if let Some(context) = document.get("@context") {
        map.insert("@context".to_string(), context.clone());
    }
    Ok(options)
}

/// Verifies a `w3c-jwt` credential: decodes the compact JWS, resolves the
/// header's `kid` to a public key, and checks the signature. Expiry/`nbf`
/// checks are intentionally not performed here — validity-window handling
/// happens later in the evaluation pipeline, at the effective-issuance-time
/// step, not in the cryptographic check.
///
/// # Errors
///
/// Returns an error if the JWS is malformed, the header lacks a `kid`, key
/// resolution fails, or the signature does not verify.
pub async fn verify_jwt<R>(jws: &str, resolver: &R) -> anyhow::Result<()>
where
    R: DidResolver + Clone + Send + Sync,
{
    let mut parts = jws.split('.');
    let (Some(header_b64), Some(payload_b64), Some(sig_b64)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(anyhow::anyhow!("JWS must have three dot-separated parts"));
    };

    let header_bytes = Base64UrlUnpadded::decode_vec(header_b64)
        .map_err(|e| anyhow::anyhow!("JWS header is not valid base64url: {e}"))?;
    let header: Value = serde_json::from_slice(&header_bytes)?;
    let kid = header
        .get("kid")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("JWS header has no kid"))?;

    let signature_bytes = Base64UrlUnpadded::decode_vec(sig_b64)
        .map_err(|e| anyhow::anyhow!("JWS signature is not valid base64url: {e}"))?;
    let signature_bytes: [u8; 64] = signature_bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("JWS signature is not a 64-byte Ed25519 signature"))?;
    let signature = Signature::from_bytes(&signature_bytes);

    let jwk = did_jwk(kid, resolver).await?;
    let key = verifying_key_from_jwk(&jwk.x)?;

    let signing_input = format!("{header_b64}.{payload_b64}");
    key.verify(signing_input.as_bytes(), &signature).map_err(|e| anyhow::anyhow!("signature invalid: {e}"))
}

/// Verifies an `anoncreds` credential. Zero-knowledge proof verification is
/// delegated to an AnonCreds registry, which this resolver does not itself
/// host; with no registry configured, verification always fails closed.
///
/// # Errors
///
/// Always returns an error, naming the missing-registry condition.
pub fn verify_anoncreds(_credential: &AnonCredsCredential) -> anyhow::Result<()> {
    Err(anyhow::anyhow!("no AnonCreds registry configured to verify zero-knowledge proofs"))
}

fn verifying_key_from_jwk(x: &str) -> anyhow::Result<VerifyingKey> {
    let bytes = Base64UrlUnpadded::decode_vec(x).map_err(|e| anyhow::anyhow!("invalid JWK x value: {e}"))?;
    let bytes: [u8; 32] =
        bytes.try_into().map_err(|_| anyhow::anyhow!("JWK x value is not a 32-byte Ed25519 key"))?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| anyhow::anyhow!("invalid Ed25519 public key: {e}"))
}
