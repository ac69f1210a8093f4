//! # Credential Evaluator
//!
//! Evaluates one dereferenced credential against its presenting DID:
//! signature verification, schema resolution, digest verification, ECS
//! classification, effective issuance time, issuer authorization and
//! permission-chain construction. Short-circuits to a [`FailedCredential`] on
//! the first failing step; a credential that passes every check but carries
//! no recognized ECS type is classified `IGNORED` rather than `VALID`.

use std::collections::HashMap;

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use credibil_did::DidResolver;
use serde_json::{Map, Value};

use crate::config::EcsDigests;
use crate::indexer::{IndexerClient, PermissionFilter};
use crate::jcs;
use crate::model::{
    CredentialEvaluation, CredentialResultStatus, Did, FailedCredential, FailureCode, JsonLdCredential,
    PermissionState, TrustResult, VerifiableCredential,
};
use crate::{permission_chain, proof, schema};

/// Everything the credential evaluator needs beyond the credential itself.
pub struct EvalContext<'a, I: IndexerClient> {
    /// The on-chain indexer client.
    pub indexer: &'a I,
    /// The block this evaluation is anchored to.
    pub at_block: u64,
    /// Reference ECS digests.
    pub ecs_digests: &'a EcsDigests,
    /// Skips step 3 (digest-SRI verification) when `true`.
    pub disable_digest_sri: bool,
    /// The shared trust memo, consulted (never recursed into) by the
    /// permission-chain builder.
    pub trust_memo: &'a HashMap<Did, TrustResult>,
}

/// Evaluates `credential`, presented by `presented_by`, returning either its
/// evidence record or the reason it failed.
pub async fn evaluate<R, I>(
    credential: &VerifiableCredential, presented_by: &Did, resolver: &R, ctx: &EvalContext<'_, I>,
) -> Result<CredentialEvaluation, FailedCredential>
where
    R: DidResolver + Clone + Send + Sync,
    I: IndexerClient,
{
    verify_signature(credential, resolver).await.map_err(|e| {
        FailedCredential::new(FailureCode::SignatureInvalid, e.to_string())
            .with_presented_by(presented_by)
    })?;

    let normalized = normalize(credential)
        .map_err(|e| FailedCredential::new(FailureCode::EvaluationError, e.to_string()).with_presented_by(presented_by))?;

    let at_block = Some(ctx.at_block);
    let resolved_schema = match &normalized.schema_ref {
        Some(schema_ref) => schema::resolve_schema_ref(schema_ref, at_block, ctx.indexer)
            .await
            .map_err(|e| fail(&normalized, presented_by, FailureCode::EvaluationError, e.to_string()))?,
        None => None,
    };

    if let (Some(on_chain_schema), Some(declared_sri)) = (&resolved_schema, &normalized.declared_digest_sri) {
        if !ctx.disable_digest_sri {
            let matches = schema::verify_digest_sri(on_chain_schema.id, declared_sri, at_block, ctx.indexer)
                .await
                .map_err(|e| fail(&normalized, presented_by, FailureCode::EvaluationError, e.to_string()))?;
            if !matches {
                return Err(fail(&normalized, presented_by, FailureCode::DigestSriMismatch, "computed digest does not match declared digestSRI".to_string()));
            }
        }
    }

    let ecs_type = resolved_schema.as_ref().and_then(|s| schema::classify_ecs(&s.json_schema, ctx.ecs_digests));

    let effective_issuance_time = effective_issuance_time(credential, &normalized, ctx).await;

    let ecosystem_did = match &resolved_schema {
        Some(s) => ctx.indexer.trust_registry(s.tr_id, at_block).await.ok().flatten().map(|tr| tr.did),
        None => None,
    };

    let mut permission_chain_entries = Vec::new();
    if let Some(on_chain_schema) = &resolved_schema {
        let issuer_filter = PermissionFilter {
            did: Some(normalized.issuer_did.clone()),
            schema_id: Some(on_chain_schema.id),
            type_: Some("ISSUER".to_string()),
            only_valid: true,
        };
        let issuer_perm = ctx
            .indexer
            .list_permissions(&issuer_filter, at_block)
            .await
            .map_err(|e| fail(&normalized, presented_by, FailureCode::EvaluationError, e.to_string()))?
            .into_iter()
            .find(|p| matches!(p.state, PermissionState::Active));

        let Some(issuer_perm) = issuer_perm else {
            return Err(fail(&normalized, presented_by, FailureCode::IssuerNotAuthorized, "no active ISSUER permission for this issuer and schema".to_string()));
        };

        if let Some(ecosystem_did) = &ecosystem_did {
            permission_chain_entries = permission_chain::build_chain(
                &issuer_perm,
                on_chain_schema.issuer_perm_management_mode,
                ecosystem_did,
                at_block,
                ctx.indexer,
                ctx.trust_memo,
            )
            .await
            .map_err(|e| fail(&normalized, presented_by, FailureCode::EvaluationError, e.to_string()))?;
        }
    } else {
        return Err(fail(&normalized, presented_by, FailureCode::IssuerNotAuthorized, "credential's schema reference did not resolve to an on-chain schema".to_string()));
    }

    let result = if ecs_type.is_some() { CredentialResultStatus::Valid } else { CredentialResultStatus::Ignored };

    Ok(CredentialEvaluation {
        credential_id: normalized.credential_id,
        result,
        ecs_type,
        presented_by: presented_by.clone(),
        issued_by: normalized.issuer_did,
        format: credential.format(),
        effective_issuance_time,
        digest_sri: normalized.declared_digest_sri,
        ecosystem_did,
        schema_id: resolved_schema.map(|s| s.id),
        claims: normalized.claims,
        permission_chain: permission_chain_entries,
    })
}

fn fail(normalized: &NormalizedCredential, presented_by: &Did, code: FailureCode, detail: String) -> FailedCredential {
    let mut f = FailedCredential::new(code, detail);
    f.credential_id = normalized.credential_id.clone();
    f.presented_by = Some(presented_by.clone());
    f.issued_by = Some(normalized.issuer_did.clone());
    f
}

trait FailedCredentialExt {
    fn with_presented_by(self, presented_by: &Did) -> Self;
}

impl FailedCredentialExt for FailedCredential {
    fn with_presented_by(mut self, presented_by: &Did) -> Self {
        self.presented_by = Some(presented_by.clone());
        self
    }
}

async fn verify_signature<R>(credential: &VerifiableCredential, resolver: &R) -> anyhow::Result<()>
where
    R: DidResolver + Clone + Send + Sync,
{
    match credential {
        VerifiableCredential::JsonLd(vc) => proof::verify_jsonld(vc, resolver).await,
        VerifiableCredential::Jwt(jws) => proof::verify_jwt(jws, resolver).await,
        VerifiableCredential::AnonCreds(vc) => proof::verify_anoncreds(vc),
    }
}

struct NormalizedCredential {
    credential_id: Option<String>,
    issuer_did: Did,
    claims: Map<String, Value>,
    schema_ref: Option<String>,
    declared_digest_sri: Option<String>,
}

fn normalize(credential: &VerifiableCredential) -> anyhow::Result<NormalizedCredential> {
    match credential {
        VerifiableCredential::JsonLd(vc) => Ok(normalize_jsonld(vc)),
        VerifiableCredential::Jwt(jws) => normalize_jwt(jws),
        VerifiableCredential::AnonCreds(vc) => Ok(NormalizedCredential {
            credential_id: None,
            issuer_did: vc.issuer_did(),
            claims: vc.values.clone(),
            schema_ref: Some(vc.schema_id.clone()),
            declared_digest_sri: None,
        }),
    }
}

fn normalize_jsonld(vc: &JsonLdCredential) -> NormalizedCredential {
    let subject = vc.credential_subject.as_slice().first();
    let claims = subject.map(|s| s.claims.clone()).unwrap_or_default();
    let schema_ref = if vc.is_json_schema_credential() {
        subject.and_then(|s| s.id.clone())
    } else {
        vc.credential_schema.as_ref().and_then(|cs| cs.as_slice().first()).map(|r| r.id.clone())
    };
    let declared_digest_sri = claims.get("digestSRI").and_then(Value::as_str).map(str::to_string).or_else(|| {
        vc.credential_schema.as_ref().and_then(|cs| cs.as_slice().first()).and_then(|r| r.digest_sri.clone())
    });

    NormalizedCredential { credential_id: vc.id.clone(), issuer_did: vc.issuer_did().to_string(), claims, schema_ref, declared_digest_sri }
}

/// Decodes a compact JWS's payload and normalizes it the same way as an
/// embedded JSON-LD credential, unwrapping a `vc` claim if present (the
/// conventional JWT-VC data model nests the credential there).
fn normalize_jwt(jws: &str) -> anyhow::Result<NormalizedCredential> {
    let payload_b64 = jws.split('.').nth(1).ok_or_else(|| anyhow::anyhow!("JWS must have three dot-separated parts"))?;
    let payload_bytes = Base64UrlUnpadded::decode_vec(payload_b64)?;
    let payload: Value = serde_json::from_slice(&payload_bytes)?;
    let vc_value = payload.get("vc").cloned().unwrap_or(payload);
    let vc: JsonLdCredential = serde_json::from_value(vc_value)?;
    Ok(normalize_jsonld(&vc))
}

async fn effective_issuance_time<I: IndexerClient>(
    credential: &VerifiableCredential, normalized: &NormalizedCredential, ctx: &EvalContext<'_, I>,
) -> chrono::DateTime<Utc> {
    if matches!(credential, VerifiableCredential::AnonCreds(_)) {
        return Utc::now();
    }

    let fallback = match credential {
        VerifiableCredential::JsonLd(vc) => vc.issued_or_valid_from(),
        _ => None,
    };

    let Ok(canonical) = serde_json::to_value(credential) else {
        return fallback.unwrap_or_else(Utc::now);
    };
    let Ok(bytes) = jcs::canonicalize(&canonical) else {
        return fallback.unwrap_or_else(Utc::now);
    };
    let Ok(digest_sri) = jcs::sri_digest("sha256", &bytes) else {
        return fallback.unwrap_or_else(Utc::now);
    };

    match ctx.indexer.digest(&digest_sri, Some(ctx.at_block)).await {
        Ok(Some(record)) => record.created,
        _ => fallback.unwrap_or_else(Utc::now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_anoncreds_credential() {
        let vc = crate::model::AnonCredsCredential {
            schema_id: "vpr:verana:mainnet/cs/v1/js/7".into(),
            cred_def_id: "did:web:issuer.example.com/cd/1".into(),
            issuer_did: None,
            values: Map::from_iter([("name".to_string(), Value::String("Acme".to_string()))]),
        };
        let normalized = normalize(&VerifiableCredential::AnonCreds(Box::new(vc))).unwrap();
        assert_eq!(normalized.issuer_did, "did:web:issuer.example.com");
        assert_eq!(normalized.schema_ref.as_deref(), Some("vpr:verana:mainnet/cs/v1/js/7"));
    }

    #[test]
    fn jsonld_json_schema_credential_reads_schema_ref_from_subject_id() {
        let json = serde_json::json!({
            "@context": ["https://www.w3.org/2018/credentials/v1"],
            "type": ["VerifiableCredential", "JsonSchemaCredential"],
            "issuer": "did:web:issuer.example.com",
            "credentialSubject": {"id": "vpr:verana:mainnet/cs/v1/js/3", "digestSRI": "sha256-abc"}
        });
        let vc: JsonLdCredential = serde_json::from_value(json).unwrap();
        let normalized = normalize_jsonld(&vc);
        assert_eq!(normalized.schema_ref.as_deref(), Some("vpr:verana:mainnet/cs/v1/js/3"));
        assert_eq!(normalized.declared_digest_sri.as_deref(), Some("sha256-abc"));
    }
}
