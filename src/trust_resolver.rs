//! # Trust Resolver
//!
//! The per-DID entry point for Pass 2 and for recursive VS-REQ-4 evaluation.
//! State shared across one resolution tree — including every DID reached
//! transitively via VS-REQ-4 — is carried in an [`EvaluationContext`]: the
//! DIDs on the active resolution path (cycle detection) and a memo of every
//! `TrustResult` computed so far (cross-branch reuse and the source of truth
//! the permission-chain builder reads from).

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;

use crate::config::EcsDigests;
use crate::credential_eval::{self, EvalContext};
use crate::did_resolver::DidResolverExt;
use crate::error::Result;
use crate::model::{CredentialResultStatus, Did, FailedCredential, FailureCode, TrustResult};
use crate::provider::Provider;
use crate::vp;
use crate::vs_requirement;

/// State shared across one DID's resolution tree.
pub struct EvaluationContext<'a, P: Provider> {
    /// DIDs currently on the active resolution path.
    pub visited_dids: HashSet<Did>,
    /// Every `TrustResult` computed so far in this tree, keyed by DID.
    pub trust_memo: HashMap<Did, TrustResult>,
    /// The block this whole resolution run is anchored to.
    pub current_block: u64,
    /// `TrustResult` TTL, in seconds.
    pub cache_ttl_seconds: i64,
    /// Ecosystem DIDs the VS-requirement evaluator will consider.
    pub allowed_ecosystem_dids: &'a [Did],
    /// The reference ECS digests.
    pub ecs_digests: &'a EcsDigests,
    /// Skips the digest-SRI check in the credential evaluator.
    pub disable_digest_sri: bool,
    /// Object-cache TTL applied to fetched VP envelopes.
    pub object_cache_ttl: Duration,
    /// The provider bundle (indexer, cache, DID resolution).
    pub provider: &'a P,
    /// HTTP client used for VP endpoint fetches.
    pub http_client: &'a Client,
}

/// Resolves trust for `did`: memoized, cycle-protected, the shared entry
/// point for Pass 2 and for VS-REQ-4's recursive issuer resolution.
pub async fn resolve<P: Provider>(did: &Did, ctx: &mut EvaluationContext<'_, P>) -> Result<TrustResult> {
    if let Some(memoized) = ctx.trust_memo.get(did) {
        return Ok(memoized.clone());
    }

    if ctx.visited_dids.contains(did) {
        let result = TrustResult::untrusted_with_failure(
            did.clone(),
            Utc::now(),
            ctx.current_block,
            ctx.cache_ttl_seconds,
            FailedCredential::new(
                FailureCode::CircularReference,
                format!("{did} is already on the active resolution path"),
            ),
        );
        ctx.trust_memo.insert(did.clone(), result.clone());
        return Ok(result);
    }
    ctx.visited_dids.insert(did.clone());

    let document = match DidResolverExt::resolve(ctx.provider, did).await {
        Ok(doc) => doc,
        Err(e) => {
            let result = TrustResult::untrusted_with_failure(
                did.clone(),
                Utc::now(),
                ctx.current_block,
                ctx.cache_ttl_seconds,
                FailedCredential::new(FailureCode::DidResolutionFailed, e.to_string()),
            );
            ctx.trust_memo.insert(did.clone(), result.clone());
            return Ok(result);
        }
    };

    let vp_result = vp::dereference_all(&document, ctx.http_client, ctx.provider, ctx.object_cache_ttl).await;

    let mut credentials = Vec::new();
    let mut failed_credentials = Vec::new();
    for credential in &vp_result.credentials {
        let eval_ctx = EvalContext {
            indexer: ctx.provider,
            at_block: ctx.current_block,
            ecs_digests: ctx.ecs_digests,
            disable_digest_sri: ctx.disable_digest_sri,
            trust_memo: &ctx.trust_memo,
        };
        match credential_eval::evaluate(credential, did, ctx.provider, &eval_ctx).await {
            Ok(evaluation) => credentials.push(evaluation),
            Err(failure) => failed_credentials.push(failure),
        }
    }

    let valid_credentials: Vec<_> =
        credentials.iter().filter(|c| c.result == CredentialResultStatus::Valid).cloned().collect();
    let trust_status = vs_requirement::evaluate(did, &valid_credentials, ctx).await?;

    let production =
        credentials.iter().any(|c| c.result == CredentialResultStatus::Valid && c.ecs_type.is_some());

    let now = Utc::now();
    let result = TrustResult {
        did: did.clone(),
        trust_status,
        production,
        evaluated_at: now,
        evaluated_at_block: ctx.current_block,
        expires_at: now + chrono::Duration::seconds(ctx.cache_ttl_seconds),
        credentials,
        failed_credentials,
        vp_dereference_errors: vp_result.errors,
    };

    ctx.trust_memo.insert(did.clone(), result.clone());
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untrusted_with_failure_carries_the_supplied_code() {
        let result = TrustResult::untrusted_with_failure(
            "did:web:a.example.com".to_string(),
            Utc::now(),
            10,
            3600,
            FailedCredential::new(FailureCode::CircularReference, "cycle"),
        );
        assert_eq!(result.failed_credentials.len(), 1);
        assert_eq!(result.failed_credentials[0].error_code, FailureCode::CircularReference);
    }
}
