//! # Reattempt Service
//!
//! Thin orchestration over [`StateStore`]'s reattempt bookkeeping: drives the
//! per-day retry sweep (re-running whatever failed — a DID resolution, a VP
//! fetch, or a trust evaluation — and clearing the row on success) and the
//! expiry sweep that drops resources past the retention window, writing
//! `UNTRUSTED` for any DID among them.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use crate::cache::{ObjectCache, obj_key};
use crate::config::EcsDigests;
use crate::error::Result;
use crate::model::{Did, ErrorType, ReattemptableResource, ResourceType, TrustResult};
use crate::provider::Provider;
use crate::trust_resolver::{self, EvaluationContext};

/// Retries every resource [`crate::store::StateStore::retry_eligible`]
/// returns, one attempt per resource for this sweep. A resource whose retry
/// succeeds is removed; one that fails is re-recorded (bumping its
/// `retryCount`) with whatever error type the fresh attempt produced.
pub async fn run_retry_sweep<P: Provider>(
    provider: &P, http_client: &Client, current_block: u64, max_retry_days: i64,
    allowed_ecosystem_dids: &[Did], ecs_digests: &EcsDigests, disable_digest_sri: bool,
    cache_ttl_seconds: i64, object_cache_ttl: Duration,
) -> Result<()> {
    let eligible = provider.retry_eligible(max_retry_days).await?;
    for resource in eligible {
        retry_one(
            provider,
            http_client,
            current_block,
            allowed_ecosystem_dids,
            ecs_digests,
            disable_digest_sri,
            cache_ttl_seconds,
            object_cache_ttl,
            &resource,
        )
        .await?;
    }
    Ok(())
}

async fn retry_one<P: Provider>(
    provider: &P, http_client: &Client, current_block: u64, allowed_ecosystem_dids: &[Did],
    ecs_digests: &EcsDigests, disable_digest_sri: bool, cache_ttl_seconds: i64, object_cache_ttl: Duration,
    resource: &ReattemptableResource,
) -> Result<()> {
    match resource.resource_type {
        ResourceType::DidDoc | ResourceType::TrustEval => {
            let mut ctx = EvaluationContext {
                visited_dids: HashSet::new(),
                trust_memo: HashMap::new(),
                current_block,
                cache_ttl_seconds,
                allowed_ecosystem_dids,
                ecs_digests,
                disable_digest_sri,
                object_cache_ttl,
                provider,
                http_client,
            };
            match trust_resolver::resolve(&resource.resource_id, &mut ctx).await {
                Ok(result) => {
                    provider.upsert_trust_result(result).await?;
                    provider.remove_reattemptable(&resource.resource_id).await?;
                    debug!(did = %resource.resource_id, "reattempt succeeded");
                }
                Err(e) => {
                    warn!(did = %resource.resource_id, error = %e, "reattempt failed again");
                    provider.add_reattemptable(&resource.resource_id, resource.resource_type, ErrorType::Transient).await?;
                }
            }
        }
        ResourceType::Vp => match http_client.get(&resource.resource_id).send().await {
            Ok(response) if response.status().is_success() => {
                ObjectCache::invalidate(provider, &obj_key(&resource.resource_id)).await;
                provider.remove_reattemptable(&resource.resource_id).await?;
                debug!(endpoint = %resource.resource_id, "VP reattempt succeeded");
            }
            _ => {
                warn!(endpoint = %resource.resource_id, "VP reattempt failed again");
                provider.add_reattemptable(&resource.resource_id, ResourceType::Vp, ErrorType::Transient).await?;
            }
        },
    }
    Ok(())
}

/// Drops resources past `max_retry_days` and writes `UNTRUSTED` for any DID
/// among them — a DID whose resolution or evaluation has failed daily for
/// the whole retention window is no longer given the benefit of its last
/// known `TrustResult`.
pub async fn run_expiry_sweep<P: Provider>(provider: &P, max_retry_days: i64, cache_ttl_seconds: i64) -> Result<()> {
    let expired = provider.cleanup_expired_retries(max_retry_days).await?;
    for resource_id in expired {
        if !resource_id.starts_with("did:") {
            continue;
        }
        let now = chrono::Utc::now();
        let current_block = provider.processing_state().await?.last_processed_block;
        let result = TrustResult::untrusted_with_failure(
            resource_id.clone(),
            now,
            current_block,
            cache_ttl_seconds,
            crate::model::FailedCredential::new(
                crate::model::FailureCode::DidResolutionFailed,
                format!("retries exhausted after {max_retry_days} days"),
            ),
        );
        provider.upsert_trust_result(result).await?;
        warn!(did = %resource_id, "reattempt retention window expired, marked UNTRUSTED");
    }
    Ok(())
}
