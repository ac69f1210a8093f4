//! # Polling Loop
//!
//! The block-driven ingestion cycle: Pass 1 (DID/VP dereferencing), Pass 2
//! (trust evaluation), the retry sweep, and the TTL refresh sweep, wired
//! together into the loop the leader runs between startup and shutdown.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::{Config, EcsDigests};
use crate::did_resolver::DidResolverExt;
use crate::error::{Error, Result, is_permanent_did_error};
use crate::indexer::{self, IndexerClient, IndexerEvent};
use crate::model::{Did, ErrorType, FailedCredential, FailureCode, ResourceType, TrustResult};
use crate::provider::Provider;
use crate::reattempt_service;
use crate::trust_resolver::{self, EvaluationContext};
use crate::vp;

/// The outcome of running Pass 1 over a set of DIDs.
pub struct Pass1Result {
    /// DIDs whose document re-resolved and whose linked VPs were
    /// dereferenced (individual VP failures aside).
    pub succeeded: Vec<Did>,
    /// DIDs whose document failed to re-resolve.
    pub failed: Vec<Did>,
}

/// Re-resolves each DID's document and dereferences its linked VPs,
/// invalidating the cached document first so a stale copy is never reused.
/// A DID whose resolution fails permanently gets an immediate `UNTRUSTED`
/// `TrustResult`; one that fails transiently is left untouched and simply
/// recorded for retry.
pub async fn run_pass1<P: Provider>(
    dids: &[Did], provider: &P, http_client: &Client, current_block: u64, cache_ttl_seconds: i64,
    object_cache_ttl: Duration,
) -> Result<Pass1Result> {
    let mut succeeded = Vec::new();
    let mut failed = Vec::new();

    for did in dids {
        DidResolverExt::invalidate(provider, did).await;

        let document = match DidResolverExt::resolve(provider, did).await {
            Ok(doc) => doc,
            Err(e) => {
                failed.push(did.clone());
                record_resolution_failure(provider, did, &e, current_block, cache_ttl_seconds).await?;
                continue;
            }
        };

        let vp_result = vp::dereference_all(&document, http_client, provider, object_cache_ttl).await;
        for vp_error in vp_result.errors {
            provider.add_reattemptable(&vp_error.endpoint, ResourceType::Vp, ErrorType::Transient).await?;
        }
        succeeded.push(did.clone());
    }

    Ok(Pass1Result { succeeded, failed })
}

async fn record_resolution_failure<P: Provider>(
    provider: &P, did: &Did, error: &Error, current_block: u64, cache_ttl_seconds: i64,
) -> Result<()> {
    let reason = error.to_string();
    if is_permanent_did_error(&reason) {
        let result = TrustResult::untrusted_with_failure(
            did.clone(),
            Utc::now(),
            current_block,
            cache_ttl_seconds,
            FailedCredential::new(FailureCode::DidResolutionFailed, reason),
        );
        provider.upsert_trust_result(result).await?;
        provider.add_reattemptable(did, ResourceType::DidDoc, ErrorType::Permanent).await?;
    } else {
        provider.add_reattemptable(did, ResourceType::DidDoc, ErrorType::Transient).await?;
    }
    Ok(())
}

/// Resolves trust for every DID that survived Pass 1, upserting the result
/// on success and recording a transient reattemptable on failure.
#[allow(clippy::too_many_arguments)]
pub async fn run_pass2<P: Provider>(
    dids: &[Did], provider: &P, http_client: &Client, current_block: u64, cache_ttl_seconds: i64,
    allowed_ecosystem_dids: &[Did], ecs_digests: &EcsDigests, disable_digest_sri: bool,
    object_cache_ttl: Duration,
) -> Result<()> {
    for did in dids {
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
        match trust_resolver::resolve(did, &mut ctx).await {
            Ok(result) => provider.upsert_trust_result(result).await?,
            Err(e) => {
                warn!(did = %did, error = %e, "trust evaluation failed, scheduling retry");
                provider.add_reattemptable(did, ResourceType::TrustEval, ErrorType::Transient).await?;
            }
        }
    }
    Ok(())
}

/// Re-runs Pass 1 then Pass 2 on whatever `TrustResult` rows fall within
/// `trust_ttl * ttl_refresh_ratio` of expiring. Never advances
/// `lastProcessedBlock`.
pub async fn run_ttl_refresh<P: Provider>(provider: &P, http_client: &Client, config: &Config) -> Result<()> {
    let window = Duration::from_secs_f64(config.trust_ttl.as_secs_f64() * config.ttl_refresh_ratio);
    let expiring = provider.list_expiring_trust_results(window, 100).await?;
    if expiring.is_empty() {
        return Ok(());
    }
    let dids: Vec<Did> = expiring.into_iter().map(|r| r.did).collect();
    let current_block = provider.processing_state().await?.last_processed_block;
    let cache_ttl_seconds = config.trust_ttl.as_secs() as i64;

    let pass1 = run_pass1(&dids, provider, http_client, current_block, cache_ttl_seconds, config.object_cache_ttl).await?;
    run_pass2(
        &pass1.succeeded,
        provider,
        http_client,
        current_block,
        cache_ttl_seconds,
        &config.allowed_ecosystem_dids,
        &config.ecs_digests,
        config.disable_digest_sri,
        config.object_cache_ttl,
    )
    .await
}

/// Runs one poll cycle: clears the indexer memo, walks every unprocessed
/// block running Pass 1 then Pass 2 then the retry sweep, then TTL refresh
/// and the reattempt expiry sweep regardless of the block loop's outcome.
pub async fn run_poll_cycle<P: Provider>(provider: &P, http_client: &Client, config: &Config) -> Result<()> {
    provider.clear_memo().await;
    let cache_ttl_seconds = config.trust_ttl.as_secs() as i64;

    if let Err(e) = run_block_loop(provider, http_client, config, cache_ttl_seconds).await {
        warn!(error = %e, "poll cycle block loop aborted, lastProcessedBlock left unchanged");
    }

    if let Err(e) = run_ttl_refresh(provider, http_client, config).await {
        warn!(error = %e, "TTL refresh sweep failed");
    }

    reattempt_service::run_expiry_sweep(provider, config.reattempt_retention_days, cache_ttl_seconds).await?;
    Ok(())
}

async fn run_block_loop<P: Provider>(
    provider: &P, http_client: &Client, config: &Config, cache_ttl_seconds: i64,
) -> Result<()> {
    let indexer_height = provider.block_height().await?;
    let mut last_block = provider.processing_state().await?.last_processed_block;

    while last_block < indexer_height {
        let target = last_block + 1;
        let changes = provider.list_changes(target).await?;
        let affected = indexer::affected_dids(&changes);

        if !affected.is_empty() {
            let pass1 = run_pass1(&affected, provider, http_client, target, cache_ttl_seconds, config.object_cache_ttl).await?;
            run_pass2(
                &pass1.succeeded,
                provider,
                http_client,
                target,
                cache_ttl_seconds,
                &config.allowed_ecosystem_dids,
                &config.ecs_digests,
                config.disable_digest_sri,
                config.object_cache_ttl,
            )
            .await?;
        }

        reattempt_service::run_retry_sweep(
            provider,
            http_client,
            target,
            config.reattempt_retention_days,
            &config.allowed_ecosystem_dids,
            &config.ecs_digests,
            config.disable_digest_sri,
            cache_ttl_seconds,
            config.object_cache_ttl,
        )
        .await?;

        provider.set_last_processed_block(target).await?;
        last_block = target;
    }
    Ok(())
}

/// The leader's main loop: races a push notification against the poll
/// interval, running one poll cycle whichever arrives first, until
/// `shutdown` fires.
pub async fn run_leader_loop<P: Provider>(
    provider: &P, http_client: &Client, config: &Config, mut events: mpsc::Receiver<IndexerEvent>,
    shutdown: tokio_util::sync::CancellationToken,
) {
    loop {
        if let Err(e) = run_poll_cycle(provider, http_client, config).await {
            warn!(error = %e, "poll cycle failed");
        }

        tokio::select! {
            () = shutdown.cancelled() => {
                info!("leader loop shutting down");
                return;
            }
            event = events.recv() => {
                match event {
                    Some(IndexerEvent::BlockProcessed { height, .. }) => {
                        info!(height, "received block-processed notification");
                    }
                    None => {
                        warn!("indexer push channel closed, falling back to polling interval only");
                        tokio::time::sleep(config.poll_interval).await;
                    }
                }
            }
            () = tokio::time::sleep(config.poll_interval) => {}
        }
    }
}
