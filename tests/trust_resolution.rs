//! End-to-end coverage of the trust resolution pipeline: VS-REQ-3 and
//! VS-REQ-4 happy paths, cycle protection, digest and authorization
//! failures, and the block-driven polling/reattempt machinery wired
//! together the way the leader loop actually runs them.

mod support;

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use resolver::model::{CredentialResultStatus, FailureCode, ResourceType, TrustStatus, VerifiableCredential};
use resolver::polling;
use resolver::reattempt_service;
use resolver::store::StateStore;
use resolver::test_support::FixtureSigner;
use resolver::trust_resolver::{self, EvaluationContext};
use reqwest::Client;

use support::{
    ORG_SCHEMA_ID, SERVICE_SCHEMA, SERVICE_SCHEMA_ID, TRUST_REGISTRY_ID, ecs_digests, publish_vp,
    register_did_document, register_open_issuer, signed_credential, signed_credential_with_digest_sri,
    test_provider,
};

fn ctx<'a>(
    provider: &'a support::TestProvider, http_client: &'a Client, allowed_ecosystems: &'a [String],
    ecs_digests: &'a resolver::config::EcsDigests,
) -> EvaluationContext<'a, support::TestProvider> {
    EvaluationContext {
        visited_dids: HashSet::new(),
        trust_memo: HashMap::new(),
        current_block: 1,
        cache_ttl_seconds: 3600,
        allowed_ecosystem_dids: allowed_ecosystems,
        ecs_digests,
        disable_digest_sri: true,
        object_cache_ttl: Duration::from_secs(300),
        provider,
        http_client,
    }
}

#[tokio::test]
async fn self_issued_service_with_org_credential_is_trusted() {
    let (provider, indexer, did_resolver) = test_provider();
    let digests = ecs_digests();
    let ecosystem_did = "did:web:ecosystem.example.com".to_string();
    let service_did = "did:web:service.example.com".to_string();
    let org_issuer_did = "did:web:validator.example.com".to_string();

    register_open_issuer(
        &indexer, SERVICE_SCHEMA_ID, support::SERVICE_SCHEMA, TRUST_REGISTRY_ID, &ecosystem_did, &service_did, 1,
    )
    .await;
    register_open_issuer(
        &indexer, ORG_SCHEMA_ID, support::ORG_SCHEMA, TRUST_REGISTRY_ID, &ecosystem_did, &org_issuer_did, 2,
    )
    .await;

    let service_signer = FixtureSigner::generate();
    let org_signer = FixtureSigner::generate();
    let service_vm = register_did_document(&did_resolver, &service_did, &service_signer, Some("https://service.example.com/vp.json")).await;
    let org_vm = register_did_document(&did_resolver, &org_issuer_did, &org_signer, None).await;

    let service_cred = signed_credential(
        &service_did, &service_did, SERVICE_SCHEMA_ID, &[("name", "Acme Service")], &service_signer, &service_vm,
    )
    .await;
    let org_cred = signed_credential(
        &org_issuer_did, &service_did, ORG_SCHEMA_ID, &[("name", "Acme Corp")], &org_signer, &org_vm,
    )
    .await;

    publish_vp(
        &provider,
        "https://service.example.com/vp.json",
        &service_did,
        vec![
            VerifiableCredential::JsonLd(Box::new(service_cred)),
            VerifiableCredential::JsonLd(Box::new(org_cred)),
        ],
    )
    .await;

    let http_client = Client::new();
    let allowed = vec![ecosystem_did.clone()];
    let mut c = ctx(&provider, &http_client, &allowed, &digests);
    let result = trust_resolver::resolve(&service_did, &mut c).await.expect("resolution should not error");

    assert_eq!(result.trust_status, TrustStatus::Trusted);
    assert!(result.failed_credentials.is_empty());
    assert_eq!(result.credentials.iter().filter(|c| c.result == CredentialResultStatus::Valid).count(), 2);
}

#[tokio::test]
async fn service_issued_by_a_trusted_validator_satisfies_vs_req_4() {
    let (provider, indexer, did_resolver) = test_provider();
    let digests = ecs_digests();
    let ecosystem_did = "did:web:ecosystem.example.com".to_string();
    let service_did = "did:web:service2.example.com".to_string();
    let validator_did = "did:web:validator2.example.com".to_string();

    register_open_issuer(&indexer, SERVICE_SCHEMA_ID, support::SERVICE_SCHEMA, TRUST_REGISTRY_ID, &ecosystem_did, &validator_did, 1).await;
    register_open_issuer(&indexer, ORG_SCHEMA_ID, support::ORG_SCHEMA, TRUST_REGISTRY_ID, &ecosystem_did, &validator_did, 2).await;

    let validator_signer = FixtureSigner::generate();
    let validator_vm = register_did_document(&did_resolver, &validator_did, &validator_signer, Some("https://validator2.example.com/vp.json")).await;
    register_did_document(&did_resolver, &service_did, &validator_signer, Some("https://service2.example.com/vp.json")).await;

    let service_cred = signed_credential(&validator_did, &service_did, SERVICE_SCHEMA_ID, &[("name", "Acme Service")], &validator_signer, &validator_vm).await;
    let validator_org_cred = signed_credential(&validator_did, &validator_did, ORG_SCHEMA_ID, &[("name", "Validator Org")], &validator_signer, &validator_vm).await;

    publish_vp(&provider, "https://service2.example.com/vp.json", &service_did, vec![VerifiableCredential::JsonLd(Box::new(service_cred))]).await;
    publish_vp(&provider, "https://validator2.example.com/vp.json", &validator_did, vec![VerifiableCredential::JsonLd(Box::new(validator_org_cred))]).await;

    let http_client = Client::new();
    let allowed = vec![ecosystem_did.clone()];
    let mut c = ctx(&provider, &http_client, &allowed, &digests);
    let result = trust_resolver::resolve(&service_did, &mut c).await.expect("resolution should not error");

    assert_eq!(result.trust_status, TrustStatus::Trusted);
    // The recursive resolution of the validator is memoized on the shared context.
    assert!(c.trust_memo.contains_key(&validator_did));
}

#[tokio::test]
async fn a_did_already_on_the_active_path_is_reported_as_a_circular_reference() {
    let (provider, _indexer, _did_resolver) = test_provider();
    let digests = ecs_digests();
    let did = "did:web:cyclic.example.com".to_string();

    let http_client = Client::new();
    let allowed: Vec<String> = vec![];
    let mut c = ctx(&provider, &http_client, &allowed, &digests);
    c.visited_dids.insert(did.clone());

    let result = trust_resolver::resolve(&did, &mut c).await.expect("cycle short-circuit should not error");

    assert_eq!(result.trust_status, TrustStatus::Untrusted);
    assert_eq!(result.failed_credentials.len(), 1);
    assert_eq!(result.failed_credentials[0].error_code, FailureCode::CircularReference);
}

#[tokio::test]
async fn unauthorized_issuer_fails_credential_evaluation() {
    let (provider, indexer, did_resolver) = test_provider();
    let digests = ecs_digests();
    let ecosystem_did = "did:web:ecosystem.example.com".to_string();
    let service_did = "did:web:unauthorized.example.com".to_string();

    // Schema is registered, but no ISSUER permission is ever granted.
    indexer
        .add_schema(resolver::model::CredentialSchema {
            id: SERVICE_SCHEMA_ID,
            tr_id: TRUST_REGISTRY_ID,
            json_schema: SERVICE_SCHEMA.to_string(),
            issuer_perm_management_mode: resolver::model::IssuerPermManagementMode::Open,
            created: chrono::Utc::now(),
            archived: None,
        })
        .await;
    indexer
        .add_trust_registry(resolver::model::TrustRegistry { id: TRUST_REGISTRY_ID, did: ecosystem_did.clone(), aliases: None })
        .await;

    let signer = FixtureSigner::generate();
    let vm = register_did_document(&did_resolver, &service_did, &signer, Some("https://unauthorized.example.com/vp.json")).await;
    let cred = signed_credential(&service_did, &service_did, SERVICE_SCHEMA_ID, &[("name", "Acme Service")], &signer, &vm).await;
    publish_vp(&provider, "https://unauthorized.example.com/vp.json", &service_did, vec![VerifiableCredential::JsonLd(Box::new(cred))]).await;

    let http_client = Client::new();
    let allowed = vec![ecosystem_did];
    let mut c = ctx(&provider, &http_client, &allowed, &digests);
    let result = trust_resolver::resolve(&service_did, &mut c).await.expect("resolution should not error");

    assert_eq!(result.trust_status, TrustStatus::Untrusted);
    assert_eq!(result.failed_credentials.len(), 1);
    assert_eq!(result.failed_credentials[0].error_code, FailureCode::IssuerNotAuthorized);
}

#[tokio::test]
async fn digest_sri_mismatch_is_reported_when_the_check_is_enabled() {
    let (provider, indexer, did_resolver) = test_provider();
    let digests = ecs_digests();
    let ecosystem_did = "did:web:ecosystem.example.com".to_string();
    let service_did = "did:web:sri.example.com".to_string();

    register_open_issuer(&indexer, SERVICE_SCHEMA_ID, SERVICE_SCHEMA, TRUST_REGISTRY_ID, &ecosystem_did, &service_did, 1).await;
    indexer.set_schema_content(SERVICE_SCHEMA_ID, SERVICE_SCHEMA).await;

    let signer = FixtureSigner::generate();
    let vm = register_did_document(&did_resolver, &service_did, &signer, Some("https://sri.example.com/vp.json")).await;
    // The declared digest is wrong from the start, so it's covered by the
    // signature rather than tampered with afterwards.
    let cred = signed_credential_with_digest_sri(
        &service_did, &service_did, SERVICE_SCHEMA_ID, &[("name", "Acme Service")], &signer, &vm,
        Some("sha256-d3Jvbmc=".to_string()),
    )
    .await;

    publish_vp(&provider, "https://sri.example.com/vp.json", &service_did, vec![VerifiableCredential::JsonLd(Box::new(cred))]).await;

    let http_client = Client::new();
    let allowed = vec![ecosystem_did];
    let mut c = EvaluationContext {
        visited_dids: HashSet::new(),
        trust_memo: HashMap::new(),
        current_block: 1,
        cache_ttl_seconds: 3600,
        allowed_ecosystem_dids: &allowed,
        ecs_digests: &digests,
        disable_digest_sri: false,
        object_cache_ttl: Duration::from_secs(300),
        provider: &provider,
        http_client: &http_client,
    };
    let result = trust_resolver::resolve(&service_did, &mut c).await.expect("resolution should not error");

    assert_eq!(result.failed_credentials.len(), 1);
    assert_eq!(result.failed_credentials[0].error_code, FailureCode::DigestSriMismatch);
}

#[tokio::test]
async fn poll_cycle_resolves_a_did_affected_by_a_new_block_and_upserts_its_trust_result() {
    let (provider, indexer, did_resolver) = test_provider();
    let ecosystem_did = "did:web:ecosystem.example.com".to_string();
    let service_did = "did:web:polled.example.com".to_string();

    register_open_issuer(&indexer, SERVICE_SCHEMA_ID, SERVICE_SCHEMA, TRUST_REGISTRY_ID, &ecosystem_did, &service_did, 1).await;

    let signer = FixtureSigner::generate();
    let vm = register_did_document(&did_resolver, &service_did, &signer, Some("https://polled.example.com/vp.json")).await;
    let cred = signed_credential(&service_did, &service_did, SERVICE_SCHEMA_ID, &[("name", "Acme Service")], &signer, &vm).await;
    publish_vp(&provider, "https://polled.example.com/vp.json", &service_did, vec![VerifiableCredential::JsonLd(Box::new(cred))]).await;

    indexer.set_height(1).await;
    indexer
        .set_changes(
            1,
            vec![resolver::indexer::ChangeActivity {
                timestamp: chrono::Utc::now(),
                block_height: 1,
                entity_type: "permission".to_string(),
                entity_id: "1".to_string(),
                account: Some(service_did.clone()),
                msg: None,
                changes: HashMap::new(),
            }],
        )
        .await;

    let config = resolver::config::Config {
        database_url: String::new(),
        cache_url: String::new(),
        indexer_base_url: "https://indexer.invalid".to_string(),
        allowed_ecosystem_dids: vec![ecosystem_did],
        role: resolver::config::Role::Leader,
        poll_interval: Duration::from_secs(5),
        object_cache_ttl: Duration::from_secs(300),
        trust_ttl: Duration::from_secs(3600),
        ttl_refresh_ratio: 0.2,
        reattempt_retention_days: 7,
        listen_port: 0,
        log_level: "info".to_string(),
        disable_digest_sri: true,
        ecs_digests: ecs_digests(),
    };

    let http_client = Client::new();
    polling::run_poll_cycle(&provider, &http_client, &config).await.expect("poll cycle should succeed");

    let stored = provider.get_trust_result(&service_did).await.expect("lookup should succeed");
    let stored = stored.expect("a TrustResult should have been upserted for the polled DID");
    assert_eq!(stored.trust_status, TrustStatus::Untrusted);
    assert!(stored.has_any_production_credential());
    assert_eq!(provider.processing_state().await.unwrap().last_processed_block, 1);
}

#[tokio::test]
async fn a_permanently_failing_did_resolution_is_not_retried_by_the_sweep() {
    let (provider, _indexer, _did_resolver) = test_provider();

    // No document registered for this DID: resolution fails permanently (notFound).
    let missing_did = "did:web:missing.example.com".to_string();
    let http_client = Client::new();

    let pass1 = polling::run_pass1(&[missing_did.clone()], &provider, &http_client, 1, 3600, Duration::from_secs(300))
        .await
        .expect("pass1 should not error even when a DID fails to resolve");
    assert_eq!(pass1.failed, vec![missing_did.clone()]);
    assert!(pass1.succeeded.is_empty());

    let stored = provider.get_trust_result(&missing_did).await.unwrap();
    assert_eq!(stored.unwrap().trust_status, TrustStatus::Untrusted);

    // A permanent DID-resolution failure is still recorded as a reattemptable
    // resource (the expiry sweep is what eventually drops it, not pass1 itself).
    let eligible = provider.retry_eligible(7).await.unwrap();
    assert!(eligible.is_empty(), "a fresh failure is not yet eligible for the once-a-day retry sweep");
}

#[tokio::test]
async fn reattempt_expiry_sweep_marks_long_failing_dids_untrusted() {
    let (provider, _indexer, _did_resolver) = test_provider();
    let did = "did:web:expiring.example.com".to_string();

    provider.add_reattemptable(&did, ResourceType::DidDoc, resolver::model::ErrorType::Permanent).await.unwrap();

    // Force the bookkeeping row far enough into the past that a 0-day
    // retention window immediately expires it.
    reattempt_service::run_expiry_sweep(&provider, -1, 3600).await.expect("expiry sweep should not error");

    let stored = provider.get_trust_result(&did).await.unwrap();
    let stored = stored.expect("expiry sweep should have written an UNTRUSTED TrustResult");
    assert_eq!(stored.trust_status, TrustStatus::Untrusted);
    assert_eq!(stored.failed_credentials[0].error_code, FailureCode::DidResolutionFailed);

    let remaining = provider.cleanup_expired_retries(-1).await.unwrap();
    assert!(remaining.is_empty(), "the row should already have been removed by the first sweep");
}
