//! Shared fixture builders for the end-to-end trust resolution tests.
//!
//! Each helper grounds its signing/canonicalization steps in exactly what
//! [`resolver::proof`] does when it later verifies the same credential, so a
//! test failure here means the evaluator itself rejected the fixture, not
//! that the fixture was built incorrectly.

use std::time::Duration;

use chrono::Utc;
use resolver::cache::{InMemoryCache, ObjectCache, obj_key};
use resolver::config::EcsDigests;
use resolver::core::{Kind, OneMany};
use resolver::jcs;
use resolver::model::{
    CredentialSchema, CredentialSchemaRef, CredentialSubject, DataIntegrityProof, Did,
    IssuerPermManagementMode, JsonLdCredential, Permission, PermissionState, PermissionType,
    TrustRegistry, VerifiableCredential, VerifiablePresentation,
};
use resolver::provider::AppProvider;
use resolver::store::InMemoryStore;
use resolver::test_support::{FixtureDidResolver, FixtureSigner, InMemoryIndexerClient};
use serde_json::{Map, Value, json};

pub const SERVICE_SCHEMA: &str = r#"{"$id":"https://schemas.example.com/service.json","type":"object","properties":{"name":{"type":"string"}}}"#;
pub const ORG_SCHEMA: &str = r#"{"$id":"https://schemas.example.com/org.json","type":"object","properties":{"name":{"type":"string"}}}"#;

pub const SERVICE_SCHEMA_ID: u64 = 1;
pub const ORG_SCHEMA_ID: u64 = 2;
pub const TRUST_REGISTRY_ID: u64 = 10;

/// The provider type every test wires up: a fixture indexer, an in-memory
/// object cache, an in-memory durable store and a fixture DID resolver.
pub type TestProvider = AppProvider<InMemoryIndexerClient, InMemoryCache, FixtureDidResolver>;

/// Reference ECS digests computed from [`SERVICE_SCHEMA`]/[`ORG_SCHEMA`], the
/// same way a deployment would compute them once at startup from its
/// configured reference schemas.
#[must_use]
pub fn ecs_digests() -> EcsDigests {
    EcsDigests {
        service: jcs::to_hex(&jcs::ecs_digest(SERVICE_SCHEMA).unwrap()),
        org: jcs::to_hex(&jcs::ecs_digest(ORG_SCHEMA).unwrap()),
        persona: String::new(),
        user_agent: String::new(),
    }
}

/// Builds a provider with an empty indexer and DID resolver, ready for a
/// test to populate via its `add_*`/`register` methods.
#[must_use]
pub fn test_provider() -> (TestProvider, InMemoryIndexerClient, FixtureDidResolver) {
    let indexer = InMemoryIndexerClient::new();
    let did_resolver = FixtureDidResolver::new();
    let provider = AppProvider::new(
        indexer.clone(),
        InMemoryCache::new(),
        InMemoryStore::new(),
        did_resolver.clone(),
    );
    (provider, indexer, did_resolver)
}

/// Registers a schema, its owning trust registry, and an `ISSUER` permission
/// for `issuer_did` under that schema, in `Open` management mode.
pub async fn register_open_issuer(
    indexer: &InMemoryIndexerClient, schema_id: u64, schema_text: &str, tr_id: u64, ecosystem_did: &Did,
    issuer_did: &Did, permission_id: u64,
) {
    indexer
        .add_schema(CredentialSchema {
            id: schema_id,
            tr_id,
            json_schema: schema_text.to_string(),
            issuer_perm_management_mode: IssuerPermManagementMode::Open,
            created: Utc::now(),
            archived: None,
        })
        .await;
    indexer.add_trust_registry(TrustRegistry { id: tr_id, did: ecosystem_did.clone(), aliases: None }).await;
    indexer
        .add_permission(Permission {
            id: permission_id,
            schema_id,
            type_: PermissionType::Issuer,
            did: issuer_did.clone(),
            effective_from: Utc::now() - chrono::Duration::days(1),
            effective_until: None,
            deposit: 0,
            state: PermissionState::Active,
            validator_perm_id: None,
            issuance_fee: None,
            verification_fee: None,
            fee_discount_permille: None,
        })
        .await;
}

/// Registers a DID document carrying one Ed25519 verification method and (if
/// `vp_endpoint` is set) a `LinkedVerifiablePresentation` service entry.
pub async fn register_did_document(
    did_resolver: &FixtureDidResolver, did: &Did, signer: &FixtureSigner, vp_endpoint: Option<&str>,
) -> String {
    let verification_method = format!("{did}#key-1");
    let mut doc = json!({
        "id": did,
        "verificationMethod": [{
            "id": verification_method,
            "type": "JsonWebKey2020",
            "controller": did,
            "publicKeyJwk": {"kty": "OKP", "crv": "Ed25519", "x": signer.jwk_x()},
        }],
        "service": Value::Array(vec![]),
    });
    if let Some(endpoint) = vp_endpoint {
        doc["service"] = json!([{
            "id": format!("{did}#vp"),
            "type": "LinkedVerifiablePresentation",
            "serviceEndpoint": endpoint,
        }]);
    }
    did_resolver.register(did, doc).await;
    verification_method
}

/// Builds and signs a `w3c-jsonld` credential, about `subject_did`, issued by
/// `issuer_did`, referencing the on-chain schema `js_id`.
pub async fn signed_credential(
    issuer_did: &Did, subject_did: &Did, js_id: u64, claims: &[(&str, &str)], signer: &FixtureSigner,
    verification_method: &str,
) -> JsonLdCredential {
    signed_credential_with_digest_sri(issuer_did, subject_did, js_id, claims, signer, verification_method, None).await
}

/// Same as [`signed_credential`], but lets the caller declare a `digestSRI`
/// on the schema reference before the document is signed, so the signature
/// covers whatever value (valid or deliberately wrong) the test wants to
/// exercise the evaluator's digest check against.
pub async fn signed_credential_with_digest_sri(
    issuer_did: &Did, subject_did: &Did, js_id: u64, claims: &[(&str, &str)], signer: &FixtureSigner,
    verification_method: &str, digest_sri: Option<String>,
) -> JsonLdCredential {
    let mut subject_claims = Map::new();
    for (key, value) in claims {
        subject_claims.insert((*key).to_string(), Value::String((*value).to_string()));
    }

    let draft_proof = DataIntegrityProof {
        id: None,
        type_: "DataIntegrityProof".to_string(),
        cryptosuite: Some("eddsa-jcs-2022".to_string()),
        created: Some(Utc::now()),
        verification_method: verification_method.to_string(),
        proof_purpose: "assertionMethod".to_string(),
        proof_value: String::new(),
        challenge: None,
    };

    let mut credential = JsonLdCredential {
        context: vec![Kind::String("https://www.w3.org/2018/credentials/v1".to_string())],
        id: Some(format!("urn:uuid:{js_id}-{subject_did}")),
        type_: OneMany::Many(vec!["VerifiableCredential".to_string()]),
        issuer: Kind::String(issuer_did.clone()),
        credential_subject: OneMany::One(CredentialSubject {
            id: Some(subject_did.clone()),
            claims: subject_claims,
        }),
        issuance_date: Some(Utc::now()),
        valid_from: None,
        valid_until: None,
        credential_schema: Some(OneMany::One(CredentialSchemaRef {
            id: format!("vpr:verana:mainnet/cs/v1/js/{js_id}"),
            type_: "JsonSchema".to_string(),
            digest_sri,
        })),
        proof: Some(OneMany::One(draft_proof.clone())),
    };

    let signature = sign_embedded_proof(&credential, &draft_proof, signer);
    credential.proof = Some(OneMany::One(DataIntegrityProof { proof_value: signature, ..draft_proof }));
    credential
}

/// Reproduces `resolver::proof::verify_jsonld`'s hash-then-sign construction
/// so the resulting `proofValue` verifies against the final (proof-included)
/// credential.
fn sign_embedded_proof(credential: &JsonLdCredential, proof: &DataIntegrityProof, signer: &FixtureSigner) -> String {
    let document_json = serde_json::to_value(credential).unwrap();
    let Value::Object(mut document_map) = document_json else { unreachable!() };
    document_map.remove("proof");

    let mut proof_options = serde_json::to_value(proof).unwrap();
    let Value::Object(options_map) = &mut proof_options else { unreachable!() };
    options_map.remove("proofValue");
    if let Some(context) = document_map.get("@context") {
        options_map.insert("@context".to_string(), context.clone());
    }

    let document_bytes = jcs::canonicalize(&Value::Object(document_map)).unwrap();
    let options_bytes = jcs::canonicalize(&proof_options).unwrap();

    let mut verify_data = Vec::with_capacity(64);
    verify_data.extend_from_slice(&sha2_digest(&options_bytes));
    verify_data.extend_from_slice(&sha2_digest(&document_bytes));

    signer.sign_multibase(&verify_data)
}

fn sha2_digest(bytes: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    Sha256::digest(bytes).into()
}

/// Wraps one or more credentials in a `VerifiablePresentation` held by `did`
/// and registers it in `provider`'s object cache at `endpoint`'s cache key,
/// so [`resolver::vp::dereference_all`] serves it without a network fetch.
pub async fn publish_vp(provider: &TestProvider, endpoint: &str, holder: &Did, credentials: Vec<VerifiableCredential>) {
    let vp = VerifiablePresentation {
        context: vec![Kind::String("https://www.w3.org/2018/credentials/v1".to_string())],
        id: None,
        type_: OneMany::One("VerifiablePresentation".to_string()),
        holder: Some(holder.clone()),
        verifiable_credential: credentials,
    };
    ObjectCache::set(provider, &obj_key(endpoint), &vp, Duration::from_secs(300)).await;
}

