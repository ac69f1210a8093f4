//! # Verifiable Presentation Dereferencing
//!
//! Given a resolved [`DidDocument`], fan out and fetch every
//! `LinkedVerifiablePresentation` service endpoint in parallel, parse each
//! as a [`VerifiablePresentation`], and collect the credentials they carry.
//! Per-VP failures are recorded separately from credential failures — they
//! describe a presentation that could not even be read, not a credential
//! that failed evaluation.

use std::time::Duration;

use futures_util::future::join_all;
use reqwest::Client;

use crate::cache::{ObjectCache, obj_key};
use crate::model::{DidDocument, VerifiableCredential, VerifiablePresentation, VpDereferenceError};

const VP_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// The outcome of dereferencing all of a DID's linked presentations.
pub struct VpDereferenceResult {
    /// Every credential extracted from every successfully-fetched VP, paired
    /// with the endpoint it came from (VP dereference errors aside, the
    /// endpoint is not otherwise load-bearing but is useful for logging).
    pub credentials: Vec<VerifiableCredential>,
    /// Per-endpoint failures.
    pub errors: Vec<VpDereferenceError>,
}

/// Fetches and parses every `LinkedVerifiablePresentation` endpoint in
/// `document`, in parallel, caching each successfully-parsed envelope.
pub async fn dereference_all<C: ObjectCache>(
    document: &DidDocument, client: &Client, cache: &C, cache_ttl: Duration,
) -> VpDereferenceResult {
    let endpoints: Vec<&str> =
        document.service.iter().filter(|s| s.is_linked_vp_http()).filter_map(|s| s.endpoint_uri()).collect();

    let fetches = endpoints.into_iter().map(|endpoint| {
        let endpoint = endpoint.to_string();
        async move {
            let outcome = dereference_one(&endpoint, client, cache, cache_ttl).await;
            (endpoint, outcome)
        }
    });

    let mut credentials = Vec::new();
    let mut errors = Vec::new();
    for (endpoint, outcome) in join_all(fetches).await {
        match outcome {
            Ok(vp) => credentials.extend(vp.verifiable_credential),
            Err(detail) => errors.push(VpDereferenceError { endpoint, detail }),
        }
    }

    VpDereferenceResult { credentials, errors }
}

async fn dereference_one<C: ObjectCache>(
    endpoint: &str, client: &Client, cache: &C, cache_ttl: Duration,
) -> Result<VerifiablePresentation, String> {
    let key = obj_key(endpoint);
    if let Some(vp) = cache.get::<VerifiablePresentation>(&key).await {
        return Ok(vp);
    }

    let response = client
        .get(endpoint)
        .timeout(VP_FETCH_TIMEOUT)
        .send()
        .await
        .map_err(|e| format!("fetch failed: {e}"))?;

    if !response.status().is_success() {
        return Err(format!("unexpected status {}", response.status()));
    }

    let vp: VerifiablePresentation =
        response.json().await.map_err(|e| format!("malformed VP envelope: {e}"))?;

    cache.set(&key, &vp, cache_ttl).await;
    Ok(vp)
}
