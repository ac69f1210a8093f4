//! # DID Resolution
//!
//! Method-dispatched resolution (`did:web`, `did:webvh`) to a
//! [`DidDocument`], cached behind an [`ObjectCache`].
//!
//! Full verification-method dereferencing (needed by signature
//! verification) is delegated to [`credibil_did::dereference`] via
//! [`crate::core::did_jwk`] — that path resolves a DID *URL* (with
//! fragment) to key material, a different concern from resolving a DID to
//! its document's service endpoints, which is all the trust pipeline reads
//! here. Parsing straight into our own [`DidDocument`] keeps this module
//! independent of `credibil_did`'s own document type, whose shape is
//! oriented around verification methods rather than service entries.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::cache::{ObjectCache, obj_key};
use crate::error::{Error, Result};
use crate::model::{Did, DidDocument, method_of};

/// Resolves a DID to its [`DidDocument`], with a cache in front of the
/// network fetch.
#[async_trait]
pub trait DidResolverExt: Send + Sync {
    /// Resolves `did`, consulting the cache first.
    async fn resolve(&self, did: &Did) -> Result<DidDocument>;

    /// Drops any cached document for `did`, forcing the next `resolve` to
    /// re-fetch.
    async fn invalidate(&self, did: &Did);
}

/// Builds the `did:web` well-known URL for a method-specific id, per the
/// `did:web` resolution algorithm: colons become path separators, and a
/// bare domain resolves under `/.well-known/`.
#[must_use]
pub fn did_web_url(method_specific_id: &str) -> String {
    let decoded = method_specific_id.replace("%3A", ":");
    let mut parts = decoded.split(':');
    let Some(domain) = parts.next() else {
        return String::new();
    };
    let path_parts: Vec<&str> = parts.collect();
    if path_parts.is_empty() {
        format!("https://{domain}/.well-known/did.json")
    } else {
        format!("https://{domain}/{}/did.json", path_parts.join("/"))
    }
}

/// Builds the resolution URL for a `did:webvh` method-specific id. `webvh`
/// prefixes a self-certifying identifier (SCID) before the domain; beyond
/// that prefix the resolution target is the same well-known layout as
/// `did:web`. Full `webvh` log/history verification is not performed here —
/// only the current document is fetched, which is sufficient for reading
/// service endpoints.
#[must_use]
pub fn did_webvh_url(method_specific_id: &str) -> String {
    match method_specific_id.split_once(':') {
        Some((_scid, rest)) => did_web_url(rest),
        None => did_web_url(method_specific_id),
    }
}

/// Cached, method-dispatched DID resolver backed by a plain HTTP fetch of
/// the method's well-known document.
pub struct CachedDidResolver<C> {
    client: Client,
    cache: C,
    ttl: Duration,
}

impl<C: ObjectCache> CachedDidResolver<C> {
    /// Builds a resolver with the given object cache and entry TTL.
    #[must_use]
    pub fn new(cache: C, ttl: Duration) -> Self {
        Self {
            client: Client::builder().timeout(Duration::from_secs(10)).build().unwrap_or_default(),
            cache,
            ttl,
        }
    }

    fn resolution_url(did: &Did) -> Result<String> {
        match method_of(did) {
            Some("web") => {
                let id = did.strip_prefix("did:web:").unwrap_or_default();
                Ok(did_web_url(id))
            }
            Some("webvh") => {
                let id = did.strip_prefix("did:webvh:").unwrap_or_default();
                Ok(did_webvh_url(id))
            }
            Some(other) => Err(Error::DidResolutionPermanent {
                did: did.clone(),
                reason: format!("methodNotSupported: {other}"),
            }),
            None => Err(Error::DidResolutionPermanent {
                did: did.clone(),
                reason: "invalidDid: missing did: prefix".to_string(),
            }),
        }
    }
}

#[async_trait]
impl<C: ObjectCache> DidResolverExt for CachedDidResolver<C> {
    async fn resolve(&self, did: &Did) -> Result<DidDocument> {
        let key = obj_key(did);
        if let Some(doc) = self.cache.get::<DidDocument>(&key).await {
            return Ok(doc);
        }

        let url = Self::resolution_url(did)?;
        let response = self.client.get(&url).send().await.map_err(|e| {
            Error::DidResolutionTransient { did: did.clone(), reason: format!("networkTimeout: {e}") }
        })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::DidResolutionPermanent { did: did.clone(), reason: "notFound".to_string() });
        }
        if !response.status().is_success() {
            return Err(Error::DidResolutionTransient {
                did: did.clone(),
                reason: format!("unexpected status {}", response.status()),
            });
        }

        let doc: DidDocument = response.json().await.map_err(|e| Error::DidResolutionTransient {
            did: did.clone(),
            reason: format!("malformed DID document: {e}"),
        })?;

        self.cache.set(&key, &doc, self.ttl).await;
        Ok(doc)
    }

    async fn invalidate(&self, did: &Did) {
        self.cache.invalidate(&obj_key(did)).await;
    }
}

/// Lets [`CachedDidResolver`] also serve `credibil_did::dereference`, which
/// [`crate::core::did_jwk`] uses to resolve a verification method's key
/// material. Both interfaces end up fetching the same well-known document;
/// this one hands the raw bytes to `credibil_did`'s own `Document` instead of
/// parsing into ours, since fragment-level verification-method lookup is
/// `credibil_did`'s job, not this module's.
impl<C: ObjectCache + Send + Sync> credibil_did::DidResolver for CachedDidResolver<C> {
    async fn resolve(&self, url: &str) -> anyhow::Result<credibil_did::Document> {
        let did = url.split('#').next().unwrap_or(url).to_string();
        let resolution_url = Self::resolution_url(&did)
            .map_err(|e| anyhow::anyhow!("{e}"))?;

        let response = self.client.get(&resolution_url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow::anyhow!("unexpected status {} resolving {did}", response.status()));
        }
        response.json::<credibil_did::Document>().await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn did_web_resolves_bare_domain_to_well_known() {
        assert_eq!(did_web_url("acme.example.com"), "https://acme.example.com/.well-known/did.json");
    }

    #[test]
    fn did_web_resolves_path_segments() {
        assert_eq!(
            did_web_url("acme.example.com:users:alice"),
            "https://acme.example.com/users/alice/did.json"
        );
    }

    #[test]
    fn did_webvh_strips_scid_before_resolving() {
        assert_eq!(
            did_webvh_url("Qm123abc:acme.example.com"),
            "https://acme.example.com/.well-known/did.json"
        );
    }

    #[test]
    fn unsupported_method_is_permanent_error() {
        let err = CachedDidResolver::<crate::cache::InMemoryCache>::resolution_url(
            &"did:key:z6Mk".to_string(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::DidResolutionPermanent { .. }));
    }

    #[test]
    fn missing_prefix_is_permanent_error() {
        let err = CachedDidResolver::<crate::cache::InMemoryCache>::resolution_url(&"not-a-did".to_string())
            .unwrap_err();
        assert!(matches!(err, Error::DidResolutionPermanent { .. }));
    }
}
