//! # Core Utilities
//!
//! Small shared types used across the resolution pipeline, and the one
//! piece of DID-URL dereferencing (public key retrieval) that both the
//! credential evaluator and the JOSE proof verifier need.

use anyhow::{Result, anyhow};
use credibil_did::{DidResolver, PublicKeyJwk, Resource};
use serde::{Deserialize, Serialize};

/// `Kind` allows serde to serialize/deserialize a string or an object.
///
/// Several VPR-facing documents (issuer fields, schema references) are
/// specified as "a URI, or an object with an `id`"; `Kind` captures that
/// without forcing call sites to match on a dedicated enum per field.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Kind<T> {
    /// Simple string value.
    String(String),

    /// Complex object value.
    Object(T),
}

impl<T> Default for Kind<T> {
    fn default() -> Self {
        Self::String(String::new())
    }
}

impl<T> From<String> for Kind<T> {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl<T> Kind<T> {
    /// Returns the string value, if this is a `String` variant.
    pub const fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            Self::Object(_) => None,
        }
    }

    /// Returns the object value, if this is an `Object` variant.
    pub const fn as_object(&self) -> Option<&T> {
        match self {
            Self::String(_) => None,
            Self::Object(o) => Some(o),
        }
    }
}

/// `OneMany` allows serde to serialize/deserialize a single object or a set
/// of objects.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum OneMany<T> {
    /// Single object.
    One(T),

    /// Set of objects.
    Many(Vec<T>),
}

impl<T: Default> Default for OneMany<T> {
    fn default() -> Self {
        Self::One(T::default())
    }
}

impl<T> From<T> for OneMany<T> {
    fn from(value: T) -> Self {
        Self::One(value)
    }
}

impl<T: Clone> OneMany<T> {
    /// Returns a slice view over the contained value(s).
    pub fn as_slice(&self) -> &[T] {
        match self {
            Self::One(one) => std::slice::from_ref(one),
            Self::Many(many) => many.as_slice(),
        }
    }

    /// Iterates over the contained value(s).
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    /// Returns the number of contained values.
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Returns `true` if there are no contained values (only possible for an
    /// empty `Many`).
    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

/// Resolve the raw public key material for a verification method DID URL
/// (e.g. a JWS `kid` or a Data Integrity proof's `verificationMethod`).
///
/// # Errors
///
/// Returns an error if the DID URL cannot be dereferenced, or if the
/// dereferenced resource is not a verification method with usable key
/// material.
pub async fn did_jwk<R>(did_url: &str, resolver: &R) -> Result<PublicKeyJwk>
where
    R: DidResolver + Clone + Send + Sync,
{
    let deref = credibil_did::dereference(did_url, None, resolver.clone())
        .await
        .map_err(|e| anyhow!("issue dereferencing DID URL: {e}"))?;
    let Some(Resource::VerificationMethod(vm)) = deref.content_stream else {
        return Err(anyhow!("verification method not found for {did_url}"));
    };
    vm.method_type.jwk().map_err(|e| anyhow!("JWK not found: {e}"))
}
