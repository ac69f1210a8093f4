//! DID and DID Document types.
//!
//! Full DID resolution (verification methods, key material) is delegated to
//! [`credibil_did`]; the types here capture only the subset of a DID
//! Document the trust pipeline reads directly — its service endpoints.

use serde::{Deserialize, Serialize};

use crate::core::OneMany;

/// A decentralized identifier: an opaque string of the form
/// `did:<method>:<method-specific-id>`.
pub type Did = String;

/// The DID method portion of a [`Did`] (`"web"`, `"webvh"`, ...), used for
/// method dispatch by the resolver.
#[must_use]
pub fn method_of(did: &str) -> Option<&str> {
    let rest = did.strip_prefix("did:")?;
    rest.split(':').next()
}

/// A minimal DID Document: just enough to locate `LinkedVerifiablePresentation`
/// service endpoints. Verification methods are resolved on demand through
/// [`credibil_did::dereference`] rather than modeled here, since the only
/// consumer of key material is signature verification, which needs a DID URL,
/// not the whole document.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct DidDocument {
    /// The `id` of the document — normally equal to the DID that was
    /// resolved.
    pub id: Did,

    /// Service endpoints declared by the subject.
    #[serde(default)]
    pub service: Vec<ServiceEndpoint>,
}

/// One `service` entry of a DID Document.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceEndpoint {
    /// Service entry identifier (a DID URL, typically `<did>#<fragment>`).
    pub id: String,

    /// Service type(s). Modeled as `OneMany<String>` because the DID Core
    /// data model allows either a bare string or a list.
    #[serde(rename = "type")]
    pub type_: OneMany<String>,

    /// The endpoint URL. Only plain `http(s)` string endpoints are consumed
    /// by this resolver; endpoint maps/arrays are treated as unusable.
    pub service_endpoint: ServiceEndpointValue,
}

/// The `serviceEndpoint` value, which the DID Core spec allows to be a
/// string, a map, or a list of either. Only the string form is meaningful
/// to a `LinkedVerifiablePresentation` consumer.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ServiceEndpointValue {
    /// A single URL.
    Uri(String),
    /// Anything else (map, list) — carried through but not dereferenced.
    Other(serde_json::Value),
}

impl Default for ServiceEndpointValue {
    fn default() -> Self {
        Self::Uri(String::new())
    }
}

/// The service type this resolver dereferences to obtain a Verifiable
/// Presentation.
pub const LINKED_VP_TYPE: &str = "LinkedVerifiablePresentation";

impl ServiceEndpoint {
    /// Returns `true` if this entry is a `LinkedVerifiablePresentation` with
    /// an `http(s)` string endpoint, i.e. one the VP dereference pass will
    /// fetch.
    #[must_use]
    pub fn is_linked_vp_http(&self) -> bool {
        let is_linked_vp = self.type_.as_slice().iter().any(|t| t == LINKED_VP_TYPE);
        let is_http = matches!(
            &self.service_endpoint,
            ServiceEndpointValue::Uri(u) if u.starts_with("http://") || u.starts_with("https://")
        );
        is_linked_vp && is_http
    }

    /// The endpoint URL, if this is a string endpoint.
    #[must_use]
    pub fn endpoint_uri(&self) -> Option<&str> {
        match &self.service_endpoint {
            ServiceEndpointValue::Uri(u) => Some(u.as_str()),
            ServiceEndpointValue::Other(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_method() {
        assert_eq!(method_of("did:web:example.com"), Some("web"));
        assert_eq!(method_of("did:webvh:1-abc:example.com"), Some("webvh"));
        assert_eq!(method_of("not-a-did"), None);
    }

    #[test]
    fn recognizes_linked_vp_http_endpoints() {
        let svc = ServiceEndpoint {
            id: "did:web:acme.example.com#vp".into(),
            type_: OneMany::One(LINKED_VP_TYPE.to_string()),
            service_endpoint: ServiceEndpointValue::Uri(
                "https://acme.example.com/vp.json".into(),
            ),
        };
        assert!(svc.is_linked_vp_http());
    }

    #[test]
    fn ignores_non_http_or_non_linked_vp_endpoints() {
        let not_linked = ServiceEndpoint {
            id: "did:web:acme.example.com#other".into(),
            type_: OneMany::One("SomeOtherService".to_string()),
            service_endpoint: ServiceEndpointValue::Uri("https://acme.example.com/x".into()),
        };
        assert!(!not_linked.is_linked_vp_http());

        let not_http = ServiceEndpoint {
            id: "did:web:acme.example.com#vp".into(),
            type_: OneMany::One(LINKED_VP_TYPE.to_string()),
            service_endpoint: ServiceEndpointValue::Uri("did:web:somewhere".into()),
        };
        assert!(!not_http.is_linked_vp_http());
    }
}
