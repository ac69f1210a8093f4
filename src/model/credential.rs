//! Verifiable Presentations and Verifiable Credentials.
//!
//! Shapes are grounded on `credibil_vc`'s W3C Verifiable Credential data
//! model (`camelCase` wire format, `Kind`/`OneMany` for the "string-or-object"
//! and "one-or-many" JSON-LD idioms), widened with an `anoncreds` variant.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::{Kind, OneMany};
use crate::model::did::Did;

/// A Verifiable Presentation: an ordered list of credentials, as retrieved by
/// dereferencing a `LinkedVerifiablePresentation` endpoint.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifiablePresentation {
    /// `@context` entries, carried through without interpretation.
    #[serde(rename = "@context")]
    pub context: Vec<Kind<Value>>,

    /// Presentation id.
    pub id: Option<String>,

    /// Presentation type(s).
    #[serde(rename = "type")]
    pub type_: OneMany<String>,

    /// The DID presenting the credentials, if declared.
    pub holder: Option<Did>,

    /// The credentials carried by this presentation. Each entry is either an
    /// embedded object (`w3c-jsonld` / `anoncreds`) or a compact string
    /// (`w3c-jwt`).
    #[serde(default)]
    pub verifiable_credential: Vec<VerifiableCredential>,
}

/// One credential, tagged by its securing mechanism.
///
/// The three formats are distinguished structurally rather than by an
/// explicit `serde` tag, because that is how they actually appear in a VP's
/// `verifiableCredential` array: a bare JWS string, or an object that either
/// carries `schema_id`/`cred_def_id` (AnonCreds) or a JSON-LD `proof`
/// (`w3c-jsonld`).
#[derive(Clone, Debug, PartialEq)]
pub enum VerifiableCredential {
    /// JSON-LD credential secured with an embedded Data Integrity proof.
    JsonLd(Box<JsonLdCredential>),
    /// Credential secured as a compact JWS.
    Jwt(String),
    /// AnonCreds credential, identified by schema and credential-definition
    /// ids rather than an embedded proof.
    AnonCreds(Box<AnonCredsCredential>),
}

impl Serialize for VerifiableCredential {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::JsonLd(vc) => vc.serialize(serializer),
            Self::Jwt(jws) => jws.serialize(serializer),
            Self::AnonCreds(vc) => vc.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for VerifiableCredential {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::String(jws) => Ok(Self::Jwt(jws)),
            Value::Object(ref map) if map.contains_key("schema_id") || map.contains_key("cred_def_id") => {
                let anoncreds: AnonCredsCredential =
                    serde_json::from_value(value).map_err(serde::de::Error::custom)?;
                Ok(Self::AnonCreds(Box::new(anoncreds)))
            }
            Value::Object(_) => {
                let jsonld: JsonLdCredential =
                    serde_json::from_value(value).map_err(serde::de::Error::custom)?;
                Ok(Self::JsonLd(Box::new(jsonld)))
            }
            other => Err(serde::de::Error::custom(format!(
                "credential must be a JWS string or an object, got {other}"
            ))),
        }
    }
}

impl VerifiableCredential {
    /// The credential format tag, as used in evidence records and logs.
    #[must_use]
    pub const fn format(&self) -> CredentialFormat {
        match self {
            Self::JsonLd(_) => CredentialFormat::W3cJsonLd,
            Self::Jwt(_) => CredentialFormat::W3cJwt,
            Self::AnonCreds(_) => CredentialFormat::AnonCreds,
        }
    }
}

/// The three credential securing mechanisms this resolver recognizes.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialFormat {
    /// `w3c-jsonld`
    W3cJsonLd,
    /// `w3c-jwt`
    W3cJwt,
    /// `anoncreds`
    AnonCreds,
}

/// A JSON-LD credential secured with an embedded Data Integrity proof.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct JsonLdCredential {
    /// `@context` entries.
    #[serde(rename = "@context")]
    pub context: Vec<Kind<Value>>,

    /// Credential id.
    pub id: Option<String>,

    /// Credential type(s) — `JsonSchemaCredential` is recognized specially
    /// by schema resolution.
    #[serde(rename = "type")]
    pub type_: OneMany<String>,

    /// The credential's issuer.
    pub issuer: Kind<Issuer>,

    /// Claims about the credential subject(s).
    pub credential_subject: OneMany<CredentialSubject>,

    /// ISO 8601 issuance date (VCDM 1.1 naming).
    pub issuance_date: Option<DateTime<Utc>>,

    /// ISO 8601 issuance date (VCDM 2.0 naming).
    pub valid_from: Option<DateTime<Utc>>,

    /// ISO 8601 expiry date.
    pub valid_until: Option<DateTime<Utc>>,

    /// Schema reference, when not expressed via `JsonSchemaCredential`
    /// subject identification.
    pub credential_schema: Option<OneMany<CredentialSchemaRef>>,

    /// Embedded Data Integrity proof(s).
    pub proof: Option<OneMany<DataIntegrityProof>>,
}

impl JsonLdCredential {
    /// `true` if `type` includes `JsonSchemaCredential`, which changes
    /// where the schema reference is read from.
    #[must_use]
    pub fn is_json_schema_credential(&self) -> bool {
        self.type_.as_slice().iter().any(|t| t == "JsonSchemaCredential")
    }

    /// The credential's own best-effort issuance timestamp, used as the
    /// fallback when no on-chain digest record exists.
    #[must_use]
    pub fn issued_or_valid_from(&self) -> Option<DateTime<Utc>> {
        self.issuance_date.or(self.valid_from)
    }

    /// The issuer DID, regardless of whether `issuer` is a bare string or an
    /// object with an `id`.
    #[must_use]
    pub fn issuer_did(&self) -> &str {
        match &self.issuer {
            Kind::String(s) => s,
            Kind::Object(o) => &o.id,
        }
    }
}

/// `issuer` as an object (vs. a bare DID string).
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Issuer {
    /// Issuer DID.
    pub id: Did,

    /// Additional issuer fields, carried through unexamined.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Claims about the credential subject.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CredentialSubject {
    /// Subject DID, when the subject is identified.
    pub id: Option<Did>,

    /// All other subject claims.
    #[serde(flatten)]
    pub claims: Map<String, Value>,
}

/// A `credentialSchema` entry referencing an on-chain [`super::registry::CredentialSchema`].
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct CredentialSchemaRef {
    /// Schema URL or VPR URI (`vpr:verana:<network>/cs/v1/js/<n>`).
    pub id: String,

    /// Schema reference type, e.g. `"JsonSchema"`.
    #[serde(rename = "type")]
    pub type_: String,

    /// Subresource Integrity digest of the referenced schema, when present.
    #[serde(rename = "digestSRI")]
    pub digest_sri: Option<String>,
}

/// An embedded Data Integrity proof (the `w3c-jsonld` securing mechanism).
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct DataIntegrityProof {
    /// Proof id, if present.
    pub id: Option<String>,

    /// Cryptosuite/proof type, e.g. `"DataIntegrityProof"`.
    #[serde(rename = "type")]
    pub type_: String,

    /// Cryptosuite identifier, e.g. `"eddsa-jcs-2022"`.
    pub cryptosuite: Option<String>,

    /// Creation time of the proof.
    pub created: Option<DateTime<Utc>>,

    /// DID URL of the key used to produce the proof.
    pub verification_method: String,

    /// The purpose the proof was created for, e.g. `"assertionMethod"`.
    pub proof_purpose: String,

    /// Multibase-encoded signature value.
    pub proof_value: String,

    /// Presentation-proof challenge value (VP proofs only).
    pub challenge: Option<String>,
}

/// An AnonCreds credential, identified by schema and credential-definition
/// ids rather than an embedded proof. Signature verification is delegated
/// to an AnonCreds registry; this resolver records pass/fail only.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AnonCredsCredential {
    /// On-chain schema id.
    pub schema_id: String,

    /// On-chain credential-definition id (`issuer_did:...` prefixed, per
    /// the AnonCreds spec — used to recover the issuer DID).
    pub cred_def_id: String,

    /// Issuer DID, when carried explicitly (some registries include it
    /// alongside `cred_def_id` rather than requiring callers to parse it).
    pub issuer_did: Option<Did>,

    /// Revealed attribute values.
    #[serde(default)]
    pub values: Map<String, Value>,
}

impl AnonCredsCredential {
    /// The issuer DID: explicit field if present, else the prefix of
    /// `cred_def_id` up to the first `/`.
    #[must_use]
    pub fn issuer_did(&self) -> String {
        if let Some(did) = &self.issuer_did {
            return did.clone();
        }
        self.cred_def_id.split('/').next().unwrap_or(&self.cred_def_id).to_string()
    }
}

/// The ECS (ecosystem credential schema class) tag derived from a schema's
/// canonical digest.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub enum EcsType {
    /// Verifiable Service credential schema.
    #[serde(rename = "ECS-SERVICE")]
    Service,
    /// Organization credential schema.
    #[serde(rename = "ECS-ORG")]
    Org,
    /// Persona credential schema.
    #[serde(rename = "ECS-PERSONA")]
    Persona,
    /// User-Agent credential schema.
    #[serde(rename = "ECS-UA")]
    UserAgent,
}

impl std::fmt::Display for EcsType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Service => "ECS-SERVICE",
            Self::Org => "ECS-ORG",
            Self::Persona => "ECS-PERSONA",
            Self::UserAgent => "ECS-UA",
        };
        write!(f, "{s}")
    }
}
