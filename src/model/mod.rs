//! Data model for the trust resolution pipeline.

pub mod credential;
pub mod did;
pub mod reattempt;
pub mod registry;
pub mod trust;

pub use credential::{
    AnonCredsCredential, CredentialFormat, CredentialSubject, CredentialSchemaRef,
    DataIntegrityProof, EcsType, Issuer, JsonLdCredential, VerifiableCredential,
    VerifiablePresentation,
};
pub use did::{Did, DidDocument, ServiceEndpoint, ServiceEndpointValue, method_of};
pub use reattempt::{ErrorType, ProcessingState, ReattemptableResource, ResourceType};
pub use registry::{
    CredentialSchema, IssuerPermManagementMode, Permission, PermissionSession,
    PermissionSessionRecord, PermissionState, PermissionType, TrustRegistry,
};
pub use trust::{
    CredentialEvaluation, CredentialResultStatus, FailedCredential, FailureCode,
    PermissionChainEntry, TrustResult, TrustStatus, VpDereferenceError,
};
