//! Reattempt bookkeeping and the singleton processing cursor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A resource pending retry after a transient or permanent failure.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReattemptableResource {
    /// Key: a DID, a VP endpoint URL, or a synthetic trust-eval key.
    pub resource_id: String,

    /// What kind of resource this is.
    pub resource_type: ResourceType,

    /// When this resource first failed.
    pub first_failure_at: DateTime<Utc>,

    /// When this resource was last retried (or first recorded, before any
    /// retry has happened).
    pub last_retry_at: DateTime<Utc>,

    /// Whether the failure is expected to resolve itself.
    pub error_type: ErrorType,

    /// Number of retries attempted since `first_failure_at`.
    pub retry_count: u32,
}

/// The kind of resource a [`ReattemptableResource`] row tracks.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum ResourceType {
    /// A DID Document resolution.
    DidDoc,
    /// A Verifiable Presentation dereference.
    Vp,
    /// A trust evaluation run (Pass 2).
    TrustEval,
}

/// Whether a reattemptable failure is expected to resolve itself.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum ErrorType {
    /// Likely to succeed on retry (network timeout, indexer hiccup, ...).
    Transient,
    /// Will not succeed on retry without external intervention (DID not
    /// found, unsupported method, invalid DID syntax).
    Permanent,
}

/// The singleton processing cursor.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProcessingState {
    /// The highest block height whose effects have been fully applied.
    pub last_processed_block: u64,
}
