//! Concrete `IndexerClient` over the indexer's HTTP API, plus the websocket
//! push-channel subscriber used by the polling loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::StreamExt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::error::{Error, Result};
use crate::indexer::{
    ChangeActivity, DigestRecord, IndexerClient, IndexerEvent, PermissionFilter, SchemaFilter,
    TrustRegistryFilter,
};
use crate::model::{CredentialSchema, Permission, PermissionSession, TrustRegistry};

/// HTTP-backed `IndexerClient`. Memoizes responses within one poll cycle
/// (cleared via `clear_memo`) so that repeated point-in-time lookups at the
/// same block don't re-fetch from the indexer.
pub struct HttpIndexerClient {
    base_url: String,
    client: Client,
    memo: DashMap<String, Value>,
}

impl HttpIndexerClient {
    /// Builds a client against `base_url` (no trailing slash required).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            memo: DashMap::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let memo_key = format!("{path}?{query:?}");
        if let Some(cached) = self.memo.get(&memo_key) {
            return serde_json::from_value(cached.clone())
                .map_err(|e| Error::IndexerUnavailable(format!("cached response malformed: {e}")));
        }
        let response = self
            .client
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .map_err(|e| Error::IndexerUnavailable(format!("request to {path} failed: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::IndexerUnavailable(format!(
                "{path} returned status {}",
                response.status()
            )));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::IndexerUnavailable(format!("response from {path} not JSON: {e}")))?;
        self.memo.insert(memo_key, body.clone());
        serde_json::from_value(body)
            .map_err(|e| Error::IndexerUnavailable(format!("response from {path} malformed: {e}")))
    }

    fn at_block_query(at_block: Option<u64>) -> Vec<(&'static str, String)> {
        at_block.map(|b| vec![("atBlock", b.to_string())]).unwrap_or_default()
    }
}

#[async_trait]
impl IndexerClient for HttpIndexerClient {
    async fn block_height(&self) -> Result<u64> {
        #[derive(serde::Deserialize)]
        struct Resp {
            height: u64,
        }
        let resp: Resp = self.get_json("/verana/indexer/v1/height", &[]).await?;
        Ok(resp.height)
    }

    async fn list_changes(&self, block: u64) -> Result<Vec<ChangeActivity>> {
        #[derive(serde::Deserialize)]
        struct Resp {
            activity: Vec<ChangeActivity>,
        }
        let resp: Resp = self
            .get_json("/verana/indexer/v1/changes", &[("block", block.to_string())])
            .await?;
        Ok(resp.activity)
    }

    async fn list_credential_schemas(
        &self, filter: &SchemaFilter, at_block: Option<u64>,
    ) -> Result<Vec<CredentialSchema>> {
        let mut query = Self::at_block_query(at_block);
        if let Some(js) = &filter.json_schema {
            query.push(("jsonSchema", js.clone()));
        }
        if let Some(tr_id) = filter.tr_id {
            query.push(("trId", tr_id.to_string()));
        }
        let body: Value = self.get_json("/verana/indexer/v1/credential-schemas", &query).await?;
        let schemas = body
            .get("schemas")
            .or_else(|| body.get("credential_schemas"))
            .cloned()
            .unwrap_or(Value::Array(Vec::new()));
        serde_json::from_value(schemas)
            .map_err(|e| Error::IndexerUnavailable(format!("credential schema list malformed: {e}")))
    }

    async fn credential_schema_by_json_schema_id(
        &self, js_id: u64, at_block: Option<u64>,
    ) -> Result<Option<CredentialSchema>> {
        #[derive(serde::Deserialize)]
        struct Resp {
            credential_schema: Option<CredentialSchema>,
        }
        let resp: Resp = self
            .get_json(
                &format!("/verana/indexer/v1/credential-schemas/by-json-schema-id/{js_id}"),
                &Self::at_block_query(at_block),
            )
            .await?;
        Ok(resp.credential_schema)
    }

    async fn list_permissions(
        &self, filter: &PermissionFilter, at_block: Option<u64>,
    ) -> Result<Vec<Permission>> {
        let mut query = Self::at_block_query(at_block);
        if let Some(did) = &filter.did {
            query.push(("did", did.clone()));
        }
        if let Some(schema_id) = filter.schema_id {
            query.push(("schemaId", schema_id.to_string()));
        }
        if let Some(type_) = &filter.type_ {
            query.push(("type", type_.clone()));
        }
        if filter.only_valid {
            query.push(("onlyValid", "true".to_string()));
        }
        #[derive(serde::Deserialize)]
        struct Resp {
            permissions: Vec<Permission>,
        }
        let resp: Resp = self.get_json("/verana/indexer/v1/permissions", &query).await?;
        Ok(resp.permissions)
    }

    async fn permission(&self, id: u64, at_block: Option<u64>) -> Result<Option<Permission>> {
        #[derive(serde::Deserialize)]
        struct Resp {
            permission: Option<Permission>,
        }
        let resp: Resp = self
            .get_json(&format!("/verana/indexer/v1/permissions/{id}"), &Self::at_block_query(at_block))
            .await?;
        Ok(resp.permission)
    }

    async fn permission_session(
        &self, id: u64, at_block: Option<u64>,
    ) -> Result<Option<PermissionSession>> {
        #[derive(serde::Deserialize)]
        struct Resp {
            permission_session: Option<PermissionSession>,
        }
        let resp: Resp = self
            .get_json(
                &format!("/verana/indexer/v1/permission-sessions/{id}"),
                &Self::at_block_query(at_block),
            )
            .await?;
        Ok(resp.permission_session)
    }

    async fn find_beneficiaries(
        &self, issuer_perm_id: u64, verifier_perm_id: u64, at_block: Option<u64>,
    ) -> Result<Vec<Permission>> {
        let mut query = Self::at_block_query(at_block);
        query.push(("issuerPermId", issuer_perm_id.to_string()));
        query.push(("verifierPermId", verifier_perm_id.to_string()));
        #[derive(serde::Deserialize)]
        struct Resp {
            permissions: Vec<Permission>,
        }
        let resp: Resp = self.get_json("/verana/indexer/v1/beneficiaries", &query).await?;
        Ok(resp.permissions)
    }

    async fn trust_registry(&self, id: u64, at_block: Option<u64>) -> Result<Option<TrustRegistry>> {
        #[derive(serde::Deserialize)]
        struct Resp {
            trust_registry: Option<TrustRegistry>,
        }
        let resp: Resp = self
            .get_json(
                &format!("/verana/indexer/v1/trust-registries/{id}"),
                &Self::at_block_query(at_block),
            )
            .await?;
        Ok(resp.trust_registry)
    }

    async fn list_trust_registries(
        &self, filter: &TrustRegistryFilter, at_block: Option<u64>,
    ) -> Result<Vec<TrustRegistry>> {
        let mut query = Self::at_block_query(at_block);
        if let Some(did) = &filter.did {
            query.push(("did", did.clone()));
        }
        #[derive(serde::Deserialize)]
        struct Resp {
            trust_registries: Vec<TrustRegistry>,
        }
        let resp: Resp = self.get_json("/verana/indexer/v1/trust-registries", &query).await?;
        Ok(resp.trust_registries)
    }

    async fn digest(&self, digest_sri: &str, at_block: Option<u64>) -> Result<Option<DigestRecord>> {
        #[derive(serde::Deserialize)]
        struct Resp {
            digest: Option<DigestRecord>,
        }
        let mut query = Self::at_block_query(at_block);
        query.push(("digestSri", digest_sri.to_string()));
        let resp: Resp = self.get_json("/verana/indexer/v1/digests", &query).await?;
        Ok(resp.digest)
    }

    async fn trust_deposit_by_account(&self, did: &str, at_block: Option<u64>) -> Result<u128> {
        #[derive(serde::Deserialize)]
        struct Amount {
            amount: u128,
        }
        #[derive(serde::Deserialize)]
        struct Resp {
            trust_deposit: Option<Amount>,
        }
        let mut query = Self::at_block_query(at_block);
        query.push(("account", did.to_string()));
        let resp: Resp = self.get_json("/verana/indexer/v1/trust-deposits", &query).await?;
        Ok(resp.trust_deposit.map_or(0, |a| a.amount))
    }

    async fn fetch_json_schema_content(&self, js_id: u64, at_block: Option<u64>) -> Result<String> {
        let response = self
            .client
            .get(self.url(&format!("/verana/indexer/v1/credential-schemas/{js_id}/content")))
            .query(&Self::at_block_query(at_block))
            .send()
            .await
            .map_err(|e| Error::IndexerUnavailable(format!("schema content fetch failed: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::IndexerUnavailable(format!(
                "schema content fetch returned status {}",
                response.status()
            )));
        }
        response
            .text()
            .await
            .map_err(|e| Error::IndexerUnavailable(format!("schema content body unreadable: {e}")))
    }

    async fn clear_memo(&self) {
        self.memo.clear();
    }
}

/// Subscribes to the indexer's block-processed push channel, reconnecting
/// with exponential backoff (1 s initial, capped at 30 s) on any drop.
/// Events are delivered on the returned receiver; the task exits when the
/// sender side is dropped.
pub fn subscribe(ws_url: String) -> mpsc::Receiver<IndexerEvent> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let mut backoff = Duration::from_secs(1);
        loop {
            match connect_async(&ws_url).await {
                Ok((mut stream, _)) => {
                    backoff = Duration::from_secs(1);
                    while let Some(msg) = stream.next().await {
                        match msg {
                            Ok(Message::Text(text)) => {
                                if let Ok(event) = serde_json::from_str::<IndexerEvent>(&text) {
                                    if tx.send(event).await.is_err() {
                                        return;
                                    }
                                }
                            }
                            Ok(Message::Close(_)) | Err(_) => break,
                            Ok(_) => {}
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "indexer websocket connect failed, retrying");
                }
            }
            if tx.is_closed() {
                return;
            }
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(Duration::from_secs(30));
        }
    });
    rx
}
