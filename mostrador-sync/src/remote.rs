//! Remote store client
//!
//! The sync engine talks to the backend through the [`RemoteStore`]
//! trait: four operations per collection, with errors carried as plain
//! human-readable messages. [`HttpRemoteStore`] is the production
//! implementation over a PostgREST-style HTTP API.

use crate::config::RemoteConfig;
use crate::error::{SyncError, SyncResult};
use crate::models::Collection;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Error surfaced by a remote store operation. The backend contract
/// guarantees nothing beyond a message.
#[derive(Error, Debug, Clone)]
#[error("{0}")]
pub struct RemoteError(pub String);

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Backend interface consumed by the sync engine
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Insert a record; returns the stored row as the server sees it
    async fn insert(
        &self,
        collection: Collection,
        record: &serde_json::Value,
    ) -> Result<serde_json::Value, RemoteError>;

    /// Update a record by id with a partial payload
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: &serde_json::Value,
    ) -> Result<(), RemoteError>;

    /// Delete a record by id
    async fn delete(&self, collection: Collection, id: &str) -> Result<(), RemoteError>;

    /// Fetch the full contents of a collection
    async fn select_all(
        &self,
        collection: Collection,
    ) -> Result<Vec<serde_json::Value>, RemoteError>;
}

/// HTTP implementation of the remote store
pub struct HttpRemoteStore {
    config: RemoteConfig,
    client: reqwest::Client,
}

impl HttpRemoteStore {
    /// Build the client with the configured request timeout
    pub fn new(config: RemoteConfig) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SyncError::Remote(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn collection_url(&self, collection: Collection) -> String {
        format!("{}/{}", self.config.base_url, collection.as_str())
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => req.header("apikey", key).bearer_auth(key),
            None => req,
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::new(error_message(status, &body)))
    }
}

/// Reduce an HTTP failure to the message reported per item. Backends
/// that answer with a JSON `message` field get it passed through.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    let from_body = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str().map(str::to_string)));

    match from_body {
        Some(message) => message,
        None if body.trim().is_empty() => format!("HTTP {}", status),
        None => body.trim().to_string(),
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn insert(
        &self,
        collection: Collection,
        record: &serde_json::Value,
    ) -> Result<serde_json::Value, RemoteError> {
        let req = self
            .client
            .post(self.collection_url(collection))
            .header("Prefer", "return=representation")
            .json(record);

        let response = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| RemoteError::new(e.to_string()))?;
        let response = Self::check_status(response).await?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RemoteError::new(e.to_string()))?;

        // Row-returning backends answer with a one-element array
        let row = match body {
            serde_json::Value::Array(rows) => rows.into_iter().next().ok_or_else(|| {
                RemoteError::new(format!(
                    "Empty insert response for {}",
                    collection.as_str()
                ))
            })?,
            other => other,
        };

        Ok(row)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: &serde_json::Value,
    ) -> Result<(), RemoteError> {
        let url = format!("{}?id=eq.{}", self.collection_url(collection), id);
        let req = self.client.patch(url).json(patch);

        let response = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| RemoteError::new(e.to_string()))?;
        Self::check_status(response).await?;

        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), RemoteError> {
        let url = format!("{}?id=eq.{}", self.collection_url(collection), id);

        let response = self
            .authorize(self.client.delete(url))
            .send()
            .await
            .map_err(|e| RemoteError::new(e.to_string()))?;
        Self::check_status(response).await?;

        Ok(())
    }

    async fn select_all(
        &self,
        collection: Collection,
    ) -> Result<Vec<serde_json::Value>, RemoteError> {
        let url = format!("{}?select=*", self.collection_url(collection));

        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|e| RemoteError::new(e.to_string()))?;
        let response = Self::check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| RemoteError::new(e.to_string()))
    }
}
