use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::B256;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{BlockSummary, Log, LogFilter};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Live full node queries needed by the log engine.
#[async_trait]
pub trait FullNodeClient: Send + Sync {
    /// Look up a block by hash. `Ok(None)` when the node does not know it.
    async fn block_by_hash(&self, hash: B256) -> Result<Option<BlockSummary>>;

    async fn logs(&self, filter: &LogFilter) -> Result<Vec<Log>>;
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcErrorObject>,
}

impl<T> JsonRpcResponse<T> {
    fn into_result(self) -> Result<Option<T>> {
        match self.error {
            Some(err) => Err(Error::Rpc {
                code: err.code,
                message: err.message,
            }),
            None => Ok(self.result),
        }
    }
}

/// JSON-RPC over HTTP client bound to one full node.
#[derive(Debug)]
pub struct HttpFullNodeClient {
    client: Client,
    url: String,
    next_id: AtomicU64,
}

impl HttpFullNodeClient {
    pub fn new(url: &str) -> Result<Self> {
        Self::with_timeout(url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<P, T>(&self, method: &str, params: P) -> Result<Option<T>>
    where
        P: Serialize + Send,
        T: DeserializeOwned,
    {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        tracing::trace!(url = %self.url, method, id = request.id, "Full node request");

        let body = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let response: JsonRpcResponse<T> = serde_json::from_slice(&body)?;
        response.into_result()
    }
}

#[async_trait]
impl FullNodeClient for HttpFullNodeClient {
    async fn block_by_hash(&self, hash: B256) -> Result<Option<BlockSummary>> {
        self.call("eth_getBlockByHash", (hash, false)).await
    }

    async fn logs(&self, filter: &LogFilter) -> Result<Vec<Log>> {
        let logs: Option<Vec<Log>> = self.call("eth_getLogs", [filter]).await?;
        Ok(logs.unwrap_or_default())
    }
}
