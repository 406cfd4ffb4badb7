pub mod abi;
pub mod error;
pub mod types;

pub use error::{Result, RpcError};

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use councilhaus_common::Address;
use councilhaus_engine::{InstanceReader, InstanceState};
use types::{RpcRequest, RpcResponse};

const DISTRIBUTION_TOKEN: &str = "distributionToken()";
const MAX_ALLOCATIONS_PER_MEMBER: &str = "maxAllocationsPerMember()";

/// Minimal Ethereum JSON-RPC client: view calls pinned to a block.
pub struct RpcClient {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let resp = self
            .client
            .post(&self.url)
            .json(&RpcRequest::new(id, method, params))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RpcError::Http {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: RpcResponse<T> = resp.json().await?;
        body.into_result()
    }

    /// `eth_call` against `to` at `block_number`. Returns the raw return data.
    pub async fn eth_call(&self, to: &Address, data: &[u8], block_number: u64) -> Result<Vec<u8>> {
        let params = json!([
            { "to": to.to_string(), "data": abi::encode_hex(data) },
            format!("0x{block_number:x}"),
        ]);
        let result: String = self.request("eth_call", params).await?;
        abi::decode_hex(&result)
    }

    /// Latest block number known to the node.
    pub async fn chain_head(&self) -> Result<u64> {
        let result: String = self.request("eth_blockNumber", json!([])).await?;
        let digits = result.strip_prefix("0x").unwrap_or(&result);
        u64::from_str_radix(digits, 16)
            .map_err(|e| RpcError::Decode(format!("bad block number {result:?}: {e}")))
    }

    async fn view(&self, to: &Address, signature: &str, block_number: u64) -> Result<Vec<u8>> {
        debug!(to = %to, signature, block_number, "eth_call");
        self.eth_call(to, &abi::selector(signature), block_number).await
    }
}

#[async_trait]
impl InstanceReader for RpcClient {
    async fn read_instance(
        &self,
        instance: &Address,
        block_number: u64,
    ) -> anyhow::Result<InstanceState> {
        let token = self.view(instance, DISTRIBUTION_TOKEN, block_number).await?;
        let max = self
            .view(instance, MAX_ALLOCATIONS_PER_MEMBER, block_number)
            .await?;

        Ok(InstanceState {
            distribution_token: abi::decode_address(&token)?,
            max_allocations_per_member: abi::decode_uint(&max)?,
        })
    }
}
