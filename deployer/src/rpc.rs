// JSON-RPC node client
//
// Only the public API methods the toolkit needs are wrapped. `NodeApi` is the
// seam used by the deploy flow so it can be driven without a node.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::Amount;
use log::debug;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::operation::SignedOperation;

pub const MAINNET_URL: &str = "https://mainnet.massa.net/api/v2";
pub const BUILDNET_URL: &str = "https://buildnet.massa.net/api/v2";
pub const MAINNET_CHAIN_ID: u64 = 77658377;
pub const BUILDNET_CHAIN_ID: u64 = 77658366;

/// Public networks with a known node and chain id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Buildnet,
}

impl Network {
    pub fn url(&self) -> &'static str {
        match self {
            Network::Mainnet => MAINNET_URL,
            Network::Buildnet => BUILDNET_URL,
        }
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Mainnet => MAINNET_CHAIN_ID,
            Network::Buildnet => BUILDNET_CHAIN_ID,
        }
    }
}

impl std::str::FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "buildnet" => Ok(Network::Buildnet),
            other => Err(format!("Unknown network {:?}, expected mainnet or buildnet", other)),
        }
    }
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Node returned HTTP status {0}")]
    Status(reqwest::StatusCode),
    #[error("Node error {code}: {message}")]
    Node { code: i64, message: String },
    #[error("Empty response to {0}")]
    EmptyResponse(&'static str),
    #[error("Invalid response to {method}: {source}")]
    InvalidResponse {
        method: &'static str,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Slot {
    pub period: u64,
    pub thread: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub operation_validity_periods: u64,
    #[serde(default)]
    pub thread_count: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeStatus {
    #[serde(default)]
    pub version: String,
    pub last_slot: Option<Slot>,
    pub config: NodeConfig,
    /// Reported by nodes that sign operations with a chain id
    #[serde(default)]
    pub chain_id: Option<u64>,
}

impl NodeStatus {
    /// Last period an operation sent now may be included in
    pub fn expire_period(&self) -> u64 {
        let period = self.last_slot.map(|slot| slot.period).unwrap_or(0);
        period + self.config.operation_validity_periods
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressInfo {
    pub address: String,
    pub final_balance: Amount,
    pub candidate_balance: Amount,
    #[serde(default)]
    pub final_datastore_keys: Vec<Vec<u8>>,
    #[serde(default)]
    pub candidate_datastore_keys: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationInfo {
    pub id: String,
    #[serde(default)]
    pub in_pool: bool,
    #[serde(default)]
    pub in_blocks: Vec<String>,
    #[serde(default)]
    pub is_operation_final: Option<bool>,
    /// `None` until executed, then whether execution succeeded
    #[serde(default)]
    pub op_exec_status: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EventFilter {
    pub start: Option<Slot>,
    pub end: Option<Slot>,
    pub emitter_address: Option<String>,
    pub original_caller_address: Option<String>,
    pub original_operation_id: Option<String>,
    pub is_final: Option<bool>,
    pub is_error: Option<bool>,
}

impl EventFilter {
    pub fn for_operation(operation_id: &str) -> Self {
        Self {
            original_operation_id: Some(operation_id.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventContext {
    pub slot: Slot,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub is_error: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScOutputEvent {
    pub context: EventContext,
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatastoreEntryInput {
    pub address: String,
    pub key: Vec<u8>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatastoreEntryOutput {
    pub final_value: Option<Vec<u8>>,
    pub candidate_value: Option<Vec<u8>>,
}

/// Node methods used by the toolkit
#[async_trait]
pub trait NodeApi: Send + Sync {
    async fn get_status(&self) -> Result<NodeStatus, RpcError>;

    async fn get_addresses(&self, addresses: &[String]) -> Result<Vec<AddressInfo>, RpcError>;

    /// Returns the ids of the accepted operations
    async fn send_operations(&self, operations: &[SignedOperation]) -> Result<Vec<String>, RpcError>;

    async fn get_operations(&self, ids: &[String]) -> Result<Vec<OperationInfo>, RpcError>;

    async fn get_filtered_sc_output_event(
        &self,
        filter: &EventFilter,
    ) -> Result<Vec<ScOutputEvent>, RpcError>;

    async fn get_datastore_entries(
        &self,
        entries: &[DatastoreEntryInput],
    ) -> Result<Vec<DatastoreEntryOutput>, RpcError>;
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 client for a node's public API
pub struct NodeClient {
    url: String,
    client: Client,
    next_id: AtomicU64,
}

impl NodeClient {
    pub fn new(url: &str) -> Result<Self, RpcError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            url: url.to_string(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<R: DeserializeOwned>(&self, method: &'static str, params: Value) -> Result<R, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = request_body(id, method, params);
        debug!("-> {} #{}", method, id);

        let response = self.client.post(&self.url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(RpcError::Status(response.status()));
        }
        let response: JsonRpcResponse = response.json().await?;
        parse_response(method, response)
    }
}

fn request_body(id: u64, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
}

fn parse_response<R: DeserializeOwned>(method: &'static str, response: JsonRpcResponse) -> Result<R, RpcError> {
    if let Some(error) = response.error {
        return Err(RpcError::Node {
            code: error.code,
            message: error.message,
        });
    }
    let result = response.result.ok_or(RpcError::EmptyResponse(method))?;
    serde_json::from_value(result).map_err(|source| RpcError::InvalidResponse { method, source })
}

#[async_trait]
impl NodeApi for NodeClient {
    async fn get_status(&self) -> Result<NodeStatus, RpcError> {
        self.call("get_status", json!([])).await
    }

    async fn get_addresses(&self, addresses: &[String]) -> Result<Vec<AddressInfo>, RpcError> {
        self.call("get_addresses", json!([addresses])).await
    }

    async fn send_operations(&self, operations: &[SignedOperation]) -> Result<Vec<String>, RpcError> {
        self.call("send_operations", json!([operations])).await
    }

    async fn get_operations(&self, ids: &[String]) -> Result<Vec<OperationInfo>, RpcError> {
        self.call("get_operations", json!([ids])).await
    }

    async fn get_filtered_sc_output_event(
        &self,
        filter: &EventFilter,
    ) -> Result<Vec<ScOutputEvent>, RpcError> {
        self.call("get_filtered_sc_output_event", json!([filter])).await
    }

    async fn get_datastore_entries(
        &self,
        entries: &[DatastoreEntryInput],
    ) -> Result<Vec<DatastoreEntryOutput>, RpcError> {
        self.call("get_datastore_entries", json!([entries])).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(value: Value) -> JsonRpcResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_network() {
        let mainnet: Network = "mainnet".parse().unwrap();
        assert_eq!(mainnet.url(), MAINNET_URL);
        assert_eq!(mainnet.chain_id(), 77658377);
        assert_eq!("Buildnet".parse::<Network>().unwrap().chain_id(), BUILDNET_CHAIN_ID);
        assert!("testnet".parse::<Network>().is_err());
    }

    #[test]
    fn test_request_body() {
        let body = request_body(7, "get_operations", json!([["O1abc"]]));
        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["id"], 7);
        assert_eq!(body["method"], "get_operations");
        assert_eq!(body["params"][0][0], "O1abc");
    }

    #[test]
    fn test_parse_status() {
        let status: NodeStatus = parse_response(
            "get_status",
            response(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {
                    "node_id": "N1xyz",
                    "version": "DEVN.28.3",
                    "last_slot": {"period": 120, "thread": 3},
                    "config": {"operation_validity_periods": 10, "thread_count": 32},
                    "chain_id": 77658366
                }
            })),
        )
        .unwrap();

        assert_eq!(status.expire_period(), 130);
        assert_eq!(status.chain_id, Some(BUILDNET_CHAIN_ID));
    }

    #[test]
    fn test_parse_address_balances() {
        let infos: Vec<AddressInfo> = parse_response(
            "get_addresses",
            response(json!({
                "result": [{
                    "address": "AU1abc",
                    "final_balance": "12.5",
                    "candidate_balance": "10",
                    "final_datastore_keys": [[112, 114]],
                    "thread": 4
                }]
            })),
        )
        .unwrap();

        assert_eq!(infos[0].final_balance, "12.5".parse().unwrap());
        assert_eq!(infos[0].candidate_balance, Amount::from_mas(10).unwrap());
        assert_eq!(infos[0].final_datastore_keys, vec![vec![112, 114]]);
        assert!(infos[0].candidate_datastore_keys.is_empty());
    }

    #[test]
    fn test_node_error_is_surfaced() {
        let err = parse_response::<Vec<String>>(
            "send_operations",
            response(json!({"error": {"code": -32000, "message": "fee too low"}})),
        )
        .unwrap_err();

        match err {
            RpcError::Node { code, message } => {
                assert_eq!(code, -32000);
                assert_eq!(message, "fee too low");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_missing_result() {
        let err = parse_response::<Vec<String>>("get_operations", response(json!({}))).unwrap_err();
        assert!(matches!(err, RpcError::EmptyResponse("get_operations")));
    }

    #[test]
    fn test_event_filter_serializes_nulls() {
        let filter = serde_json::to_value(EventFilter::for_operation("O1op")).unwrap();
        assert_eq!(filter["original_operation_id"], "O1op");
        assert!(filter["emitter_address"].is_null());
    }
}
