use std::time::Duration;

use common::{Amount, WasmError};
use thiserror::Error;

use crate::datastore::DatastoreError;
use crate::rpc::RpcError;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Invalid bytecode for {what}: {source}")]
    Bytecode {
        what: String,
        #[source]
        source: WasmError,
    },
    #[error("Deployer bytecode does not export `main`")]
    MissingMain,
    #[error(transparent)]
    Datastore(#[from] DatastoreError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("Chain id unknown: not configured and not reported by the node")]
    UnknownChainId,
    #[error("Address {0} not known by the node")]
    AddressNotFound(String),
    #[error("Fee and coins overflow")]
    CostOverflow,
    #[error("Insufficient balance on {address}: {balance} MAS available, {required} MAS required")]
    InsufficientBalance {
        address: String,
        balance: Amount,
        required: Amount,
    },
    #[error("Node did not accept the operation")]
    NotAccepted,
    #[error("Operation {operation_id} failed: {}", .errors.join("; "))]
    ExecutionFailed {
        operation_id: String,
        errors: Vec<String>,
    },
    #[error("Operation {operation_id} not executed after {waited:?}")]
    Timeout {
        operation_id: String,
        waited: Duration,
    },
}
