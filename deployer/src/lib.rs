//! Multi-contract deployment through a deployer contract.
//!
//! Contracts are packed into the datastore of a single ExecuteSC operation,
//! signed with the account key and submitted to a node over JSON-RPC.

/// Datastore layout read by the deployer contract
pub mod datastore;
/// Account keys, addresses and signatures
pub mod keys;
/// Operation serialization and signing
pub mod operation;
/// Node JSON-RPC client
pub mod rpc;
/// End to end deployment
pub mod deploy;
mod error;

pub use datastore::{build_datastore, ContractData, Datastore, DatastoreError, DeploymentPlan};
pub use deploy::{prepare, DeployOptions, Deployer, DeploymentOutcome, PreparedDeployment, WaitPolicy};
pub use error::DeployError;
pub use keys::{KeyError, KeyPair};
pub use rpc::{Network, NodeApi, NodeClient, RpcError};
