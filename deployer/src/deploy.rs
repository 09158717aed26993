// Deploy flow
//
// Contracts are not sent one by one: a single ExecuteSC operation runs the
// deployer contract, which reads every contract from the datastore and
// creates them in order.

use std::time::Duration;

use common::{inspect_wasm, Amount, WasmSummary};
use log::{debug, info, warn};
use tokio::time::{sleep, Instant};

use crate::datastore::{build_datastore, total_coins, ContractData, Datastore};
use crate::error::DeployError;
use crate::keys::KeyPair;
use crate::operation::{Operation, OperationType, MAX_GAS_DEPLOYMENT};
use crate::rpc::{EventFilter, NodeApi, OperationInfo};

/// Entry point the node runs for ExecuteSC bytecode
const MAIN_EXPORT: &str = "main";

/// How long to follow a sent operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
    /// Wait for finality, not only execution
    pub until_final: bool,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(120),
            until_final: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeployOptions {
    pub fee: Amount,
    pub max_gas: u64,
    /// Overrides the chain id reported by the node
    pub chain_id: Option<u64>,
    /// `None` returns as soon as the node accepted the operation
    pub wait: Option<WaitPolicy>,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            fee: Amount::from_raw(10_000_000),
            max_gas: MAX_GAS_DEPLOYMENT,
            chain_id: None,
            wait: Some(WaitPolicy::default()),
        }
    }
}

/// Per-contract line of a deployment summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractSummary {
    pub index: u64,
    pub size: usize,
    pub args_len: Option<usize>,
    pub coins: Amount,
    pub has_constructor: bool,
}

/// Validated contracts and the datastore carrying them
#[derive(Debug, Clone)]
pub struct PreparedDeployment {
    pub datastore: Datastore,
    pub total_coins: Amount,
    pub contracts: Vec<ContractSummary>,
}

impl PreparedDeployment {
    /// Bytes taken by keys and values
    pub fn datastore_size(&self) -> usize {
        self.datastore.iter().map(|(key, value)| key.len() + value.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentOutcome {
    pub operation_id: String,
    /// Messages emitted while the operation executed
    pub events: Vec<String>,
    /// Contract addresses found in the events
    pub deployed_addresses: Vec<String>,
    pub is_final: bool,
}

/// Validate bytecode and build the datastore, without touching the network
pub fn prepare(deployer_bytecode: &[u8], contracts: &[ContractData]) -> Result<PreparedDeployment, DeployError> {
    let deployer = inspect(deployer_bytecode, "deployer".to_string())?;
    if !deployer.exports(MAIN_EXPORT) {
        return Err(DeployError::MissingMain);
    }

    let mut summaries = Vec::with_capacity(contracts.len());
    for (index, contract) in (1u64..).zip(contracts) {
        let summary = inspect(&contract.bytecode, format!("contract {}", index))?;
        if contract.args.is_some() && !summary.has_constructor() {
            warn!("Contract {} has arguments but no constructor export", index);
        }
        summaries.push(ContractSummary {
            index,
            size: summary.size,
            args_len: contract.args.as_ref().map(Vec::len),
            coins: contract.coins,
            has_constructor: summary.has_constructor(),
        });
    }

    let datastore = build_datastore(contracts)?;
    let total_coins = total_coins(contracts)?;

    Ok(PreparedDeployment {
        datastore,
        total_coins,
        contracts: summaries,
    })
}

fn inspect(bytecode: &[u8], what: String) -> Result<WasmSummary, DeployError> {
    inspect_wasm(bytecode).map_err(|source| DeployError::Bytecode { what, source })
}

/// Deploys contracts from one account through a node
pub struct Deployer<N> {
    node: N,
    keypair: KeyPair,
}

impl<N: NodeApi> Deployer<N> {
    pub fn new(node: N, keypair: KeyPair) -> Self {
        Self { node, keypair }
    }

    /// Address paying for the deployment
    pub fn address(&self) -> String {
        self.keypair.address()
    }

    pub fn node(&self) -> &N {
        &self.node
    }

    /// Send the deployer contract with `contracts` in its datastore
    pub async fn deploy(
        &self,
        deployer_bytecode: &[u8],
        contracts: &[ContractData],
        options: &DeployOptions,
    ) -> Result<DeploymentOutcome, DeployError> {
        let prepared = prepare(deployer_bytecode, contracts)?;
        info!(
            "Deploying {} contract(s), {} MAS in coins, {} datastore bytes",
            prepared.contracts.len(),
            prepared.total_coins,
            prepared.datastore_size()
        );

        let status = self.node.get_status().await?;
        let chain_id = options
            .chain_id
            .or(status.chain_id)
            .ok_or(DeployError::UnknownChainId)?;

        self.ensure_balance(prepared.total_coins, options.fee).await?;

        let operation = Operation {
            fee: options.fee,
            expire_period: status.expire_period(),
            op: OperationType::ExecuteSc {
                max_gas: options.max_gas,
                max_coins: prepared.total_coins,
                data: deployer_bytecode.to_vec(),
                datastore: prepared.datastore,
            },
        };
        let signed = operation.sign(&self.keypair, chain_id);

        let operation_id = self
            .node
            .send_operations(&[signed])
            .await?
            .into_iter()
            .next()
            .ok_or(DeployError::NotAccepted)?;
        info!("Operation {} sent, expires at period {}", operation_id, operation.expire_period);

        let Some(policy) = options.wait else {
            return Ok(DeploymentOutcome {
                operation_id,
                events: Vec::new(),
                deployed_addresses: Vec::new(),
                is_final: false,
            });
        };

        let executed = self.wait_for_execution(&operation_id, &policy).await?;
        let events = self.events(&operation_id).await?;
        let deployed_addresses = events.iter().flat_map(|event| contract_addresses(event)).collect();

        Ok(DeploymentOutcome {
            operation_id,
            events,
            deployed_addresses,
            is_final: executed.is_operation_final == Some(true),
        })
    }

    async fn ensure_balance(&self, coins: Amount, fee: Amount) -> Result<(), DeployError> {
        let address = self.address();
        let info = self
            .node
            .get_addresses(std::slice::from_ref(&address))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DeployError::AddressNotFound(address.clone()))?;

        let required = coins.checked_add(fee).ok_or(DeployError::CostOverflow)?;
        debug!("Balance of {}: {} MAS, required {} MAS", address, info.candidate_balance, required);
        if info.candidate_balance < required {
            return Err(DeployError::InsufficientBalance {
                address,
                balance: info.candidate_balance,
                required,
            });
        }
        Ok(())
    }

    async fn wait_for_execution(
        &self,
        operation_id: &str,
        policy: &WaitPolicy,
    ) -> Result<OperationInfo, DeployError> {
        let started = Instant::now();
        let ids = [operation_id.to_string()];

        loop {
            if let Some(info) = self.node.get_operations(&ids).await?.into_iter().next() {
                match info.op_exec_status {
                    Some(false) => {
                        let errors = self.error_events(operation_id).await?;
                        return Err(DeployError::ExecutionFailed {
                            operation_id: operation_id.to_string(),
                            errors,
                        });
                    }
                    Some(true) if !policy.until_final || info.is_operation_final == Some(true) => {
                        return Ok(info);
                    }
                    _ => debug!("Operation {} pending (in pool: {})", operation_id, info.in_pool),
                }
            }

            let waited = started.elapsed();
            if waited >= policy.timeout {
                return Err(DeployError::Timeout {
                    operation_id: operation_id.to_string(),
                    waited,
                });
            }
            sleep(policy.poll_interval).await;
        }
    }

    async fn events(&self, operation_id: &str) -> Result<Vec<String>, DeployError> {
        let events = self
            .node
            .get_filtered_sc_output_event(&EventFilter::for_operation(operation_id))
            .await?;
        Ok(events.into_iter().map(|event| event.data).collect())
    }

    async fn error_events(&self, operation_id: &str) -> Result<Vec<String>, DeployError> {
        let filter = EventFilter {
            is_error: Some(true),
            ..EventFilter::for_operation(operation_id)
        };
        let events = self.node.get_filtered_sc_output_event(&filter).await?;
        Ok(events
            .into_iter()
            .filter(|event| event.context.is_error)
            .map(|event| event.data)
            .collect())
    }
}

/// Smart contract addresses (`AS...`) mentioned in an event message
pub fn contract_addresses(message: &str) -> Vec<String> {
    message
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| token.starts_with("AS") && token.len() > 40)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Signature;
    use crate::operation::SignedOperation;
    use crate::rpc::{
        AddressInfo, DatastoreEntryInput, DatastoreEntryOutput, EventContext, NodeConfig,
        NodeStatus, RpcError, ScOutputEvent, Slot,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use wat::parse_str;

    const DEPLOYED: &str = "AS12BqZEQ6sByhRLyEuf0YbQmRQsm1y4bazUrxvckXz9MBCYqNyeG";

    struct FakeNode {
        balance: Amount,
        exec_status: Option<bool>,
        /// Polls answered before the operation turns final, `None` for never
        final_after: Option<usize>,
        polls: AtomicUsize,
        sent: Mutex<Vec<SignedOperation>>,
    }

    impl FakeNode {
        fn new(balance: Amount, exec_status: Option<bool>) -> Self {
            Self {
                balance,
                exec_status,
                final_after: Some(0),
                polls: AtomicUsize::new(0),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn final_after(mut self, polls: Option<usize>) -> Self {
            self.final_after = polls;
            self
        }

        fn polls(&self) -> usize {
            self.polls.load(Ordering::SeqCst)
        }

        fn event(data: &str, is_error: bool) -> ScOutputEvent {
            ScOutputEvent {
                context: EventContext {
                    slot: Slot { period: 101, thread: 0 },
                    is_final: true,
                    is_error,
                },
                data: data.to_string(),
            }
        }
    }

    #[async_trait]
    impl NodeApi for FakeNode {
        async fn get_status(&self) -> Result<NodeStatus, RpcError> {
            Ok(NodeStatus {
                version: "TEST.1.0".into(),
                last_slot: Some(Slot { period: 100, thread: 2 }),
                config: NodeConfig {
                    operation_validity_periods: 10,
                    thread_count: 32,
                },
                chain_id: Some(77658366),
            })
        }

        async fn get_addresses(&self, addresses: &[String]) -> Result<Vec<AddressInfo>, RpcError> {
            Ok(addresses
                .iter()
                .map(|address| AddressInfo {
                    address: address.clone(),
                    final_balance: self.balance,
                    candidate_balance: self.balance,
                    final_datastore_keys: Vec::new(),
                    candidate_datastore_keys: Vec::new(),
                })
                .collect())
        }

        async fn send_operations(&self, operations: &[SignedOperation]) -> Result<Vec<String>, RpcError> {
            self.sent.lock().unwrap().extend_from_slice(operations);
            Ok(vec!["O1deploy".to_string()])
        }

        async fn get_operations(&self, ids: &[String]) -> Result<Vec<OperationInfo>, RpcError> {
            let poll = self.polls.fetch_add(1, Ordering::SeqCst);
            let is_final = self.final_after.map_or(false, |after| poll >= after);
            Ok(ids
                .iter()
                .map(|id| OperationInfo {
                    id: id.clone(),
                    in_pool: false,
                    in_blocks: vec!["B1block".into()],
                    is_operation_final: Some(is_final),
                    op_exec_status: self.exec_status,
                })
                .collect())
        }

        async fn get_filtered_sc_output_event(
            &self,
            filter: &EventFilter,
        ) -> Result<Vec<ScOutputEvent>, RpcError> {
            assert_eq!(filter.original_operation_id.as_deref(), Some("O1deploy"));
            if filter.is_error == Some(true) {
                return Ok(vec![FakeNode::event("Constructor failed: bad owner", true)]);
            }
            Ok(vec![FakeNode::event(
                &format!("Contract deployed at address: {}", DEPLOYED),
                false,
            )])
        }

        async fn get_datastore_entries(
            &self,
            entries: &[DatastoreEntryInput],
        ) -> Result<Vec<DatastoreEntryOutput>, RpcError> {
            Ok(vec![DatastoreEntryOutput::default(); entries.len()])
        }
    }

    fn deployer_wasm() -> Vec<u8> {
        parse_str(r#"(module (func (export "main")))"#).expect("Failed to parse WAT")
    }

    fn contract_wasm() -> Vec<u8> {
        parse_str(
            r#"(module
                (func (export "constructor") (param i32))
                (func (export "increment") (param i32) (result i32) i32.const 1)
            )"#,
        )
        .expect("Failed to parse WAT")
    }

    fn options() -> DeployOptions {
        DeployOptions {
            fee: Amount::from_raw(10_000_000),
            max_gas: MAX_GAS_DEPLOYMENT,
            chain_id: None,
            wait: Some(WaitPolicy {
                poll_interval: Duration::from_millis(1),
                timeout: Duration::from_millis(50),
                until_final: true,
            }),
        }
    }

    #[tokio::test]
    async fn test_deploy_sends_single_execute_sc() {
        let keypair = KeyPair::from_bytes([5u8; 32]);
        let public_key = keypair.public_key();
        let deployer = Deployer::new(FakeNode::new(Amount::from_mas(10).unwrap(), Some(true)), keypair);

        let contracts = vec![
            ContractData::new(contract_wasm()).with_args(vec![1, 0, 0, 0]),
            ContractData::new(contract_wasm()).with_coins(Amount::from_mas(1).unwrap()),
        ];
        let outcome = deployer
            .deploy(&deployer_wasm(), &contracts, &options())
            .await
            .expect("Deployment failed");

        assert_eq!(outcome.operation_id, "O1deploy");
        assert_eq!(outcome.deployed_addresses, vec![DEPLOYED.to_string()]);
        assert!(outcome.is_final);

        let sent = deployer.node().sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let expected = Operation {
            fee: Amount::from_raw(10_000_000),
            expire_period: 110,
            op: OperationType::ExecuteSc {
                max_gas: MAX_GAS_DEPLOYMENT,
                max_coins: Amount::from_mas(1).unwrap(),
                data: deployer_wasm(),
                datastore: build_datastore(&contracts).unwrap(),
            },
        };
        assert_eq!(sent[0].serialized_content, expected.serialize());
        assert_eq!(sent[0].creator_public_key, public_key.to_string());
        let signature = Signature::from_str_repr(&sent[0].signature).unwrap();
        assert!(public_key.verify(77658366, &sent[0].serialized_content, &signature).is_ok());
    }

    #[tokio::test]
    async fn test_executed_operation_polled_until_final() {
        let node = FakeNode::new(Amount::from_mas(10).unwrap(), Some(true)).final_after(Some(3));
        let deployer = Deployer::new(node, KeyPair::from_bytes([5u8; 32]));
        let mut options = options();
        if let Some(wait) = options.wait.as_mut() {
            wait.timeout = Duration::from_secs(5);
        }

        let outcome = deployer
            .deploy(&deployer_wasm(), &[ContractData::new(contract_wasm())], &options)
            .await
            .unwrap();

        assert!(outcome.is_final);
        assert_eq!(deployer.node().polls(), 4);
    }

    #[tokio::test]
    async fn test_execution_is_enough_without_finality() {
        let node = FakeNode::new(Amount::from_mas(10).unwrap(), Some(true)).final_after(None);
        let deployer = Deployer::new(node, KeyPair::from_bytes([5u8; 32]));
        let mut options = options();
        if let Some(wait) = options.wait.as_mut() {
            wait.until_final = false;
        }

        let outcome = deployer
            .deploy(&deployer_wasm(), &[ContractData::new(contract_wasm())], &options)
            .await
            .unwrap();

        assert!(!outcome.is_final);
        assert_eq!(outcome.deployed_addresses, vec![DEPLOYED.to_string()]);
        assert_eq!(deployer.node().polls(), 1);
    }

    #[tokio::test]
    async fn test_never_final_times_out() {
        let node = FakeNode::new(Amount::from_mas(10).unwrap(), Some(true)).final_after(None);
        let deployer = Deployer::new(node, KeyPair::from_bytes([5u8; 32]));

        let err = deployer
            .deploy(&deployer_wasm(), &[ContractData::new(contract_wasm())], &options())
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::Timeout { .. }));
        assert!(deployer.node().polls() > 1);
    }

    #[tokio::test]
    async fn test_no_wait_returns_after_send() {
        let deployer = Deployer::new(
            FakeNode::new(Amount::from_mas(10).unwrap(), None),
            KeyPair::from_bytes([5u8; 32]),
        );
        let options = DeployOptions {
            wait: None,
            ..options()
        };

        let outcome = deployer
            .deploy(&deployer_wasm(), &[ContractData::new(contract_wasm())], &options)
            .await
            .unwrap();

        assert_eq!(outcome.operation_id, "O1deploy");
        assert!(outcome.events.is_empty());
        assert!(outcome.deployed_addresses.is_empty());
        assert!(!outcome.is_final);
        assert_eq!(deployer.node().polls(), 0);
        assert_eq!(deployer.node().sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_balance_sends_nothing() {
        let deployer = Deployer::new(
            FakeNode::new(Amount::from_raw(5), Some(true)),
            KeyPair::from_bytes([5u8; 32]),
        );

        let err = deployer
            .deploy(&deployer_wasm(), &[ContractData::new(contract_wasm())], &options())
            .await
            .unwrap_err();

        match err {
            DeployError::InsufficientBalance { balance, required, .. } => {
                assert_eq!(balance, Amount::from_raw(5));
                assert_eq!(required, Amount::from_raw(10_000_000));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(deployer.node().sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_execution_failure_reports_error_events() {
        let deployer = Deployer::new(
            FakeNode::new(Amount::from_mas(10).unwrap(), Some(false)),
            KeyPair::from_bytes([5u8; 32]),
        );

        let err = deployer
            .deploy(&deployer_wasm(), &[ContractData::new(contract_wasm())], &options())
            .await
            .unwrap_err();

        match err {
            DeployError::ExecutionFailed { operation_id, errors } => {
                assert_eq!(operation_id, "O1deploy");
                assert_eq!(errors, vec!["Constructor failed: bad owner".to_string()]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_pending_operation_times_out() {
        let deployer = Deployer::new(
            FakeNode::new(Amount::from_mas(10).unwrap(), None),
            KeyPair::from_bytes([5u8; 32]),
        );

        let err = deployer
            .deploy(&deployer_wasm(), &[ContractData::new(contract_wasm())], &options())
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::Timeout { .. }));
    }

    #[test]
    fn test_prepare_rejects_bad_bytecode() {
        let contract = ContractData::new(contract_wasm());
        assert!(matches!(
            prepare(&contract_wasm(), &[contract.clone()]),
            Err(DeployError::MissingMain)
        ));

        let err = prepare(&deployer_wasm(), &[contract, ContractData::new(vec![1, 2, 3])]).unwrap_err();
        match err {
            DeployError::Bytecode { what, .. } => assert_eq!(what, "contract 2"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_prepare_summary() {
        let contracts = vec![
            ContractData::new(contract_wasm()).with_args(vec![9; 4]),
            ContractData::new(contract_wasm()).with_coins(Amount::from_raw(7)),
        ];
        let prepared = prepare(&deployer_wasm(), &contracts).unwrap();

        assert_eq!(prepared.total_coins, Amount::from_raw(7));
        assert_eq!(prepared.contracts[0].args_len, Some(4));
        assert_eq!(prepared.contracts[1].args_len, None);
        assert!(prepared.contracts.iter().all(|c| c.has_constructor));
        assert_eq!(prepared.datastore.len(), 5);
    }

    #[test]
    fn test_contract_addresses_in_events() {
        assert_eq!(
            contract_addresses(&format!("deployed: {}, {}.", DEPLOYED, "AS1short")),
            vec![DEPLOYED.to_string()]
        );
        assert!(contract_addresses("no address here").is_empty());
    }
}
