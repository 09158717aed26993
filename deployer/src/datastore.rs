// Deployment datastore
//
// The deployer contract is executed with a datastore describing every
// contract it must create. Keys are built from the 1-based contract index:
//
//   [0x00]              -> number of contracts (u64 LE)
//   u64_le(i)           -> bytecode of contract i
//   u64_le(i) ++ [0x00] -> constructor arguments of contract i
//   u64_le(i) ++ [0x01] -> coins sent to contract i (u64 LE nanoMAS)

use std::collections::BTreeMap;

use common::Amount;
use thiserror::Error;

/// Key-value byte map attached to an ExecuteSC operation
pub type Datastore = BTreeMap<Vec<u8>, Vec<u8>>;

/// Single reserved byte holding the contract count
pub const MASTER_KEY: [u8; 1] = [0x00];
/// Field selector for constructor arguments
pub const ARGS_SELECTOR: u8 = 0x00;
/// Field selector for coin amounts
pub const COINS_SELECTOR: u8 = 0x01;

const INDEX_WIDTH: usize = 8;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DatastoreError {
    #[error("No contract to deploy")]
    Empty,
    #[error("Contract {0} has empty bytecode")]
    EmptyBytecode(u64),
    #[error("Total coins overflow")]
    CoinsOverflow,
    #[error("Master key missing")]
    MissingMasterKey,
    #[error("Malformed value under key {key:02x?}")]
    MalformedValue { key: Vec<u8> },
    #[error("Bytecode missing for contract {0}")]
    MissingBytecode(u64),
    #[error("Unexpected key {0:02x?}")]
    UnexpectedKey(Vec<u8>),
}

/// One contract to be created by the deployer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractData {
    /// WASM bytecode
    pub bytecode: Vec<u8>,
    /// Serialized constructor arguments, if the constructor takes any
    pub args: Option<Vec<u8>>,
    /// Coins transferred to the new contract
    pub coins: Amount,
}

impl ContractData {
    pub fn new(bytecode: Vec<u8>) -> Self {
        Self {
            bytecode,
            args: None,
            coins: Amount::ZERO,
        }
    }

    pub fn with_args(mut self, args: Vec<u8>) -> Self {
        self.args = Some(args);
        self
    }

    pub fn with_coins(mut self, coins: Amount) -> Self {
        self.coins = coins;
        self
    }
}

pub fn master_key() -> Vec<u8> {
    MASTER_KEY.to_vec()
}

pub fn bytecode_key(index: u64) -> Vec<u8> {
    index.to_le_bytes().to_vec()
}

pub fn args_key(index: u64) -> Vec<u8> {
    field_key(index, ARGS_SELECTOR)
}

pub fn coins_key(index: u64) -> Vec<u8> {
    field_key(index, COINS_SELECTOR)
}

fn field_key(index: u64, selector: u8) -> Vec<u8> {
    let mut key = bytecode_key(index);
    key.push(selector);
    key
}

/// Sum of the coins sent to every contract
pub fn total_coins(contracts: &[ContractData]) -> Result<Amount, DatastoreError> {
    contracts.iter().try_fold(Amount::ZERO, |total, contract| {
        total
            .checked_add(contract.coins)
            .ok_or(DatastoreError::CoinsOverflow)
    })
}

/// Pack contracts into the datastore read by the deployer contract
pub fn build_datastore(contracts: &[ContractData]) -> Result<Datastore, DatastoreError> {
    if contracts.is_empty() {
        return Err(DatastoreError::Empty);
    }

    let mut datastore = Datastore::new();
    datastore.insert(master_key(), (contracts.len() as u64).to_le_bytes().to_vec());

    for (index, contract) in (1u64..).zip(contracts) {
        if contract.bytecode.is_empty() {
            return Err(DatastoreError::EmptyBytecode(index));
        }
        datastore.insert(bytecode_key(index), contract.bytecode.clone());

        if let Some(args) = &contract.args {
            datastore.insert(args_key(index), args.clone());
        }
        if !contract.coins.is_zero() {
            datastore.insert(coins_key(index), contract.coins.to_raw().to_le_bytes().to_vec());
        }
    }

    Ok(datastore)
}

/// Contracts read back from a datastore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentPlan {
    pub contracts: Vec<ContractData>,
}

impl DeploymentPlan {
    /// Decode a datastore, checking it holds exactly what the master key announces
    pub fn from_datastore(datastore: &Datastore) -> Result<Self, DatastoreError> {
        let count = datastore
            .get(MASTER_KEY.as_slice())
            .ok_or(DatastoreError::MissingMasterKey)
            .and_then(|value| read_u64(&MASTER_KEY, value))?;
        if count == 0 {
            return Err(DatastoreError::Empty);
        }

        let mut contracts = Vec::new();
        let mut expected_keys = 1;
        for index in 1..=count {
            let bytecode = datastore
                .get(&bytecode_key(index))
                .ok_or(DatastoreError::MissingBytecode(index))?;
            let mut contract = ContractData::new(bytecode.clone());
            expected_keys += 1;

            let key = args_key(index);
            if let Some(args) = datastore.get(&key) {
                contract.args = Some(args.clone());
                expected_keys += 1;
            }
            let key = coins_key(index);
            if let Some(coins) = datastore.get(&key) {
                contract.coins = Amount::from_raw(read_u64(&key, coins)?);
                expected_keys += 1;
            }
            contracts.push(contract);
        }

        if datastore.len() != expected_keys {
            // Report the first key not produced by the indices above
            let stray = datastore
                .keys()
                .find(|key| !is_known_key(key, count))
                .cloned()
                .unwrap_or_default();
            return Err(DatastoreError::UnexpectedKey(stray));
        }

        Ok(Self { contracts })
    }

    pub fn total_coins(&self) -> Result<Amount, DatastoreError> {
        total_coins(&self.contracts)
    }
}

fn read_u64(key: &[u8], value: &[u8]) -> Result<u64, DatastoreError> {
    let bytes: [u8; 8] = value.try_into().map_err(|_| DatastoreError::MalformedValue {
        key: key.to_vec(),
    })?;
    Ok(u64::from_le_bytes(bytes))
}

fn is_known_key(key: &[u8], count: u64) -> bool {
    if key == MASTER_KEY {
        return true;
    }
    if key.len() < INDEX_WIDTH {
        return false;
    }
    let mut index = [0u8; INDEX_WIDTH];
    index.copy_from_slice(&key[..INDEX_WIDTH]);
    let index = u64::from_le_bytes(index);
    let in_range = (1..=count).contains(&index);
    match &key[INDEX_WIDTH..] {
        [] => in_range,
        [ARGS_SELECTOR] | [COINS_SELECTOR] => in_range,
        _ => false,
    }
}
