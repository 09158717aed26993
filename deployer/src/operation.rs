// Operation serialization
//
// Integers are varints, byte arrays and the datastore are length-prefixed.
// The signed payload is the serialized content; the node receives it as an
// array of bytes alongside the creator key and signature strings.

use common::{varint, Amount};
use serde::Serialize;

use crate::datastore::Datastore;
use crate::keys::KeyPair;

/// Gas limit used for deployments when none is configured
pub const MAX_GAS_DEPLOYMENT: u64 = 3_980_167_295;

/// Wire id of ExecuteSC operations
const EXECUTE_SC_TYPE_ID: u64 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationType {
    /// Execute bytecode, exposing `datastore` to it
    ExecuteSc {
        max_gas: u64,
        max_coins: Amount,
        data: Vec<u8>,
        datastore: Datastore,
    },
}

impl OperationType {
    pub fn type_id(&self) -> u64 {
        match self {
            OperationType::ExecuteSc { .. } => EXECUTE_SC_TYPE_ID,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub fee: Amount,
    /// Last period in which the operation can be included
    pub expire_period: u64,
    pub op: OperationType,
}

impl Operation {
    pub fn serialize(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        varint::write_u64(&mut buffer, self.fee.to_raw());
        varint::write_u64(&mut buffer, self.expire_period);
        varint::write_u64(&mut buffer, self.op.type_id());

        match &self.op {
            OperationType::ExecuteSc {
                max_gas,
                max_coins,
                data,
                datastore,
            } => {
                varint::write_u64(&mut buffer, *max_gas);
                varint::write_u64(&mut buffer, max_coins.to_raw());
                varint::write_bytes(&mut buffer, data);
                serialize_datastore(&mut buffer, datastore);
            }
        }

        buffer
    }

    /// Serialize and sign with `keypair`
    pub fn sign(&self, keypair: &KeyPair, chain_id: u64) -> SignedOperation {
        let serialized_content = self.serialize();
        let signature = keypair.sign(chain_id, &serialized_content);
        SignedOperation {
            serialized_content,
            creator_public_key: keypair.public_key().to_string(),
            signature: signature.to_string(),
        }
    }
}

fn serialize_datastore(buffer: &mut Vec<u8>, datastore: &Datastore) {
    varint::write_u64(buffer, datastore.len() as u64);
    for (key, value) in datastore {
        varint::write_bytes(buffer, key);
        varint::write_bytes(buffer, value);
    }
}

/// Operation as accepted by `send_operations`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedOperation {
    pub serialized_content: Vec<u8>,
    pub creator_public_key: String,
    pub signature: String,
}
