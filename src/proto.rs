// Caller generation from local or on-chain `.proto` files

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use deployer::rpc::DatastoreEntryInput;
use deployer::{NodeApi, RpcError};
use log::{debug, info, warn};
use protogen::function::validate_identifier;
use protogen::{functions_from_descriptors, CallerGenerator, ProtoError, Protoc};
use thiserror::Error;

/// Datastore key prefix under which contracts publish their `.proto` files
pub const PROTO_FILE_KEY_PREFIX: &[u8] = b"protoMassa";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("Address {0} not found")]
    AddressNotFound(String),
    #[error("No .proto files stored at {0}")]
    NoProtoFiles(String),
    #[error("Datastore key {0:?} is not a valid function name")]
    InvalidKey(String),
    #[error("Node returned {returned} datastore entries for {requested} keys")]
    EntryCountMismatch { requested: usize, returned: usize },
    #[error("Value of {0} is not UTF-8")]
    NotUtf8(String),
    #[error(transparent)]
    Proto(#[from] ProtoError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Download every `.proto` file stored by the contract at `address` into
/// `out_dir` as `<function>.proto`
pub async fn fetch_proto_files<N: NodeApi>(
    node: &N,
    address: &str,
    out_dir: &Path,
) -> Result<Vec<PathBuf>, FetchError> {
    let info = node
        .get_addresses(&[address.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::AddressNotFound(address.to_string()))?;

    let keys: BTreeSet<Vec<u8>> = info
        .final_datastore_keys
        .into_iter()
        .chain(info.candidate_datastore_keys)
        .filter(|key| key.starts_with(PROTO_FILE_KEY_PREFIX))
        .collect();
    if keys.is_empty() {
        return Err(FetchError::NoProtoFiles(address.to_string()));
    }

    let mut functions = Vec::with_capacity(keys.len());
    let mut requests = Vec::with_capacity(keys.len());
    for key in keys {
        let name = String::from_utf8_lossy(&key[PROTO_FILE_KEY_PREFIX.len()..]).into_owned();
        validate_identifier(&name).map_err(|_| FetchError::InvalidKey(name.clone()))?;
        functions.push(name);
        requests.push(DatastoreEntryInput {
            address: address.to_string(),
            key,
        });
    }

    let entries = node.get_datastore_entries(&requests).await?;
    if entries.len() != requests.len() {
        return Err(FetchError::EntryCountMismatch {
            requested: requests.len(),
            returned: entries.len(),
        });
    }
    fs::create_dir_all(out_dir)?;

    let mut written = Vec::with_capacity(functions.len());
    for (name, entry) in functions.into_iter().zip(entries) {
        let value = match entry.final_value.or(entry.candidate_value) {
            Some(value) => value,
            None => {
                warn!("Datastore entry for {} disappeared, skipping", name);
                continue;
            }
        };
        let contents = String::from_utf8(value).map_err(|_| FetchError::NotUtf8(name.clone()))?;

        let path = out_dir.join(format!("{}.proto", name));
        fs::write(&path, contents)?;
        debug!("Fetched {}", path.display());
        written.push(path);
    }

    info!("Fetched {} .proto files from {}", written.len(), address);
    Ok(written)
}

/// Where the message codecs come from
#[derive(Debug, Clone)]
pub struct HelperPlugin {
    /// Path to the protoc plugin for the generator's target
    pub plugin: PathBuf,
}

/// Compile `files`, write one caller per function and, given a plugin, the
/// message codecs the callers import
pub fn generate_callers(
    protoc: &Protoc,
    files: &[PathBuf],
    generator: &CallerGenerator,
    out_dir: &Path,
    helpers: Option<&HelperPlugin>,
) -> Result<Vec<PathBuf>, ProtoError> {
    let set = protoc.descriptor_set(files)?;
    let functions = functions_from_descriptors(&set)?;
    let written = generator.write_all(&functions, out_dir)?;

    match helpers {
        Some(helpers) => protoc.generate_helpers(generator.target(), &helpers.plugin, files, out_dir)?,
        None => info!(
            "Skipped message helpers; generate them with {} into {}",
            generator.target().protoc_plugin().0,
            out_dir.display()
        ),
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::Amount;
    use deployer::operation::SignedOperation;
    use deployer::rpc::{
        AddressInfo, DatastoreEntryOutput, EventFilter, NodeConfig, NodeStatus, OperationInfo, ScOutputEvent,
    };
    use std::collections::BTreeMap;

    const CONTRACT: &str = "AS12contract";

    struct ProtoNode {
        datastore: BTreeMap<Vec<u8>, Vec<u8>>,
        max_entries: usize,
    }

    impl ProtoNode {
        fn with_files(files: &[(&str, &[u8])]) -> Self {
            let mut datastore = BTreeMap::new();
            datastore.insert(b"owner".to_vec(), b"AU1owner".to_vec());
            for (name, contents) in files {
                let mut key = PROTO_FILE_KEY_PREFIX.to_vec();
                key.extend_from_slice(name.as_bytes());
                datastore.insert(key, contents.to_vec());
            }
            Self {
                datastore,
                max_entries: usize::MAX,
            }
        }

        fn max_entries(mut self, max_entries: usize) -> Self {
            self.max_entries = max_entries;
            self
        }
    }

    #[async_trait]
    impl NodeApi for ProtoNode {
        async fn get_status(&self) -> Result<NodeStatus, RpcError> {
            Ok(NodeStatus {
                version: "TEST.1.0".into(),
                last_slot: None,
                config: NodeConfig {
                    operation_validity_periods: 10,
                    thread_count: 32,
                },
                chain_id: None,
            })
        }

        async fn get_addresses(&self, addresses: &[String]) -> Result<Vec<AddressInfo>, RpcError> {
            Ok(addresses
                .iter()
                .filter(|address| address.as_str() == CONTRACT)
                .map(|address| AddressInfo {
                    address: address.clone(),
                    final_balance: Amount::ZERO,
                    candidate_balance: Amount::ZERO,
                    final_datastore_keys: self.datastore.keys().cloned().collect(),
                    candidate_datastore_keys: self.datastore.keys().cloned().collect(),
                })
                .collect())
        }

        async fn send_operations(&self, _operations: &[SignedOperation]) -> Result<Vec<String>, RpcError> {
            Ok(Vec::new())
        }

        async fn get_operations(&self, _ids: &[String]) -> Result<Vec<OperationInfo>, RpcError> {
            Ok(Vec::new())
        }

        async fn get_filtered_sc_output_event(
            &self,
            _filter: &EventFilter,
        ) -> Result<Vec<ScOutputEvent>, RpcError> {
            Ok(Vec::new())
        }

        async fn get_datastore_entries(
            &self,
            entries: &[DatastoreEntryInput],
        ) -> Result<Vec<DatastoreEntryOutput>, RpcError> {
            Ok(entries
                .iter()
                .take(self.max_entries)
                .map(|entry| DatastoreEntryOutput {
                    final_value: self.datastore.get(&entry.key).cloned(),
                    candidate_value: None,
                })
                .collect())
        }
    }

    const SAY_HELLO: &[u8] = b"syntax = \"proto3\";\nmessage sayHelloHelper { string name = 1; }\n";
    const GET_COUNT: &[u8] = b"syntax = \"proto3\";\nmessage getCountHelper {}\n";

    #[tokio::test]
    async fn test_fetch_proto_files() {
        let node = ProtoNode::with_files(&[("sayHello", SAY_HELLO), ("getCount", GET_COUNT)]);
        let dir = tempfile::tempdir().unwrap();

        let written = fetch_proto_files(&node, CONTRACT, dir.path()).await.unwrap();

        let names: Vec<_> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["getCount.proto", "sayHello.proto"]);
        assert_eq!(fs::read(dir.path().join("sayHello.proto")).unwrap(), SAY_HELLO);
    }

    #[tokio::test]
    async fn test_fetch_errors() {
        let dir = tempfile::tempdir().unwrap();

        let bare = ProtoNode::with_files(&[]);
        assert!(matches!(
            fetch_proto_files(&bare, CONTRACT, dir.path()).await,
            Err(FetchError::NoProtoFiles(_))
        ));
        assert!(matches!(
            fetch_proto_files(&bare, "AS1unknown", dir.path()).await,
            Err(FetchError::AddressNotFound(_))
        ));

        let hostile = ProtoNode::with_files(&[("../../etc/passwd", SAY_HELLO)]);
        assert!(matches!(
            fetch_proto_files(&hostile, CONTRACT, dir.path()).await,
            Err(FetchError::InvalidKey(_))
        ));

        let binary = ProtoNode::with_files(&[("blob", &[0xff, 0xfe])]);
        assert!(matches!(
            fetch_proto_files(&binary, CONTRACT, dir.path()).await,
            Err(FetchError::NotUtf8(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_short_entry_list() {
        let node = ProtoNode::with_files(&[("sayHello", SAY_HELLO), ("getCount", GET_COUNT)]).max_entries(1);
        let dir = tempfile::tempdir().unwrap();

        let err = fetch_proto_files(&node, CONTRACT, dir.path()).await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::EntryCountMismatch {
                requested: 2,
                returned: 1
            }
        ));
        assert!(!dir.path().join("getCount.proto").exists());
    }

    #[test]
    fn test_generate_without_protoc() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("sayHello.proto");
        fs::write(&file, SAY_HELLO).unwrap();

        let err = generate_callers(
            &Protoc::new("definitely-not-protoc"),
            &[file],
            &CallerGenerator::new(protogen::Target::TypeScript),
            &dir.path().join("out"),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ProtoError::ProtocNotFound(_)));
    }
}
