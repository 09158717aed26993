//! Typed caller generation for contract functions described in `.proto` files.
//!
//! Each `.proto` file describes one exported contract function: message
//! `<name>Helper` carries the arguments and the optional `<name>RHelper`
//! carries the return value in its `value` field.

use std::path::PathBuf;
use thiserror::Error;

pub mod descriptor;
pub mod emit;
pub mod function;

pub use descriptor::Protoc;
pub use emit::{CallerGenerator, GeneratedFile, Target};
pub use function::{functions_from_descriptors, ProtoField, ProtoFunction, ProtoType, Scalar};

#[derive(Error, Debug)]
pub enum ProtoError {
    #[error("protoc not found (looked for {0:?}); install it or pass its path")]
    ProtocNotFound(PathBuf),
    #[error("protoc exited with {status}: {stderr}")]
    Protoc { status: String, stderr: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid descriptor set: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("No function found: expected a message named <function>Helper in {0}")]
    NoFunction(String),
    #[error("Function {0} defined more than once")]
    DuplicateFunction(String),
    #[error("Invalid identifier {0:?}")]
    InvalidIdentifier(String),
    #[error("Field name {field:?} of {function} clashes with a generated parameter")]
    ReservedName { function: String, field: String },
    #[error("Field {field} of {message} uses an unsupported type ({kind})")]
    UnsupportedType {
        message: String,
        field: String,
        kind: String,
    },
    #[error("{0} must have exactly one field named `value`")]
    InvalidReturn(String),
    #[error("Unknown target {0:?}, expected `ts` or `as`")]
    UnknownTarget(String),
}
