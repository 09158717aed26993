//! Encodings shared by the toolkit crates: coin amounts, call arguments,
//! varints and WASM bytecode inspection.

use thiserror::Error;

pub mod amount;
pub mod args;
pub mod varint;
pub mod wasm;

pub use amount::Amount;
pub use args::{ArgValue, Args};
pub use wasm::{inspect_wasm, WasmSummary};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid amount {input:?}: {reason}")]
    InvalidAmount { input: String, reason: &'static str },
    #[error("Amount overflow")]
    AmountOverflow,
    #[error("Truncated varint")]
    TruncatedVarint,
    #[error("Varint does not fit in 64 bits")]
    VarintOverflow,
    #[error("Varint is not minimally encoded")]
    NonMinimalVarint,
    #[error("Invalid argument value {value:?} for type {kind}")]
    InvalidArgument { kind: &'static str, value: String },
    #[error("Argument too long: {0} bytes")]
    ArgumentTooLong(usize),
}

#[derive(Error, Debug)]
pub enum WasmError {
    #[error("Not a WASM module (bad magic number)")]
    BadMagic,
    #[error("Invalid WASM module: {0}")]
    Invalid(#[from] wasmparser::BinaryReaderError),
}
