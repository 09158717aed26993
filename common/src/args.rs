// Call argument serialization
//
// Contracts receive their constructor and function arguments as a flat byte
// buffer. Fixed-width values are little-endian; strings and byte arrays carry
// a u32 length prefix.

use serde::{Deserialize, Serialize};

use crate::CodecError;

/// Builder for serialized call arguments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    buffer: Vec<u8>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bool(mut self, value: bool) -> Self {
        self.buffer.push(value as u8);
        self
    }

    pub fn add_u8(mut self, value: u8) -> Self {
        self.buffer.push(value);
        self
    }

    pub fn add_u32(mut self, value: u32) -> Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn add_i32(mut self, value: i32) -> Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn add_u64(mut self, value: u64) -> Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn add_i64(mut self, value: i64) -> Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn add_u128(mut self, value: u128) -> Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn add_f32(mut self, value: f32) -> Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn add_f64(mut self, value: f64) -> Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Add a UTF-8 string with its byte length prefix
    pub fn add_string(self, value: &str) -> Result<Self, CodecError> {
        self.add_bytes(value.as_bytes())
    }

    /// Add a byte array with its length prefix
    pub fn add_bytes(mut self, value: &[u8]) -> Result<Self, CodecError> {
        let len = u32::try_from(value.len()).map_err(|_| CodecError::ArgumentTooLong(value.len()))?;
        self.buffer.extend_from_slice(&len.to_le_bytes());
        self.buffer.extend_from_slice(value);
        Ok(self)
    }

    /// Add a value described in configuration
    pub fn add_value(self, value: &ArgValue) -> Result<Self, CodecError> {
        match value {
            ArgValue::Bool(v) => Ok(self.add_bool(*v)),
            ArgValue::U8(v) => Ok(self.add_u8(*v)),
            ArgValue::U32(v) => Ok(self.add_u32(*v)),
            ArgValue::I32(v) => Ok(self.add_i32(*v)),
            ArgValue::U64(v) => Ok(self.add_u64(parse_number("u64", v)?)),
            ArgValue::I64(v) => Ok(self.add_i64(parse_number("i64", v)?)),
            ArgValue::U128(v) => Ok(self.add_u128(parse_number("u128", v)?)),
            ArgValue::F32(v) => Ok(self.add_f32(*v)),
            ArgValue::F64(v) => Ok(self.add_f64(*v)),
            ArgValue::String(v) => self.add_string(v),
            ArgValue::Bytes(v) => {
                let raw = hex::decode(v.trim_start_matches("0x")).map_err(|_| {
                    CodecError::InvalidArgument {
                        kind: "bytes",
                        value: v.clone(),
                    }
                })?;
                self.add_bytes(&raw)
            }
        }
    }

    /// Serialize a whole list of configured values
    pub fn from_values(values: &[ArgValue]) -> Result<Self, CodecError> {
        values.iter().try_fold(Args::new(), |args, value| args.add_value(value))
    }

    pub fn serialize(self) -> Vec<u8> {
        self.buffer
    }
}

/// Wide integers are written as strings so JSON number precision is not an issue
fn parse_number<T: std::str::FromStr>(kind: &'static str, value: &str) -> Result<T, CodecError> {
    value.trim().parse().map_err(|_| CodecError::InvalidArgument {
        kind,
        value: value.to_string(),
    })
}

/// A typed argument as written in a deploy configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ArgValue {
    Bool(bool),
    U8(u8),
    U32(u32),
    I32(i32),
    U64(String),
    I64(String),
    U128(String),
    F32(f32),
    F64(f64),
    String(String),
    /// Hex encoded, with or without `0x`
    Bytes(String),
}
