// Account keys
//
// Keys, addresses and signatures travel as base58check strings whose payload
// starts with a varint version number (currently 0).

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use thiserror::Error;

const KEY_VERSION: u64 = 0;
const SECRET_KEY_PREFIX: char = 'S';
const PUBLIC_KEY_PREFIX: char = 'P';
const USER_ADDRESS_PREFIX: &str = "AU";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum KeyError {
    #[error("Expected a string starting with {0:?}")]
    BadPrefix(&'static str),
    #[error("Invalid base58check encoding: {0}")]
    Base58(String),
    #[error("Unsupported key version {0}")]
    UnsupportedVersion(u64),
    #[error("Invalid key length {0}")]
    BadLength(usize),
    #[error("Not a valid ed25519 public key")]
    InvalidPublicKey,
    #[error("Signature does not match")]
    BadSignature,
}

/// Ed25519 signing key with its derived public key and address
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    pub fn from_bytes(secret: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&secret),
        }
    }

    /// Parse an `S...` secret key string
    pub fn from_secret_str(secret: &str) -> Result<Self, KeyError> {
        let payload = secret
            .trim()
            .strip_prefix(SECRET_KEY_PREFIX)
            .ok_or(KeyError::BadPrefix("S"))?;
        let bytes = decode_versioned(payload)?;
        let secret: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::BadLength(bytes.len()))?;
        Ok(Self::from_bytes(secret))
    }

    pub fn secret_str(&self) -> String {
        format!("{}{}", SECRET_KEY_PREFIX, encode_versioned(self.signing_key.as_bytes()))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key())
    }

    pub fn address(&self) -> String {
        self.public_key().address()
    }

    /// Sign `content` on behalf of this key for the given chain
    pub fn sign(&self, chain_id: u64, content: &[u8]) -> Signature {
        let digest = signing_digest(chain_id, &self.public_key(), content);
        Signature(self.signing_key.sign(digest.as_bytes()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Public key parsed from its `P...` string
    pub fn from_str_repr(public_key: &str) -> Result<Self, KeyError> {
        let payload = public_key
            .trim()
            .strip_prefix(PUBLIC_KEY_PREFIX)
            .ok_or(KeyError::BadPrefix("P"))?;
        let bytes = decode_versioned(payload)?;
        let key: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::BadLength(bytes.len()))?;
        VerifyingKey::from_bytes(&key)
            .map(PublicKey)
            .map_err(|_| KeyError::InvalidPublicKey)
    }

    /// Version prefix followed by the raw key, as hashed into addresses and signatures
    pub fn versioned_bytes(&self) -> Vec<u8> {
        let mut bytes = version_prefix();
        bytes.extend_from_slice(self.0.as_bytes());
        bytes
    }

    /// `AU...` address owning this key
    pub fn address(&self) -> String {
        let hash = blake3::hash(&self.versioned_bytes());
        format!("{}{}", USER_ADDRESS_PREFIX, encode_versioned(hash.as_bytes()))
    }

    pub fn verify(&self, chain_id: u64, content: &[u8], signature: &Signature) -> Result<(), KeyError> {
        let digest = signing_digest(chain_id, self, content);
        self.0
            .verify(digest.as_bytes(), &signature.0)
            .map_err(|_| KeyError::BadSignature)
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", PUBLIC_KEY_PREFIX, encode_versioned(self.0.as_bytes()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature(ed25519_dalek::Signature);

impl Signature {
    /// Signature parsed from its base58check string
    pub fn from_str_repr(signature: &str) -> Result<Self, KeyError> {
        let bytes = decode_versioned(signature.trim())?;
        let raw: [u8; 64] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::BadLength(bytes.len()))?;
        Ok(Signature(ed25519_dalek::Signature::from_bytes(&raw)))
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", encode_versioned(&self.0.to_bytes()))
    }
}

fn signing_digest(chain_id: u64, public_key: &PublicKey, content: &[u8]) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&chain_id.to_be_bytes());
    hasher.update(&public_key.versioned_bytes());
    hasher.update(content);
    hasher.finalize()
}

fn version_prefix() -> Vec<u8> {
    let mut prefix = Vec::new();
    common::varint::write_u64(&mut prefix, KEY_VERSION);
    prefix
}

fn encode_versioned(bytes: &[u8]) -> String {
    let mut payload = version_prefix();
    payload.extend_from_slice(bytes);
    bs58::encode(payload).with_check().into_string()
}

fn decode_versioned(encoded: &str) -> Result<Vec<u8>, KeyError> {
    let payload = bs58::decode(encoded)
        .with_check(None)
        .into_vec()
        .map_err(|e| KeyError::Base58(e.to_string()))?;
    let (version, rest) =
        common::varint::read_u64(&payload).map_err(|e| KeyError::Base58(e.to_string()))?;
    if version != KEY_VERSION {
        return Err(KeyError::UnsupportedVersion(version));
    }
    Ok(rest.to_vec())
}
