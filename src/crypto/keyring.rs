//! In-memory key storage.
//!
//! Keys are loaded from the config file or `--key` arguments before the
//! service starts and are read-only afterwards, so lookups take no lock.
//! The algorithm for a key is inferred from its length: 32 bytes AES-256,
//! 6-8 bytes DES, up to 5 bytes ADP.

use crate::crypto::Algorithm;
use crate::error::{DecoderError, Result};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct Keyring {
    keys: HashMap<(Algorithm, u16), Vec<u8>>,
}

impl Keyring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a key, inferring its algorithm from the key length.
    pub fn add_key(&mut self, key_id: u16, key: &[u8]) -> Result<Algorithm> {
        let algorithm =
            Algorithm::from_key_len(key.len()).ok_or_else(|| DecoderError::KeyInvalid {
                key_id,
                message: format!(
                    "no algorithm takes a {}-byte key (5=ADP, 8=DES, 32=AES-256)",
                    key.len()
                ),
            })?;
        self.keys.insert((algorithm, key_id), key.to_vec());
        Ok(algorithm)
    }

    /// Look up the key for an (algorithm, key id) pair.
    pub fn lookup(&self, algorithm: Algorithm, key_id: u16) -> Option<&[u8]> {
        self.keys.get(&(algorithm, key_id)).map(|k| k.as_slice())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Parse a `KEYID:KEY` argument, both halves hex.
pub fn parse_key_spec(spec: &str) -> Result<(u16, Vec<u8>)> {
    let (id_str, key_str) = spec.split_once(':').ok_or_else(|| {
        DecoderError::ConfigInvalidValue {
            key: "key".to_string(),
            message: format!("expected KEYID:KEY in hex, got '{spec}'"),
        }
    })?;

    let id_str = id_str.trim().trim_start_matches("0x").trim_start_matches("0X");
    let key_id = u16::from_str_radix(id_str, 16).map_err(|_| DecoderError::ConfigInvalidValue {
        key: "key".to_string(),
        message: format!("invalid key id '{id_str}'"),
    })?;

    let key = parse_hex(key_str.trim()).ok_or_else(|| DecoderError::ConfigInvalidValue {
        key: "key".to_string(),
        message: format!("key must be an even number of hex digits, got '{key_str}'"),
    })?;

    Ok((key_id, key))
}

fn parse_hex(s: &str) -> Option<Vec<u8>> {
    if s.is_empty() || s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}
