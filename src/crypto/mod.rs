//! P25 voice decryption: keystream generation and the per-codeword offset
//! discipline shared by DES-OFB, AES-256-OFB and ADP.
//!
//! All three ciphers run as stream ciphers: key and Message Indicator
//! determine a fixed-size keystream buffer which is XORed over the first 11
//! bytes of each IMBE codeword. The slice of keystream used for a codeword
//! depends on the codeword position within the LDU and on whether the LDU is
//! an LDU2; the constants are transcribed from the OP25 lineage and live in
//! one place so interop corrections stay local.

pub mod adp;
pub mod aes_ofb;
pub mod des_ofb;
pub mod keyring;

pub use keyring::Keyring;

use crate::error::Result;

/// Supported traffic encryption algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// DES in output feedback mode (ALGID 0x81).
    DesOfb,
    /// AES-256 in output feedback mode (ALGID 0x84).
    Aes256Ofb,
    /// "Advanced Digital Privacy", RC4 based (ALGID 0xAA).
    AdpRc4,
}

impl Algorithm {
    /// Map a transmitted Algorithm ID to a supported algorithm.
    pub fn from_algid(algid: u8) -> Option<Self> {
        match algid {
            0x81 => Some(Algorithm::DesOfb),
            0x84 => Some(Algorithm::Aes256Ofb),
            0xAA => Some(Algorithm::AdpRc4),
            _ => None,
        }
    }

    /// Infer the algorithm for a configured key from its length.
    pub fn from_key_len(len: usize) -> Option<Self> {
        match len {
            32 => Some(Algorithm::Aes256Ofb),
            6..=8 => Some(Algorithm::DesOfb),
            1..=5 => Some(Algorithm::AdpRc4),
            _ => None,
        }
    }

    pub fn algid(&self) -> u8 {
        match self {
            Algorithm::DesOfb => 0x81,
            Algorithm::Aes256Ofb => 0x84,
            Algorithm::AdpRc4 => 0xAA,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::DesOfb => "DES-OFB",
            Algorithm::Aes256Ofb => "AES-256-OFB",
            Algorithm::AdpRc4 => "ADP/RC4",
        }
    }

    /// Keystream buffer length in bytes.
    pub fn keystream_len(&self) -> usize {
        match self {
            Algorithm::DesOfb => des_ofb::KEYSTREAM_LEN,
            Algorithm::Aes256Ofb => aes_ofb::KEYSTREAM_LEN,
            Algorithm::AdpRc4 => adp::KEYSTREAM_LEN,
        }
    }

    /// Bytes of keystream skipped before the first voice codeword.
    fn base_discard(&self) -> usize {
        match self {
            Algorithm::DesOfb => 8,
            Algorithm::Aes256Ofb => 16,
            Algorithm::AdpRc4 => 0,
        }
    }

    /// Per-codeword shift within an LDU.
    fn intra_shift(&self) -> usize {
        match self {
            Algorithm::DesOfb => 11,
            Algorithm::Aes256Ofb => 16,
            Algorithm::AdpRc4 => 267,
        }
    }
}

/// Additional offset applied to every codeword of an LDU2.
const LDU2_SHIFT: usize = 101;

/// Bytes of each codeword covered by the keystream.
const CODEWORD_CRYPT_BYTES: usize = 11;

/// A materialized keystream for one (key, MI) pair.
///
/// Created by [`Keystream::prepare`], which resets the codeword position;
/// every LDU2 observation re-prepares with the fresh MI.
#[derive(Debug, Clone)]
pub struct Keystream {
    algorithm: Algorithm,
    bytes: Vec<u8>,
    position: usize,
}

impl Keystream {
    /// Generate the keystream for `key` under `mi`.
    ///
    /// Key length rules are per algorithm: DES and ADP keys shorter than 8
    /// and 5 bytes are left-padded with zeros, longer keys are rejected;
    /// AES-256 keys must be exactly 32 bytes.
    pub fn prepare(algorithm: Algorithm, key_id: u16, key: &[u8], mi: &[u8; 9]) -> Result<Self> {
        let bytes = match algorithm {
            Algorithm::DesOfb => {
                des_ofb::keystream(&des_ofb::normalize_key(key, key_id)?, mi).to_vec()
            }
            Algorithm::Aes256Ofb => {
                aes_ofb::keystream(&aes_ofb::normalize_key(key, key_id)?, mi).to_vec()
            }
            Algorithm::AdpRc4 => adp::keystream(&adp::normalize_key(key, key_id)?, mi).to_vec(),
        };

        Ok(Self {
            algorithm,
            bytes,
            position: 0,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Current codeword position, always in [0, 9).
    pub fn position(&self) -> usize {
        self.position
    }

    /// The raw keystream buffer.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Keystream offset for the codeword at `position`.
    fn offset(&self, position: usize, is_ldu2: bool) -> usize {
        self.algorithm.base_discard()
            + if is_ldu2 { LDU2_SHIFT } else { 0 }
            + position * CODEWORD_CRYPT_BYTES
            + self.algorithm.intra_shift()
            + if position < 8 { 0 } else { 2 }
    }

    /// XOR the codeword in place with the keystream slice at the current
    /// offset, then advance the codeword position.
    ///
    /// Only the first 11 bytes are touched, and only where the offset stays
    /// inside the keystream buffer.
    pub fn decrypt_codeword(&mut self, codeword: &mut [u8], is_ldu2: bool) {
        let offset = self.offset(self.position, is_ldu2);
        self.position = (self.position + 1) % 9;

        for j in 0..CODEWORD_CRYPT_BYTES.min(codeword.len()) {
            if offset + j < self.bytes.len() {
                codeword[j] ^= self.bytes[offset + j];
            }
        }
    }
}
