//! DES-OFB keystream generation.
//!
//! The block cipher itself comes from the RustCrypto `des` crate; only the
//! P25 specifics live here: the MI-derived IV and the 28-block output
//! feedback chain.

use crate::error::{DecoderError, Result};
use des::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use des::Des;

/// 28 blocks of 8 bytes.
pub const KEYSTREAM_LEN: usize = 224;

pub const KEY_LEN: usize = 8;

/// Left-pad a configured key with zeros to 8 bytes; longer keys are invalid.
pub fn normalize_key(key: &[u8], key_id: u16) -> Result<[u8; KEY_LEN]> {
    if key.len() > KEY_LEN {
        return Err(DecoderError::KeyInvalid {
            key_id,
            message: format!("DES key must be at most {KEY_LEN} bytes, got {}", key.len()),
        });
    }
    let mut out = [0u8; KEY_LEN];
    out[KEY_LEN - key.len()..].copy_from_slice(key);
    Ok(out)
}

/// Generate the 224-byte DES-OFB keystream for one (key, MI) pair.
///
/// The first 8 bytes of the MI seed the IV; each DES encryption yields one
/// keystream block and the IV for the next.
pub fn keystream(key: &[u8; KEY_LEN], mi: &[u8; 9]) -> [u8; KEYSTREAM_LEN] {
    let cipher = Des::new(GenericArray::from_slice(key));
    let mut block = GenericArray::clone_from_slice(&mi[..8]);

    let mut out = [0u8; KEYSTREAM_LEN];
    for chunk in out.chunks_exact_mut(8) {
        cipher.encrypt_block(&mut block);
        chunk.copy_from_slice(&block);
    }
    out
}
