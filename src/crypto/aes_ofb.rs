//! AES-256-OFB keystream generation.

use crate::error::{DecoderError, Result};
use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes256;

/// 15 blocks of 16 bytes.
pub const KEYSTREAM_LEN: usize = 240;

pub const KEY_LEN: usize = 32;

/// AES-256 keys must be exactly 32 bytes; nothing is padded.
pub fn normalize_key(key: &[u8], key_id: u16) -> Result<[u8; KEY_LEN]> {
    if key.len() != KEY_LEN {
        return Err(DecoderError::KeyInvalid {
            key_id,
            message: format!("AES-256 key must be exactly {KEY_LEN} bytes, got {}", key.len()),
        });
    }
    let mut out = [0u8; KEY_LEN];
    out.copy_from_slice(key);
    Ok(out)
}

/// Generate the 240-byte AES-256-OFB keystream for one (key, MI) pair.
///
/// The 9-byte MI is right-padded with zeros to the 16-byte IV; each AES
/// encryption yields one keystream block and the IV for the next.
pub fn keystream(key: &[u8; KEY_LEN], mi: &[u8; 9]) -> [u8; KEYSTREAM_LEN] {
    let cipher = Aes256::new(GenericArray::from_slice(key));

    let mut iv = [0u8; 16];
    iv[..9].copy_from_slice(mi);
    let mut block = GenericArray::clone_from_slice(&iv);

    let mut out = [0u8; KEYSTREAM_LEN];
    for chunk in out.chunks_exact_mut(16) {
        cipher.encrypt_block(&mut block);
        chunk.copy_from_slice(&block);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_rejects_wrong_lengths() {
        assert!(normalize_key(&[0; 16], 1).is_err());
        assert!(normalize_key(&[0; 31], 1).is_err());
        assert!(normalize_key(&[0; 33], 1).is_err());
        assert!(normalize_key(&[0; 32], 1).is_ok());
    }

    #[test]
    fn ofb_chains_blocks() {
        let key: [u8; 32] = core::array::from_fn(|i| i as u8);
        let mi = [9u8, 8, 7, 6, 5, 4, 3, 2, 1];
        let ks = keystream(&key, &mi);

        let cipher = Aes256::new(GenericArray::from_slice(&key));
        let mut block = GenericArray::clone_from_slice(&ks[..16]);
        cipher.encrypt_block(&mut block);
        assert_eq!(&ks[16..32], block.as_slice());
    }

    #[test]
    fn mi_seeds_the_iv() {
        let key = [0u8; 32];
        let a = keystream(&key, &[1, 0, 0, 0, 0, 0, 0, 0, 0]);
        let b = keystream(&key, &[2, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_ne!(a[..16], b[..16]);
    }
}
