//! ADP keystream generation.
//!
//! ADP is RC4 over a 13-byte working key: the 40-bit user key followed by
//! the first 8 bytes of the Message Indicator. Unlike WEP there is no
//! initial keystream discard; the offset discipline in [`crate::crypto`]
//! accounts for everything.

use crate::error::{DecoderError, Result};

/// Keystream window for one (key, MI) pair.
pub const KEYSTREAM_LEN: usize = 469;

pub const KEY_LEN: usize = 5;

const WORKING_KEY_LEN: usize = 13;

/// Left-pad a configured key with zeros to 5 bytes; longer keys are invalid.
pub fn normalize_key(key: &[u8], key_id: u16) -> Result<[u8; KEY_LEN]> {
    if key.len() > KEY_LEN {
        return Err(DecoderError::KeyInvalid {
            key_id,
            message: format!("ADP key must be at most {KEY_LEN} bytes, got {}", key.len()),
        });
    }
    let mut out = [0u8; KEY_LEN];
    out[KEY_LEN - key.len()..].copy_from_slice(key);
    Ok(out)
}

/// Generate the 469-byte ADP keystream: standard RC4 KSA then PRGA over the
/// working key, no discard.
pub fn keystream(key: &[u8; KEY_LEN], mi: &[u8; 9]) -> [u8; KEYSTREAM_LEN] {
    let mut working = [0u8; WORKING_KEY_LEN];
    working[..KEY_LEN].copy_from_slice(key);
    working[KEY_LEN..].copy_from_slice(&mi[..8]);

    // Key-scheduling algorithm.
    let mut s: [u8; 256] = core::array::from_fn(|i| i as u8);
    let mut j = 0u8;
    for i in 0..256 {
        j = j
            .wrapping_add(s[i])
            .wrapping_add(working[i % WORKING_KEY_LEN]);
        s.swap(i, j as usize);
    }

    // Pseudo-random generation algorithm.
    let mut out = [0u8; KEYSTREAM_LEN];
    let (mut i, mut j) = (0u8, 0u8);
    for byte in out.iter_mut() {
        i = i.wrapping_add(1);
        j = j.wrapping_add(s[i as usize]);
        s.swap(i as usize, j as usize);
        *byte = s[s[i as usize].wrapping_add(s[j as usize]) as usize];
    }
    out
}
