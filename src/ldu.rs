//! LDU2 encryption-sync extraction.
//!
//! A voice LDU payload is 216 bytes (1728 bits) laid out as nine interleaved
//! IMBE codewords with 240 link-signaling bits threaded between them. Status
//! dibits occupy positions congruent to 70 and 71 mod 72 and carry nothing of
//! interest here. On LDU2 the link-signaling field is the Encryption Sync:
//! 24 Hamming(10,6)-protected hexbits holding the 72-bit Message Indicator,
//! the Algorithm ID and the Key ID, followed by Reed-Solomon parity hexbits
//! that this extractor does not consume.

use crate::defaults::{ALGID_CLEAR, LDU_PAYLOAD_BYTES};
use crate::error::{DecoderError, Result};
use crate::fec::{self, Correction};

/// Nominal spans of the link-signaling bits within the 1728-bit unit.
/// Status dibits inside a span are skipped during collection.
const LS_SPANS: [(usize, usize); 6] = [
    (410, 451),
    (600, 639),
    (788, 829),
    (978, 1019),
    (1168, 1207),
    (1356, 1397),
];

/// True for the status dibit positions of a 1728-bit unit.
pub fn is_status_bit(pos: usize) -> bool {
    pos % 72 >= 70
}

/// The 240 link-signaling bit positions, in transmission order.
pub fn ls_data_positions() -> Vec<usize> {
    let mut positions = Vec::with_capacity(240);
    for (start, end) in LS_SPANS {
        positions.extend((start..=end).filter(|p| !is_status_bit(*p)));
    }
    positions
}

/// Encryption Sync fields recovered from an LDU2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptionSync {
    /// 72-bit Message Indicator.
    pub mi: [u8; 9],
    /// Algorithm ID; 0x80 means unencrypted.
    pub algorithm_id: u8,
    /// Key ID selecting the key within the keyring.
    pub key_id: u16,
}

impl EncryptionSync {
    pub fn is_clear(&self) -> bool {
        self.algorithm_id == ALGID_CLEAR
    }
}

/// Recover the Encryption Sync from an LDU2 payload.
///
/// Hamming(10,6) single-bit errors are corrected silently. If any of the 16
/// data hexbits comes back uncorrectable the whole field is considered
/// unreliable and `EsCorrupted` is returned; the caller silences the rest of
/// the call rather than arming a cipher with a garbled MI.
pub fn extract_encryption_sync(payload: &[u8]) -> Result<EncryptionSync> {
    if payload.len() < LDU_PAYLOAD_BYTES {
        return Err(DecoderError::EsCorrupted { uncorrectable: 24 });
    }

    let bits = fec::unpack_bits(&payload[..LDU_PAYLOAD_BYTES]);
    let positions = ls_data_positions();

    // 24 groups of 10 bits -> 24 hexbits, working indices 39..62.
    let mut hexbits = [0u8; 24];
    let mut uncorrectable = 0usize;
    for (group, chunk) in positions.chunks(10).enumerate() {
        let mut word = 0u16;
        for &pos in chunk {
            word = word << 1 | bits[pos] as u16;
        }
        let (data, status) = fec::hamming_10_6_decode(word);
        // Only the 16 data hexbits gate the result; parity hexbits are unused.
        if status == Correction::Uncorrectable && group < 16 {
            uncorrectable += 1;
        }
        hexbits[group] = data;
    }

    if uncorrectable > 0 {
        return Err(DecoderError::EsCorrupted { uncorrectable });
    }

    Ok(repack_hexbits(&hexbits))
}

/// Pack hexbits 39..54 (indices 0..16 here) into MI, ALGID and KID.
fn repack_hexbits(hb: &[u8; 24]) -> EncryptionSync {
    let mut mi = [0u8; 9];
    for (group, j) in [0usize, 4, 8].iter().enumerate() {
        let j = *j;
        mi[group * 3] = hb[j] << 2 | hb[j + 1] >> 4;
        mi[group * 3 + 1] = (hb[j + 1] & 0x0F) << 4 | hb[j + 2] >> 2;
        mi[group * 3 + 2] = (hb[j + 2] & 0x03) << 6 | hb[j + 3];
    }

    let algorithm_id = hb[12] << 2 | hb[13] >> 4;
    let key_id = ((hb[13] & 0x0F) as u16) << 12 | (hb[14] as u16) << 6 | hb[15] as u16;

    EncryptionSync {
        mi,
        algorithm_id,
        key_id,
    }
}

/// Spread an Encryption Sync across an LDU2 payload (inverse of
/// [`extract_encryption_sync`]); used to generate loopback test captures.
pub fn insert_encryption_sync(payload: &mut [u8], es: &EncryptionSync) {
    assert!(payload.len() >= LDU_PAYLOAD_BYTES);

    let mut hexbits = [0u8; 24];
    for (group, j) in [0usize, 4, 8].iter().enumerate() {
        let j = *j;
        let (a, b, c) = (
            es.mi[group * 3],
            es.mi[group * 3 + 1],
            es.mi[group * 3 + 2],
        );
        hexbits[j] = a >> 2;
        hexbits[j + 1] = (a & 0x03) << 4 | b >> 4;
        hexbits[j + 2] = (b & 0x0F) << 2 | c >> 6;
        hexbits[j + 3] = c & 0x3F;
    }
    hexbits[12] = es.algorithm_id >> 2;
    hexbits[13] = (es.algorithm_id & 0x03) << 4 | (es.key_id >> 12) as u8;
    hexbits[14] = (es.key_id >> 6) as u8 & 0x3F;
    hexbits[15] = es.key_id as u8 & 0x3F;

    let mut bits = fec::unpack_bits(&payload[..LDU_PAYLOAD_BYTES]);
    let positions = ls_data_positions();
    for (group, chunk) in positions.chunks(10).enumerate() {
        let word = fec::hamming_10_6_encode(hexbits[group]);
        for (k, &pos) in chunk.iter().enumerate() {
            bits[pos] = word >> (9 - k) & 1 == 1;
        }
    }

    let packed = fec::pack_bits(&bits);
    payload[..LDU_PAYLOAD_BYTES].copy_from_slice(&packed);
}
