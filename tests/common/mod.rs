//! Synthetic capture builders shared by the integration tests.
#![allow(dead_code)]

use trunk_decoder::crypto::{Algorithm, Keystream};
use trunk_decoder::fec;
use trunk_decoder::imbe::{encode_frame, extract_codeword, insert_codeword};
use trunk_decoder::ldu::{insert_encryption_sync, EncryptionSync};

/// Voiced IMBE frame: pitch 60, every band voiced, mid gain.
pub const VOICED_U: [u16; 8] = [0x3CF, 0xF80, 0, 0, 0, 0, 0, 0];

pub const LDU1: u8 = 0x05;
pub const LDU2: u8 = 0x0A;
pub const TDU: u8 = 0x03;

/// A 216-byte voice payload carrying the same codeword nine times.
pub fn voice_payload(u: &[u16; 8]) -> Vec<u8> {
    let mut bits = vec![false; 1728];
    let packed = encode_frame(u);
    let cw_bits = fec::unpack_bits(&packed);
    let mut cw = [false; 144];
    cw.copy_from_slice(&cw_bits);
    for index in 0..9 {
        insert_codeword(&mut bits, index, &cw);
    }
    fec::pack_bits(&bits)
}

/// A voice payload with the encryption sync fields spliced in.
pub fn ldu2_payload(u: &[u16; 8], es: &EncryptionSync) -> Vec<u8> {
    let mut payload = voice_payload(u);
    insert_encryption_sync(&mut payload, es);
    payload
}

/// Frame one data unit.
pub fn unit(duid: u8, nac: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![duid];
    out.extend_from_slice(&nac.to_be_bytes());
    out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// A minimal capture that decodes instantly: a single terminator.
pub fn tiny_capture() -> Vec<u8> {
    unit(TDU, 0x0293, &[])
}

/// A clear capture of `n` voiced LDU1 units.
pub fn clear_capture(n: usize) -> Vec<u8> {
    let payload = voice_payload(&VOICED_U);
    let mut capture = Vec::new();
    for _ in 0..n {
        capture.extend(unit(LDU1, 0x0293, &payload));
    }
    capture
}

/// XOR every codeword of a payload with the keystream, mirroring the
/// decoder's own offset walk.
pub fn encrypt_payload(keystream: &mut Keystream, payload: &[u8], is_ldu2: bool) -> Vec<u8> {
    let mut bits = fec::unpack_bits(payload);
    for index in 0..9 {
        let cw = extract_codeword(&bits, index);
        let mut packed = [0u8; 18];
        packed.copy_from_slice(&fec::pack_bits(&cw));
        keystream.decrypt_codeword(&mut packed, is_ldu2);
        let cw_bits = fec::unpack_bits(&packed);
        let mut cw = [false; 144];
        cw.copy_from_slice(&cw_bits);
        insert_codeword(&mut bits, index, &cw);
    }
    fec::pack_bits(&bits)
}

/// An encrypted capture: one keyed LDU2 followed by `ldu1_count` LDU1 units,
/// all voice codewords XORed with the keystream.
pub fn encrypted_capture(
    algorithm: Algorithm,
    key: &[u8],
    es: &EncryptionSync,
    ldu1_count: usize,
) -> Vec<u8> {
    let mut keystream = Keystream::prepare(algorithm, es.key_id, key, &es.mi).unwrap();

    let mut capture = unit(
        LDU2,
        0x0293,
        &encrypt_payload(&mut keystream, &ldu2_payload(&VOICED_U, es), true),
    );
    for _ in 0..ldu1_count {
        capture.extend(unit(
            LDU1,
            0x0293,
            &encrypt_payload(&mut keystream, &voice_payload(&VOICED_U), false),
        ));
    }
    capture
}
