//! IMBE voice codeword handling: de-interleaving out of the LDU, information
//! vector recovery, and PCM synthesis.

pub mod header;
pub mod interleave;
pub mod vocoder;

pub use header::{decode_frame, encode_frame, ImbeFrame};
pub use interleave::{extract_codeword, extract_codewords, insert_codeword};
pub use vocoder::Vocoder;
