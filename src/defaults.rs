//! Protocol and service constants.

use std::time::Duration;

/// P25 voice is always 8 kHz mono.
pub const SAMPLE_RATE: u32 = 8000;

/// PCM samples synthesized per IMBE codeword (20 ms).
pub const SAMPLES_PER_CODEWORD: usize = 160;

/// IMBE codewords carried by each voice LDU.
pub const CODEWORDS_PER_LDU: usize = 9;

/// Bits in one IMBE voice codeword.
pub const CODEWORD_BITS: usize = 144;

/// Packed byte length of one IMBE codeword (low nibble of the last byte unused).
pub const CODEWORD_BYTES: usize = 18;

/// Byte length of a standard LDU payload.
pub const LDU_PAYLOAD_BYTES: usize = 216;

/// Bit length of a standard LDU payload.
pub const LDU_PAYLOAD_BITS: usize = LDU_PAYLOAD_BYTES * 8;

/// ALGID value meaning "unencrypted".
pub const ALGID_CLEAR: u8 = 0x80;

/// Identifier written into every JSON sidecar.
pub const DECODER_SOURCE: &str = "trunk-decoder";

/// Default worker thread count for the job manager.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Default bound on the processing queue.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 1000;

/// Default wall-clock budget for a single decode job.
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(30);

/// Default HTTP ingest port.
pub const DEFAULT_PORT: u16 = 8080;

/// Prefix for uploaded capture temp files.
pub const TEMP_FILE_PREFIX: &str = "trunk_decoder";

/// Version string including the git hash when built from a checkout.
pub fn version_string() -> String {
    match option_env!("GIT_HASH") {
        Some(hash) => format!("{} ({})", env!("CARGO_PKG_VERSION"), hash),
        None => env!("CARGO_PKG_VERSION").to_string(),
    }
}
