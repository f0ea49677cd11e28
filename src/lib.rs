//! trunk-decoder - P25 Phase-1 call decoder
//!
//! Decodes captured P25 FDMA call files into 8 kHz PCM audio with per-call
//! metadata, with optional DES-OFB / AES-256-OFB / ADP decryption of the
//! embedded IMBE codewords. A bounded job queue and worker pool sit behind an
//! HTTP ingest endpoint for service deployments.

pub mod cli;
pub mod config;
pub mod crypto;
pub mod decode;
pub mod defaults;
pub mod error;
pub mod fec;
pub mod frame;
pub mod http;
pub mod imbe;
pub mod jobs;
pub mod ldu;
pub mod sidecar;
pub mod sink;
pub mod transcode;
pub mod wav;
