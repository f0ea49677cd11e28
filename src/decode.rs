//! Per-capture decode pipeline.
//!
//! Composes the frame reader, encryption-sync extractor, IMBE path and
//! keystream generators into one pass over a capture: typed units in, PCM
//! and a sidecar out. The pipeline is deliberately forgiving - missing keys,
//! corrupted encryption sync and vocoder faults all degrade to silence so a
//! call produces some audio rather than none. Only whole-file I/O failures
//! and the job deadline abort a decode.

use crate::crypto::{Algorithm, Keyring, Keystream};
use crate::defaults::{SAMPLES_PER_CODEWORD, SAMPLE_RATE};
use crate::error::{DecoderError, Result};
use crate::frame::{Duid, FrameRead, FrameReader};
use crate::imbe::{self, Vocoder};
use crate::ldu::{self, EncryptionSync};
use crate::sidecar::{self, DecoderFields};
use crate::transcode::{self, AudioFormat};
use crate::wav;
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

/// Per-decode knobs, owned by the caller (job or CLI).
#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    pub audio_format: AudioFormat,
    /// kbit/s; 0 picks the format default.
    pub audio_bitrate: u32,
    /// Wall-clock bound; the decode aborts at the next frame boundary once
    /// past it.
    pub deadline: Option<Instant>,
    pub verbose: bool,
}

/// Accumulated per-call state and output.
#[derive(Debug, Clone)]
pub struct CallArtifacts {
    /// NAC of the first unit.
    pub nac: u16,
    pub frame_count: u64,
    pub voice_frame_count: u64,
    pub has_encrypted_frames: bool,
    /// 8 kHz mono samples, appended in codeword order.
    pub pcm: Vec<i16>,
    pub start_time: SystemTime,
    pub end_time: SystemTime,
    pub call_length_seconds: f64,
}

impl CallArtifacts {
    fn new() -> Self {
        let now = SystemTime::now();
        Self {
            nac: 0,
            frame_count: 0,
            voice_frame_count: 0,
            has_encrypted_frames: false,
            pcm: Vec::new(),
            start_time: now,
            end_time: now,
            call_length_seconds: 0.0,
        }
    }
}

/// Everything a finished file decode produced.
#[derive(Debug, Clone)]
pub struct CallOutputs {
    pub artifacts: CallArtifacts,
    pub wav_path: PathBuf,
    pub json_path: PathBuf,
    pub sidecar: Value,
    /// Present when a non-WAV format was requested and ffmpeg succeeded.
    pub transcoded_path: Option<PathBuf>,
}

/// Per-call cipher state, driven by the LDU2 encryption sync.
enum CipherState {
    /// Unencrypted, or no LDU2 seen yet.
    Clear,
    /// Keystream materialized; codewords decrypt in place.
    Armed(Keystream),
    /// Encrypted but undecryptable (missing key, unknown algorithm or
    /// corrupted sync); voice decodes to silence.
    Blocked,
}

/// One decoder instance: a vocoder plus the keyring handle. Workers each own
/// one; nothing here is shared across threads.
pub struct P25Decoder {
    keyring: Arc<Keyring>,
    vocoder: Vocoder,
}

impl P25Decoder {
    pub fn new(keyring: Arc<Keyring>) -> Self {
        Self {
            keyring,
            vocoder: Vocoder::new(),
        }
    }

    /// Decode a capture byte stream into call artifacts.
    ///
    /// Vocoder and cipher state are reset at entry, so one decoder instance
    /// can be reused across captures.
    pub fn decode_stream<R: Read>(
        &mut self,
        reader: R,
        opts: &DecodeOptions,
    ) -> Result<CallArtifacts> {
        let mut frames = FrameReader::new(reader);
        let mut artifacts = CallArtifacts::new();
        let mut cipher = CipherState::Clear;
        self.vocoder.reset();

        loop {
            if let Some(deadline) = opts.deadline {
                if Instant::now() >= deadline {
                    return Err(DecoderError::Timeout);
                }
            }

            let unit = match frames.next_unit()? {
                FrameRead::Unit(unit) => unit,
                // A short read ends the capture cleanly; everything decoded
                // so far stands.
                FrameRead::EndOfStream | FrameRead::Truncated(_) => break,
            };

            artifacts.frame_count += 1;
            if artifacts.frame_count == 1 {
                artifacts.nac = unit.nac_12();
            }

            if unit.duid == Duid::Ldu2 {
                cipher = match ldu::extract_encryption_sync(&unit.payload) {
                    Ok(es) => self.rearm(&es, &mut artifacts, opts.verbose),
                    Err(DecoderError::EsCorrupted { uncorrectable }) => {
                        if opts.verbose {
                            eprintln!(
                                "[decode] encryption sync corrupted ({uncorrectable} bad hexbits), silencing remaining voice"
                            );
                        }
                        artifacts.has_encrypted_frames = true;
                        CipherState::Blocked
                    }
                    Err(e) => return Err(e),
                };
            }

            if unit.duid.is_voice() {
                artifacts.voice_frame_count += 1;
                let is_ldu2 = unit.duid == Duid::Ldu2;

                for mut codeword in imbe::extract_codewords(&unit.payload) {
                    match &mut cipher {
                        CipherState::Blocked => {
                            artifacts.pcm.extend([0i16; SAMPLES_PER_CODEWORD]);
                        }
                        CipherState::Armed(keystream) => {
                            keystream.decrypt_codeword(&mut codeword, is_ldu2);
                            let frame = imbe::decode_frame(&codeword);
                            artifacts
                                .pcm
                                .extend(self.vocoder.synthesize(&frame.vocoder_vector()));
                        }
                        CipherState::Clear => {
                            let frame = imbe::decode_frame(&codeword);
                            artifacts
                                .pcm
                                .extend(self.vocoder.synthesize(&frame.vocoder_vector()));
                        }
                    }
                }
            }
        }

        artifacts.end_time = SystemTime::now();
        artifacts.call_length_seconds = artifacts.pcm.len() as f64 / SAMPLE_RATE as f64;
        Ok(artifacts)
    }

    /// Refresh the cipher state from a freshly decoded encryption sync.
    /// Every LDU2 resets the keystream position, armed or not.
    fn rearm(
        &self,
        es: &EncryptionSync,
        artifacts: &mut CallArtifacts,
        verbose: bool,
    ) -> CipherState {
        if es.is_clear() {
            return CipherState::Clear;
        }
        artifacts.has_encrypted_frames = true;

        let Some(algorithm) = Algorithm::from_algid(es.algorithm_id) else {
            if verbose {
                eprintln!(
                    "[decode] unsupported ALGID 0x{:02X}, voice will be silenced",
                    es.algorithm_id
                );
            }
            return CipherState::Blocked;
        };

        let Some(key) = self.keyring.lookup(algorithm, es.key_id) else {
            if verbose {
                eprintln!(
                    "[decode] no {} key 0x{:04X} in keyring, voice will be silenced",
                    algorithm.name(),
                    es.key_id
                );
            }
            return CipherState::Blocked;
        };

        match Keystream::prepare(algorithm, es.key_id, key, &es.mi) {
            Ok(keystream) => CipherState::Armed(keystream),
            Err(e) => {
                eprintln!("[decode] keystream preparation failed: {e}");
                CipherState::Blocked
            }
        }
    }

    /// Decode a capture file and write the WAV and JSON sidecar next to
    /// `output_base` (extensions appended).
    pub fn decode_file(
        &mut self,
        input: &Path,
        output_base: &Path,
        external_metadata: Option<Value>,
        opts: &DecodeOptions,
    ) -> Result<CallOutputs> {
        let file = File::open(input).map_err(|e| DecoderError::CaptureOpen {
            path: input.display().to_string(),
            message: e.to_string(),
        })?;

        let artifacts = self.decode_stream(BufReader::new(file), opts)?;

        if let Some(parent) = output_base.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let wav_path = path_with_ext(output_base, "wav");
        wav::write_wav(&wav_path, &artifacts.pcm)?;

        let transcoded_path = if opts.audio_format != AudioFormat::Wav {
            transcode::convert(&wav_path, opts.audio_format, opts.audio_bitrate, opts.verbose)
        } else {
            None
        };

        let fields = DecoderFields {
            input_file: input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            p25_frames: artifacts.frame_count,
            voice_frames: artifacts.voice_frame_count,
            nac: artifacts.nac,
            encrypted: artifacts.has_encrypted_frames,
            call_length: artifacts.call_length_seconds,
        };
        let sidecar = sidecar::build_sidecar(external_metadata.as_ref(), &fields);
        let json_path = path_with_ext(output_base, "json");
        sidecar::write_sidecar(&json_path, &sidecar)?;

        Ok(CallOutputs {
            artifacts,
            wav_path,
            json_path,
            sidecar,
            transcoded_path,
        })
    }
}

/// `base` + `.ext`, without treating dots inside the base name as an
/// existing extension.
fn path_with_ext(base: &Path, ext: &str) -> PathBuf {
    let mut os = base.as_os_str().to_os_string();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}
