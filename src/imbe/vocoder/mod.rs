//! Multi-band excitation synthesis.
//!
//! Produces 160 samples of 8 kHz PCM per codeword. Voiced harmonics are
//! rendered as a sum of sinusoids with per-harmonic phase carried across
//! frames; unvoiced bands are rendered as scaled excitation noise. Parameters
//! are interpolated linearly across the frame so consecutive codewords join
//! without steps.

pub mod params;

use crate::defaults::SAMPLES_PER_CODEWORD;
use params::{Excitation, FrameParams, MAX_HARMONICS};
use std::f32::consts::TAU;

const EXCITATION_SEED: u32 = 0x3331;

/// Scales the unvoiced noise so its subjective level roughly matches a
/// voiced band of the same amplitude.
const NOISE_GAIN: f32 = 0.35;

/// Stateful IMBE synthesizer. One instance per decoder; call [`reset`] at
/// the start of every capture.
///
/// [`reset`]: Vocoder::reset
pub struct Vocoder {
    prev: Option<FrameParams>,
    phase: [f32; MAX_HARMONICS],
    excitation: Excitation,
}

impl Vocoder {
    pub fn new() -> Self {
        Self {
            prev: None,
            phase: [0.0; MAX_HARMONICS],
            excitation: Excitation::new(EXCITATION_SEED),
        }
    }

    /// Clear all cross-frame state (previous parameters, harmonic phases,
    /// excitation sequence).
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Synthesize one codeword's worth of audio.
    ///
    /// Silence frames and any internally inconsistent parameter set produce
    /// 160 zero samples; synthesis never fails.
    pub fn synthesize(&mut self, v: &[i16; 8]) -> [i16; SAMPLES_PER_CODEWORD] {
        match params::unpack(v) {
            Some(cur) => {
                let out = self.render(&cur);
                self.prev = Some(cur);
                out
            }
            None => {
                // Silence frame: fade the model out rather than carrying
                // stale harmonics into the next voiced frame.
                self.prev = None;
                [0i16; SAMPLES_PER_CODEWORD]
            }
        }
    }

    fn render(&mut self, cur: &FrameParams) -> [i16; SAMPLES_PER_CODEWORD] {
        const N: usize = SAMPLES_PER_CODEWORD;
        let mut out = [0i16; N];

        let prev = self.prev;
        let prev_fundamental = prev.map_or(cur.fundamental, |p| p.fundamental);

        // Harmonics joining the model this frame start at a deterministic
        // pseudo-random phase.
        let prev_harmonics = prev.map_or(0, |p| p.harmonics);
        for l in prev_harmonics..cur.harmonics {
            self.phase[l] = self.excitation.phase();
        }

        for (i, sample) in out.iter_mut().enumerate() {
            let t = (i as f32 + 0.5) / N as f32;
            let fundamental = prev_fundamental + (cur.fundamental - prev_fundamental) * t;

            let mut voiced_sum = 0.0f32;
            let mut unvoiced_energy = 0.0f32;

            for l in 0..cur.harmonics {
                let prev_amp = match &prev {
                    Some(p) if l < p.harmonics => p.amplitude[l],
                    _ => 0.0,
                };
                let amp = prev_amp + (cur.amplitude[l] - prev_amp) * t;

                self.phase[l] = (self.phase[l] + (l + 1) as f32 * fundamental) % TAU;
                if cur.voiced[l] {
                    voiced_sum += amp * self.phase[l].cos();
                } else {
                    unvoiced_energy += amp * amp;
                }
            }

            let noise = self.excitation.noise() * unvoiced_energy.sqrt() * NOISE_GAIN;
            let mixed = voiced_sum + noise;

            *sample = if mixed.is_finite() {
                mixed.clamp(i16::MIN as f32, i16::MAX as f32) as i16
            } else {
                0
            };
        }

        out
    }
}

impl Default for Vocoder {
    fn default() -> Self {
        Self::new()
    }
}
