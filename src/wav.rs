//! WAV output for decoded calls.
//!
//! Always the canonical 44-byte header: PCM, mono, 8 kHz, 16-bit
//! little-endian. An empty call produces a header with a zero-length data
//! chunk.

use crate::defaults::SAMPLE_RATE;
use crate::error::Result;
use std::path::Path;

/// The one spec every call file uses.
pub fn wav_spec() -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Write a complete call to `path`.
pub fn write_wav(path: &Path, samples: &[i16]) -> Result<()> {
    let mut writer = hound::WavWriter::create(path, wav_spec())?;
    {
        let mut i16_writer = writer.get_i16_writer(samples.len() as u32);
        for &sample in samples {
            i16_writer.write_sample(sample);
        }
        i16_writer.flush()?;
    }
    writer.finalize()?;
    Ok(())
}

/// Read a call file back as samples. Used by the file sinks and tests.
pub fn read_wav(path: &Path) -> Result<Vec<i16>> {
    let mut reader = hound::WavReader::open(path)?;
    let samples = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(samples)
}
