//! External transcoding of finished WAV files.
//!
//! The core never encodes compressed audio itself; it shells out to ffmpeg
//! after the WAV is on disk. A failed or missing ffmpeg is a warning, not a
//! decode failure.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Target audio container/codec for a decoded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Wav,
    Mp3,
    M4a,
    Opus,
    Webm,
}

impl AudioFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "wav" => Some(AudioFormat::Wav),
            "mp3" => Some(AudioFormat::Mp3),
            "m4a" => Some(AudioFormat::M4a),
            "opus" => Some(AudioFormat::Opus),
            "webm" => Some(AudioFormat::Webm),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
            AudioFormat::Opus => "opus",
            AudioFormat::Webm => "webm",
        }
    }

    /// ffmpeg codec name; none for plain WAV.
    fn codec(&self) -> Option<&'static str> {
        match self {
            AudioFormat::Wav => None,
            AudioFormat::Mp3 => Some("libmp3lame"),
            AudioFormat::M4a => Some("aac"),
            AudioFormat::Opus | AudioFormat::Webm => Some("libopus"),
        }
    }

    /// Default bitrate in kbit/s when the config leaves it at 0.
    pub fn default_bitrate(&self) -> u32 {
        match self {
            AudioFormat::Wav => 0,
            AudioFormat::Mp3 | AudioFormat::M4a => 64,
            AudioFormat::Opus | AudioFormat::Webm => 32,
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Transcode `wav` next to itself with the format's extension.
///
/// Returns the produced path, or `None` when the format is WAV (nothing to
/// do) or when ffmpeg is unavailable or exits nonzero (logged, not fatal).
pub fn convert(wav: &Path, format: AudioFormat, bitrate_kbps: u32, verbose: bool) -> Option<PathBuf> {
    let codec = format.codec()?;

    let bitrate = if bitrate_kbps == 0 {
        format.default_bitrate()
    } else {
        bitrate_kbps
    };

    let out = wav.with_extension(format.extension());
    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-y")
        .arg("-i")
        .arg(wav)
        .args(["-ac", "1", "-ar", "8000", "-c:a", codec])
        .args(["-b:a", &format!("{bitrate}k")]);
    if format == AudioFormat::M4a {
        cmd.args(["-movflags", "+faststart"]);
    }
    cmd.arg(&out);

    if verbose {
        eprintln!("[transcode] {cmd:?}");
    }

    match cmd.output() {
        Ok(output) if output.status.success() => Some(out),
        Ok(output) => {
            eprintln!(
                "[transcode] warning: ffmpeg exited with {} for {}",
                output.status,
                wav.display()
            );
            None
        }
        Err(e) => {
            eprintln!("[transcode] warning: could not run ffmpeg: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_formats() {
        assert_eq!(AudioFormat::parse("wav"), Some(AudioFormat::Wav));
        assert_eq!(AudioFormat::parse("MP3"), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::parse("m4a"), Some(AudioFormat::M4a));
        assert_eq!(AudioFormat::parse("opus"), Some(AudioFormat::Opus));
        assert_eq!(AudioFormat::parse("webm"), Some(AudioFormat::Webm));
        assert_eq!(AudioFormat::parse("flac"), None);
    }

    #[test]
    fn default_bitrates_per_format() {
        assert_eq!(AudioFormat::Mp3.default_bitrate(), 64);
        assert_eq!(AudioFormat::M4a.default_bitrate(), 64);
        assert_eq!(AudioFormat::Opus.default_bitrate(), 32);
        assert_eq!(AudioFormat::Webm.default_bitrate(), 32);
    }

    #[test]
    fn wav_needs_no_conversion() {
        let out = convert(Path::new("/nonexistent/call.wav"), AudioFormat::Wav, 0, false);
        assert!(out.is_none());
    }

    #[test]
    fn missing_input_is_a_warning_not_a_panic() {
        // ffmpeg either is absent or fails on the missing input; both paths
        // must come back as None without surfacing an error.
        let out = convert(
            Path::new("/nonexistent/call.wav"),
            AudioFormat::Mp3,
            64,
            false,
        );
        assert!(out.is_none());
    }

    #[test]
    fn serde_roundtrip_is_lowercase() {
        let s = serde_json::to_string(&AudioFormat::Opus).unwrap();
        assert_eq!(s, "\"opus\"");
        let f: AudioFormat = serde_json::from_str("\"m4a\"").unwrap();
        assert_eq!(f, AudioFormat::M4a);
    }
}
