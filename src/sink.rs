//! Capture sources and decoded-call sinks.
//!
//! The seams around the decode pipeline are a pair of traits: something that
//! produces capture bytes with optional metadata, and something that consumes
//! a finished call's artifacts. Dispatch is a plain trait-object vector held
//! by whoever drives the pipeline; dynamically loaded plugins are out of the
//! core.

use crate::error::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// A finished call handed to the sinks.
#[derive(Debug, Clone)]
pub struct DecodedCall {
    /// The capture the call was decoded from.
    pub capture_path: PathBuf,
    /// The written WAV.
    pub wav_path: PathBuf,
    /// The written JSON sidecar, if metadata output is enabled.
    pub json_path: Option<PathBuf>,
    /// The sidecar object (decoder fields merged with external metadata).
    pub metadata: Value,
}

/// Produces capture byte blobs with optional external metadata.
pub trait CaptureSource: Send {
    fn name(&self) -> &'static str;

    /// Next capture, or `None` when the source is exhausted.
    fn next_capture(&mut self) -> Result<Option<(Vec<u8>, Option<Value>)>>;
}

/// Consumes a completed decode. Sink failures are logged by the caller and
/// never affect job status.
pub trait DecodedSink: Send {
    fn name(&self) -> &'static str;

    fn handle(&mut self, call: &DecodedCall) -> Result<()>;
}

/// Reads `.p25` files from disk; picks up a neighboring `.json` file as
/// external metadata when one exists.
pub struct FileSource {
    paths: Vec<PathBuf>,
    at: usize,
}

impl FileSource {
    pub fn new(mut paths: Vec<PathBuf>) -> Self {
        paths.sort();
        Self { paths, at: 0 }
    }

    /// Collect `.p25` files from a directory, sorted for deterministic
    /// processing order.
    pub fn from_dir(dir: &Path, recursive: bool) -> Result<Self> {
        Ok(Self::new(find_capture_files(dir, recursive)?))
    }
}

/// Expand a file-or-directory input into `.p25` capture paths, sorted.
pub fn find_capture_files(path: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    if path.is_dir() {
        collect_p25_files(path, recursive, &mut paths)?;
    } else {
        paths.push(path.to_path_buf());
    }
    paths.sort();
    Ok(paths)
}

fn collect_p25_files(dir: &Path, recursive: bool, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            if recursive {
                collect_p25_files(&path, true, out)?;
            }
        } else if path.extension().is_some_and(|e| e == "p25") {
            out.push(path);
        }
    }
    Ok(())
}

impl CaptureSource for FileSource {
    fn name(&self) -> &'static str {
        "file"
    }

    fn next_capture(&mut self) -> Result<Option<(Vec<u8>, Option<Value>)>> {
        let Some(path) = self.paths.get(self.at) else {
            return Ok(None);
        };
        self.at += 1;

        let bytes = std::fs::read(path)?;
        let metadata = std::fs::read_to_string(path.with_extension("json"))
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok());
        Ok(Some((bytes, metadata)))
    }
}

/// Prints a one-line call summary.
pub struct ConsoleSink;

impl DecodedSink for ConsoleSink {
    fn name(&self) -> &'static str {
        "console"
    }

    fn handle(&mut self, call: &DecodedCall) -> Result<()> {
        let get = |key: &str| {
            call.metadata
                .get(key)
                .map(|v| v.to_string().trim_matches('"').to_string())
                .unwrap_or_else(|| "-".to_string())
        };
        println!(
            "[call] {} | nac {} | frames {} | voice {} | encrypted {} | {:.2}s",
            call.wav_path.display(),
            get("nac"),
            get("p25_frames"),
            get("voice_frames"),
            get("encrypted"),
            call.metadata
                .get("call_length")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0),
        );
        Ok(())
    }
}

/// Copies the call artifacts into a destination directory.
pub struct FileCopySink {
    dest: PathBuf,
}

impl FileCopySink {
    pub fn new(dest: PathBuf) -> Self {
        Self { dest }
    }
}

impl DecodedSink for FileCopySink {
    fn name(&self) -> &'static str {
        "file-copy"
    }

    fn handle(&mut self, call: &DecodedCall) -> Result<()> {
        std::fs::create_dir_all(&self.dest)?;
        if let Some(name) = call.wav_path.file_name() {
            std::fs::copy(&call.wav_path, self.dest.join(name))?;
        }
        if let Some(json_path) = &call.json_path {
            if let Some(name) = json_path.file_name() {
                std::fs::copy(json_path, self.dest.join(name))?;
            }
        }
        Ok(())
    }
}
