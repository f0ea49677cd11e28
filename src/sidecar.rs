//! JSON sidecar generation.
//!
//! Each decoded call gets a `.json` companion: the decoder's own analysis
//! fields merged with whatever metadata arrived alongside the capture. On a
//! key conflict the external value wins; the decoder never overwrites what
//! the recorder said.

use crate::defaults::DECODER_SOURCE;
use crate::error::{DecoderError, Result};
use serde_json::{json, Map, Value};
use std::path::Path;

/// Fields the decoder contributes to every sidecar.
#[derive(Debug, Clone)]
pub struct DecoderFields {
    pub input_file: String,
    pub p25_frames: u64,
    pub voice_frames: u64,
    pub nac: u16,
    pub encrypted: bool,
    pub call_length: f64,
}

/// Build the sidecar object from decoder fields and optional external
/// metadata.
pub fn build_sidecar(external: Option<&Value>, decoder: &DecoderFields) -> Value {
    let mut map = Map::new();
    map.insert("decoder_source".into(), json!(DECODER_SOURCE));
    map.insert("input_file".into(), json!(decoder.input_file));
    map.insert("p25_frames".into(), json!(decoder.p25_frames));
    map.insert("voice_frames".into(), json!(decoder.voice_frames));
    map.insert("nac".into(), json!(decoder.nac));
    map.insert("encrypted".into(), json!(decoder.encrypted));
    map.insert("call_length".into(), json!(decoder.call_length));

    if let Some(Value::Object(ext)) = external {
        for (key, value) in ext {
            map.insert(key.clone(), value.clone());
        }
    }

    Value::Object(map)
}

/// Serialize a sidecar to disk, pretty-printed.
pub fn write_sidecar(path: &Path, sidecar: &Value) -> Result<()> {
    let text =
        serde_json::to_string_pretty(sidecar).map_err(|e| DecoderError::SidecarWrite {
            message: e.to_string(),
        })?;
    std::fs::write(path, text).map_err(|e| DecoderError::SidecarWrite {
        message: format!("{}: {e}", path.display()),
    })
}
