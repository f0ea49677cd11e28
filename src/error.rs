//! Error types for trunk-decoder.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecoderError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Capture / decode errors
    #[error("Failed to open capture {path}: {message}")]
    CaptureOpen { path: String, message: String },

    #[error("Encryption sync unrecoverable: {uncorrectable} of 24 codewords failed Hamming decode")]
    EsCorrupted { uncorrectable: usize },

    #[error("Decode exceeded the job time budget")]
    Timeout,

    // Key management errors
    #[error("No {algorithm} key with id 0x{key_id:04X} in the keyring")]
    KeyNotFound { algorithm: String, key_id: u16 },

    #[error("Invalid key for id 0x{key_id:04X}: {message}")]
    KeyInvalid { key_id: u16, message: String },

    // Output errors
    #[error("WAV write failed: {0}")]
    WavWrite(#[from] hound::Error),

    #[error("Sidecar write failed: {message}")]
    SidecarWrite { message: String },

    // Job manager errors
    #[error("Processing queue is full")]
    QueueFull,

    #[error("Service is shutting down")]
    ShuttingDown,

    // General I/O and serialization
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, DecoderError>;
