//! Command-line interface for trunk-decoder
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// P25 Phase-1 call decoder
#[derive(Parser, Debug)]
#[command(
    name = "trunk-decoder",
    version = &*Box::leak(crate::defaults::version_string().into_boxed_str()),
    about = "P25 Phase-1 call decoder and ingest service"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (repeat for more detail)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decode capture file(s) or directories to WAV + JSON
    Decode {
        /// Input .p25 files or directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory (default: alongside each input)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Add a decryption key (hex, algorithm from key length:
        /// 5 bytes ADP, 8 DES, 32 AES-256). Repeatable.
        #[arg(short = 'k', long = "key", value_name = "KEYID:KEY")]
        keys: Vec<String>,

        /// Target audio format (wav, mp3, m4a, opus, webm)
        #[arg(long, value_name = "FORMAT")]
        format: Option<String>,

        /// Audio bitrate in kbit/s (0 = format default)
        #[arg(long, value_name = "KBPS")]
        bitrate: Option<u32>,

        /// Process directories recursively
        #[arg(short, long)]
        recursive: bool,
    },

    /// Run the HTTP ingest service with the decode worker pool
    Serve {
        /// Listen port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
}
