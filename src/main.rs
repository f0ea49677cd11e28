use anyhow::{bail, Context};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use trunk_decoder::cli::{Cli, Commands};
use trunk_decoder::config::Config;
use trunk_decoder::crypto::{keyring, Keyring};
use trunk_decoder::decode::{DecodeOptions, P25Decoder};
use trunk_decoder::http::{self, AppState};
use trunk_decoder::jobs::{JobManager, JobManagerConfig};
use trunk_decoder::sink::{find_capture_files, ConsoleSink, DecodedCall, DecodedSink};
use trunk_decoder::transcode::AudioFormat;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(Config::default_path);
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?
        .with_env_overrides();

    match cli.command {
        Commands::Decode {
            ref inputs,
            ref output,
            ref keys,
            ref format,
            bitrate,
            recursive,
        } => run_decode(
            &cli, &config, inputs, output.as_deref(), keys, format.as_deref(), bitrate, recursive,
        ),
        Commands::Serve { port } => run_serve(&cli, config, port),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_decode(
    cli: &Cli,
    config: &Config,
    inputs: &[PathBuf],
    output: Option<&Path>,
    key_specs: &[String],
    format: Option<&str>,
    bitrate: Option<u32>,
    recursive: bool,
) -> anyhow::Result<()> {
    let mut ring = config.build_keyring()?;
    for spec in key_specs {
        let (key_id, key) = keyring::parse_key_spec(spec)?;
        let algorithm = ring.add_key(key_id, &key)?;
        if !cli.quiet {
            eprintln!("Loaded {} key 0x{key_id:04X}", algorithm.name());
        }
    }

    let audio_format = match format {
        Some(name) => AudioFormat::parse(name)
            .with_context(|| format!("unknown audio format '{name}'"))?,
        None => config.decode.audio_format,
    };
    let opts = DecodeOptions {
        audio_format,
        audio_bitrate: bitrate.unwrap_or(config.decode.audio_bitrate),
        deadline: None,
        verbose: cli.verbose > 0,
    };

    let mut captures = Vec::new();
    for input in inputs {
        if !input.exists() {
            bail!("input {} does not exist", input.display());
        }
        captures.extend(find_capture_files(input, recursive)?);
    }
    if captures.is_empty() {
        bail!("no .p25 captures found");
    }

    let mut decoder = P25Decoder::new(Arc::new(ring));
    let mut console = ConsoleSink;
    let mut failures = 0usize;

    for capture in &captures {
        let stem = capture
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "call".to_string());
        let output_base = match output {
            Some(dir) => dir.join(&stem),
            None => capture.with_file_name(stem),
        };

        // A neighboring .json file rides along as external metadata.
        let metadata = std::fs::read_to_string(capture.with_extension("json"))
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok());

        match decoder.decode_file(capture, &output_base, metadata, &opts) {
            Ok(outputs) => {
                if !cli.quiet {
                    let call = DecodedCall {
                        capture_path: capture.clone(),
                        wav_path: outputs.wav_path,
                        json_path: Some(outputs.json_path),
                        metadata: outputs.sidecar,
                    };
                    let _ = console.handle(&call);
                }
            }
            Err(e) => {
                eprintln!("error: {}: {e}", capture.display());
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} captures failed to decode", captures.len());
    }
    Ok(())
}

fn run_serve(cli: &Cli, config: Config, port_override: Option<u16>) -> anyhow::Result<()> {
    let ring: Arc<Keyring> = Arc::new(config.build_keyring()?);
    if !cli.quiet && !ring.is_empty() {
        eprintln!("Keyring loaded with {} key(s)", ring.len());
    }

    std::fs::create_dir_all(&config.service.output_dir).with_context(|| {
        format!(
            "creating output directory {}",
            config.service.output_dir.display()
        )
    })?;

    let manager_config = JobManagerConfig {
        worker_count: config.service.worker_count,
        max_queue_size: config.service.max_queue_size,
        job_timeout: config.service.job_timeout(),
        upload_script: config.service.upload_script.clone(),
        verbose: cli.verbose > 0,
    };
    let jobs = Arc::new(JobManager::new(manager_config, ring));
    if !cli.quiet {
        jobs.add_sink(Box::new(ConsoleSink));
    }
    jobs.start();

    let state = AppState::new(
        jobs.clone(),
        config.service.output_dir.clone(),
        config.service.auth_token.clone(),
        config.decode.audio_format,
        config.decode.audio_bitrate,
    );

    let port = port_override.unwrap_or(config.service.port);
    let bind_addr = config.service.bind_addr.clone();

    // actix handles SIGINT/SIGTERM; run() resolves once the listener is
    // down, then the worker pool drains.
    let result = actix_web::rt::System::new()
        .block_on(http::serve(state, &bind_addr, port))
        .context("HTTP service failed");

    if !cli.quiet {
        eprintln!("Shutting down workers...");
    }
    jobs.stop();
    result
}
