//! Asynchronous decode job management.
//!
//! A bounded FIFO feeds a fixed pool of worker threads. Submission never
//! blocks: a full queue rejects immediately. Each worker owns its decoder
//! instance, so no P25 processing state crosses threads; the queue and the
//! job tracker are the only shared mutable state, behind separate locks so
//! status polls never contend with dequeues.

use crate::crypto::Keyring;
use crate::decode::{DecodeOptions, P25Decoder};
use crate::error::{DecoderError, Result};
use crate::sink::{DecodedCall, DecodedSink};
use crate::transcode::AudioFormat;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Job lifecycle; transitions are monotonic
/// Queued -> Processing -> Completed | Failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

/// A decode work item, shared between the submitter and the claiming worker.
#[derive(Debug, Clone)]
pub struct ProcessingJob {
    pub id: String,
    pub capture_path: PathBuf,
    pub metadata: Option<Value>,
    pub output_base: PathBuf,
    pub stream_name: String,
    pub audio_format: AudioFormat,
    pub audio_bitrate: u32,
    /// Remove the capture temp file once the job terminates.
    pub delete_capture: bool,
    pub status: JobStatus,
    pub received_at: Instant,
    pub started_at: Option<Instant>,
    pub completed_at: Option<Instant>,
    pub error: Option<String>,
}

/// Submission parameters for one job.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub capture_path: PathBuf,
    pub metadata: Option<Value>,
    pub output_base: PathBuf,
    pub stream_name: String,
    pub audio_format: AudioFormat,
    pub audio_bitrate: u32,
    pub delete_capture: bool,
}

#[derive(Debug, Clone)]
pub struct JobManagerConfig {
    pub worker_count: usize,
    pub max_queue_size: usize,
    pub job_timeout: Duration,
    /// Executable invoked as `<script> <wav> <json> <system_id>` after each
    /// successful decode.
    pub upload_script: Option<PathBuf>,
    pub verbose: bool,
}

impl Default for JobManagerConfig {
    fn default() -> Self {
        Self {
            worker_count: crate::defaults::DEFAULT_WORKER_COUNT,
            max_queue_size: crate::defaults::DEFAULT_MAX_QUEUE_SIZE,
            job_timeout: crate::defaults::DEFAULT_JOB_TIMEOUT,
            upload_script: None,
            verbose: false,
        }
    }
}

/// Process-wide counters surfaced by the status endpoint.
#[derive(Debug, Clone, Default)]
pub struct JobStats {
    /// Jobs ever accepted into the queue.
    pub queued: u64,
    pub completed: u64,
    pub failed: u64,
    pub active_workers: u64,
    /// Jobs currently waiting in the queue.
    pub queue_size: usize,
    pub avg_processing_time_ms: f64,
}

#[derive(Default)]
struct Counters {
    received: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    active_workers: AtomicU64,
    processing_millis: AtomicU64,
}

type SharedJob = Arc<Mutex<ProcessingJob>>;

pub struct JobManager {
    config: JobManagerConfig,
    keyring: Arc<Keyring>,
    tx: Sender<SharedJob>,
    rx: Receiver<SharedJob>,
    tracker: Arc<Mutex<HashMap<String, SharedJob>>>,
    counters: Arc<Counters>,
    sinks: Arc<Mutex<Vec<Box<dyn DecodedSink>>>>,
    shutdown: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    next_seq: AtomicU64,
}

impl JobManager {
    pub fn new(config: JobManagerConfig, keyring: Arc<Keyring>) -> Self {
        let (tx, rx) = bounded(config.max_queue_size);
        Self {
            config,
            keyring,
            tx,
            rx,
            tracker: Arc::new(Mutex::new(HashMap::new())),
            counters: Arc::new(Counters::default()),
            sinks: Arc::new(Mutex::new(Vec::new())),
            shutdown: Arc::new(AtomicBool::new(false)),
            workers: Mutex::new(Vec::new()),
            next_seq: AtomicU64::new(1),
        }
    }

    /// Register a sink invoked after every successful decode. Call before
    /// [`start`].
    ///
    /// [`start`]: JobManager::start
    pub fn add_sink(&self, sink: Box<dyn DecodedSink>) {
        self.sinks.lock().unwrap().push(sink);
    }

    /// Spawn the worker pool. Idempotent.
    pub fn start(&self) {
        let mut workers = self.workers.lock().unwrap();
        if !workers.is_empty() {
            return;
        }
        self.shutdown.store(false, Ordering::SeqCst);

        for worker_id in 0..self.config.worker_count {
            let rx = self.rx.clone();
            let shutdown = self.shutdown.clone();
            let counters = self.counters.clone();
            let keyring = self.keyring.clone();
            let sinks = self.sinks.clone();
            let config = self.config.clone();

            workers.push(std::thread::spawn(move || {
                worker_loop(worker_id, rx, shutdown, counters, keyring, sinks, config);
            }));
        }

        if self.config.verbose {
            eprintln!(
                "[jobs] started {} workers, queue bound {}",
                self.config.worker_count, self.config.max_queue_size
            );
        }
    }

    /// Stop the pool: workers finish their in-flight decode and exit, then
    /// everything left in the queue is marked failed.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);

        let mut workers = self.workers.lock().unwrap();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }

        // Abandon whatever never got claimed.
        while let Ok(job) = self.rx.try_recv() {
            let mut job = job.lock().unwrap();
            job.status = JobStatus::Failed;
            job.completed_at = Some(Instant::now());
            job.error = Some("shutting down".to_string());
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
        }

        if self.config.verbose {
            eprintln!("[jobs] stopped all workers");
        }
    }

    pub fn is_running(&self) -> bool {
        !self.workers.lock().unwrap().is_empty() && !self.shutdown.load(Ordering::SeqCst)
    }

    /// Submit a job. Rejects immediately when the queue is at capacity or
    /// the service is shutting down; never blocks.
    pub fn enqueue(&self, request: JobRequest) -> Result<String> {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(DecoderError::ShuttingDown);
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let id = format!("job_{seq:06}_{unix}");

        let job = Arc::new(Mutex::new(ProcessingJob {
            id: id.clone(),
            capture_path: request.capture_path,
            metadata: request.metadata,
            output_base: request.output_base,
            stream_name: request.stream_name,
            audio_format: request.audio_format,
            audio_bitrate: request.audio_bitrate,
            delete_capture: request.delete_capture,
            status: JobStatus::Queued,
            received_at: Instant::now(),
            started_at: None,
            completed_at: None,
            error: None,
        }));

        self.tracker.lock().unwrap().insert(id.clone(), job.clone());

        if self.tx.try_send(job).is_err() {
            self.tracker.lock().unwrap().remove(&id);
            if self.config.verbose {
                eprintln!("[jobs] queue full, rejecting {id}");
            }
            return Err(DecoderError::QueueFull);
        }

        self.counters.received.fetch_add(1, Ordering::Relaxed);
        if self.config.verbose {
            eprintln!("[jobs] queued {id}");
        }
        Ok(id)
    }

    /// Snapshot of a tracked job.
    pub fn job(&self, id: &str) -> Option<ProcessingJob> {
        self.tracker
            .lock()
            .unwrap()
            .get(id)
            .map(|job| job.lock().unwrap().clone())
    }

    /// Drop a terminated job from the tracker. No-op while it is still
    /// queued or processing.
    pub fn prune(&self, id: &str) {
        let mut tracker = self.tracker.lock().unwrap();
        let done = tracker.get(id).is_some_and(|job| {
            matches!(
                job.lock().unwrap().status,
                JobStatus::Completed | JobStatus::Failed
            )
        });
        if done {
            tracker.remove(id);
        }
    }

    pub fn queue_len(&self) -> usize {
        self.rx.len()
    }

    pub fn stats(&self) -> JobStats {
        let completed = self.counters.completed.load(Ordering::Relaxed);
        let failed = self.counters.failed.load(Ordering::Relaxed);
        let terminated = completed + failed;
        let millis = self.counters.processing_millis.load(Ordering::Relaxed);

        JobStats {
            queued: self.counters.received.load(Ordering::Relaxed),
            completed,
            failed,
            active_workers: self.counters.active_workers.load(Ordering::Relaxed),
            queue_size: self.rx.len(),
            avg_processing_time_ms: if terminated > 0 {
                millis as f64 / terminated as f64
            } else {
                0.0
            },
        }
    }
}

impl Drop for JobManager {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(
    worker_id: usize,
    rx: Receiver<SharedJob>,
    shutdown: Arc<AtomicBool>,
    counters: Arc<Counters>,
    keyring: Arc<Keyring>,
    sinks: Arc<Mutex<Vec<Box<dyn DecodedSink>>>>,
    config: JobManagerConfig,
) {
    // Decoder is constructed on the first claimed job and reused after.
    let mut decoder: Option<P25Decoder> = None;

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        let job = match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(job) => job,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        counters.active_workers.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let (capture_path, output_base, metadata, format, bitrate, delete_capture, id) = {
            let mut job = job.lock().unwrap();
            job.status = JobStatus::Processing;
            job.started_at = Some(started);
            (
                job.capture_path.clone(),
                job.output_base.clone(),
                job.metadata.clone(),
                job.audio_format,
                job.audio_bitrate,
                job.delete_capture,
                job.id.clone(),
            )
        };

        if config.verbose {
            eprintln!("[jobs] worker {worker_id} processing {id}");
        }

        let dec = decoder.get_or_insert_with(|| P25Decoder::new(keyring.clone()));
        let opts = DecodeOptions {
            audio_format: format,
            audio_bitrate: bitrate,
            deadline: Some(started + config.job_timeout),
            verbose: config.verbose,
        };
        let outcome = dec.decode_file(&capture_path, &output_base, metadata, &opts);

        let elapsed = started.elapsed();
        counters
            .processing_millis
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);

        match outcome {
            Ok(outputs) => {
                {
                    let mut job = job.lock().unwrap();
                    job.status = JobStatus::Completed;
                    job.completed_at = Some(Instant::now());
                }
                counters.completed.fetch_add(1, Ordering::Relaxed);

                if let Some(script) = &config.upload_script {
                    run_upload_script(script, &outputs.wav_path, &outputs.json_path, config.verbose);
                }

                let call = DecodedCall {
                    capture_path: capture_path.clone(),
                    wav_path: outputs.wav_path,
                    json_path: Some(outputs.json_path),
                    metadata: outputs.sidecar,
                };
                for sink in sinks.lock().unwrap().iter_mut() {
                    if let Err(e) = sink.handle(&call) {
                        eprintln!("[jobs] sink '{}' failed for {id}: {e}", sink.name());
                    }
                }

                if config.verbose {
                    eprintln!("[jobs] completed {id} in {}ms", elapsed.as_millis());
                }
            }
            Err(e) => {
                let message = match e {
                    DecoderError::Timeout => "timeout".to_string(),
                    other => other.to_string(),
                };
                {
                    let mut job = job.lock().unwrap();
                    job.status = JobStatus::Failed;
                    job.completed_at = Some(Instant::now());
                    job.error = Some(message.clone());
                }
                counters.failed.fetch_add(1, Ordering::Relaxed);
                eprintln!("[jobs] failed {id}: {message}");
            }
        }

        if delete_capture {
            if let Err(e) = std::fs::remove_file(&capture_path) {
                if config.verbose {
                    eprintln!(
                        "[jobs] could not remove temp capture {}: {e}",
                        capture_path.display()
                    );
                }
            }
        }

        counters.active_workers.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Invoke the upload hook; a nonzero exit is logged and otherwise ignored.
fn run_upload_script(
    script: &std::path::Path,
    wav: &std::path::Path,
    json: &std::path::Path,
    verbose: bool,
) {
    if !script.exists() {
        return;
    }
    match Command::new(script).arg(wav).arg(json).arg("1").output() {
        Ok(output) if output.status.success() => {
            if verbose {
                eprintln!("[jobs] upload script ok for {}", wav.display());
            }
        }
        Ok(output) => {
            eprintln!(
                "[jobs] upload script exited with {} for {}",
                output.status,
                wav.display()
            );
        }
        Err(e) => {
            eprintln!("[jobs] could not run upload script: {e}");
        }
    }
}
