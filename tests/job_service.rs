//! Job manager behavior under load, admission control and lifecycle.

mod common;

use common::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use trunk_decoder::crypto::Keyring;
use trunk_decoder::error::DecoderError;
use trunk_decoder::jobs::{JobManager, JobManagerConfig, JobRequest, JobStatus};
use trunk_decoder::transcode::AudioFormat;

fn request(dir: &TempDir, name: &str, capture: &[u8]) -> JobRequest {
    let capture_path = dir.path().join(format!("{name}.p25"));
    std::fs::write(&capture_path, capture).unwrap();
    JobRequest {
        capture_path,
        metadata: None,
        output_base: dir.path().join("out").join(name),
        stream_name: "default".to_string(),
        audio_format: AudioFormat::Wav,
        audio_bitrate: 0,
        delete_capture: false,
    }
}

fn wait_for<F: Fn() -> bool>(what: &str, cond: F) {
    let deadline = Instant::now() + Duration::from_secs(30);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(10));
    }
}

/// Admission control: with a bound of 10 and no workers draining, exactly 10
/// jobs are admitted and the rest bounce with QueueFull. Once workers start,
/// every admitted job reaches a terminal state, FIFO by submission.
#[test]
fn bounded_admission_then_full_drain() {
    let dir = TempDir::new().unwrap();
    let mgr = JobManager::new(
        JobManagerConfig {
            worker_count: 4,
            max_queue_size: 10,
            ..Default::default()
        },
        Arc::new(Keyring::new()),
    );

    let mut admitted = Vec::new();
    let mut rejected = 0usize;
    for i in 0..50 {
        match mgr.enqueue(request(&dir, &format!("load_{i:02}"), &clear_capture(1))) {
            Ok(id) => admitted.push(id),
            Err(DecoderError::QueueFull) => rejected += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(admitted.len(), 10);
    assert_eq!(rejected, 40);
    assert_eq!(mgr.queue_len(), 10);
    for id in &admitted {
        assert_eq!(mgr.job(id).unwrap().status, JobStatus::Queued);
    }

    mgr.start();
    wait_for("all admitted jobs terminal", || {
        admitted.iter().all(|id| {
            matches!(
                mgr.job(id).unwrap().status,
                JobStatus::Completed | JobStatus::Failed
            )
        })
    });
    mgr.stop();

    // Everything admitted decoded successfully.
    for id in &admitted {
        let job = mgr.job(id).unwrap();
        assert_eq!(job.status, JobStatus::Completed, "job {id}");
    }

    // Submission order is preserved in received_at.
    let received: Vec<Instant> = admitted
        .iter()
        .map(|id| mgr.job(id).unwrap().received_at)
        .collect();
    assert!(received.windows(2).all(|w| w[0] <= w[1]));

    let stats = mgr.stats();
    assert_eq!(stats.queued, 10);
    assert_eq!(stats.completed, 10);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.queue_size, 0);
    assert_eq!(stats.active_workers, 0);
    assert!(stats.avg_processing_time_ms >= 0.0);
}

#[test]
fn jobs_produce_decoded_artifacts() {
    let dir = TempDir::new().unwrap();
    let mgr = JobManager::new(
        JobManagerConfig {
            worker_count: 2,
            ..Default::default()
        },
        Arc::new(Keyring::new()),
    );
    mgr.start();

    let ids: Vec<String> = (0..4)
        .map(|i| {
            mgr.enqueue(request(&dir, &format!("art_{i}"), &clear_capture(2)))
                .unwrap()
        })
        .collect();

    wait_for("artifact jobs complete", || {
        ids.iter()
            .all(|id| mgr.job(id).unwrap().status == JobStatus::Completed)
    });
    mgr.stop();

    for i in 0..4 {
        let wav = dir.path().join("out").join(format!("art_{i}.wav"));
        let samples = trunk_decoder::wav::read_wav(&wav).unwrap();
        assert_eq!(samples.len(), 2 * 9 * 160);
    }
}

#[test]
fn zero_budget_jobs_fail_with_timeout() {
    let dir = TempDir::new().unwrap();
    let mgr = JobManager::new(
        JobManagerConfig {
            worker_count: 1,
            job_timeout: Duration::ZERO,
            ..Default::default()
        },
        Arc::new(Keyring::new()),
    );
    mgr.start();

    let id = mgr
        .enqueue(request(&dir, "budget", &clear_capture(5)))
        .unwrap();
    wait_for("timeout", || {
        mgr.job(&id).unwrap().status == JobStatus::Failed
    });
    mgr.stop();

    let job = mgr.job(&id).unwrap();
    assert_eq!(job.error.as_deref(), Some("timeout"));
    // The worker is free again, not stalled.
    assert_eq!(mgr.stats().active_workers, 0);
}

#[test]
fn shutdown_fails_undrained_jobs() {
    let dir = TempDir::new().unwrap();
    let mgr = JobManager::new(
        JobManagerConfig {
            worker_count: 1,
            max_queue_size: 100,
            ..Default::default()
        },
        Arc::new(Keyring::new()),
    );

    let ids: Vec<String> = (0..5)
        .map(|i| {
            mgr.enqueue(request(&dir, &format!("drain_{i}"), &tiny_capture()))
                .unwrap()
        })
        .collect();

    // Stop without ever starting workers: everything is abandoned.
    mgr.stop();
    for id in &ids {
        let job = mgr.job(id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("shutting down"));
    }
    assert!(matches!(
        mgr.enqueue(request(&dir, "late", &tiny_capture())),
        Err(DecoderError::ShuttingDown)
    ));
}

#[test]
fn status_counts_partition_tracked_jobs() {
    let dir = TempDir::new().unwrap();
    let mgr = JobManager::new(
        JobManagerConfig {
            worker_count: 3,
            ..Default::default()
        },
        Arc::new(Keyring::new()),
    );
    mgr.start();

    let mut ids = Vec::new();
    // A mix of decodable and missing-input jobs.
    for i in 0..6 {
        ids.push(
            mgr.enqueue(request(&dir, &format!("ok_{i}"), &tiny_capture()))
                .unwrap(),
        );
    }
    for i in 0..3 {
        let req = JobRequest {
            capture_path: dir.path().join(format!("missing_{i}.p25")),
            metadata: None,
            output_base: dir.path().join("out").join(format!("missing_{i}")),
            stream_name: "default".to_string(),
            audio_format: AudioFormat::Wav,
            audio_bitrate: 0,
            delete_capture: false,
        };
        ids.push(mgr.enqueue(req).unwrap());
    }

    wait_for("mixed jobs terminal", || {
        ids.iter().all(|id| {
            matches!(
                mgr.job(id).unwrap().status,
                JobStatus::Completed | JobStatus::Failed
            )
        })
    });
    mgr.stop();

    let stats = mgr.stats();
    assert_eq!(stats.queued, 9);
    assert_eq!(stats.completed, 6);
    assert_eq!(stats.failed, 3);
    assert_eq!(stats.completed + stats.failed, 9);
}
