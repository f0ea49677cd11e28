//! HTTP ingestion front end.
//!
//! A thin actix-web service over the job manager: uploads are written to a
//! temp path, a job is enqueued, and the caller polls job status. The
//! handler itself does a bounded amount of work and never waits for a
//! decode.

use crate::defaults::TEMP_FILE_PREFIX;
use crate::error::DecoderError;
use crate::jobs::{JobManager, JobRequest, JobStatus};
use crate::transcode::AudioFormat;
use actix_multipart::Multipart;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use futures_util::TryStreamExt;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Shared state handed to every handler.
pub struct AppState {
    pub jobs: Arc<JobManager>,
    pub output_dir: PathBuf,
    pub temp_dir: PathBuf,
    /// When set, requests must carry `Authorization: Bearer <token>`.
    pub auth_token: Option<String>,
    pub audio_format: AudioFormat,
    pub audio_bitrate: u32,
    upload_seq: AtomicU64,
}

impl AppState {
    pub fn new(
        jobs: Arc<JobManager>,
        output_dir: PathBuf,
        auth_token: Option<String>,
        audio_format: AudioFormat,
        audio_bitrate: u32,
    ) -> Self {
        Self {
            jobs,
            output_dir,
            temp_dir: std::env::temp_dir(),
            auth_token,
            audio_format,
            audio_bitrate,
            upload_seq: AtomicU64::new(1),
        }
    }
}

/// Run the ingest service until interrupted.
pub async fn serve(state: AppState, bind_addr: &str, port: u16) -> std::io::Result<()> {
    let data = web::Data::new(state);
    eprintln!("[http] listening on {bind_addr}:{port}");
    HttpServer::new(move || App::new().app_data(data.clone()).configure(routes))
        .bind((bind_addr, port))?
        .run()
        .await
}

/// Route table, shared by the server and the tests.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/v1/decode", web::post().to(handle_decode))
        .route("/api/v1/status", web::get().to(handle_status))
        .route("/api/v1/jobs/{id}", web::get().to(handle_job_status));
}

fn unauthorized() -> HttpResponse {
    HttpResponse::Unauthorized()
        .insert_header(("WWW-Authenticate", "Bearer realm=\"trunk-decoder\""))
        .json(json!({"error": "Authentication required"}))
}

fn authorized(state: &AppState, req: &HttpRequest) -> bool {
    let Some(expected) = &state.auth_token else {
        return true;
    };
    req.headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == expected)
}

async fn handle_decode(
    req: HttpRequest,
    payload: Multipart,
    state: web::Data<AppState>,
) -> HttpResponse {
    if !authorized(&state, &req) {
        return unauthorized();
    }

    let parts = match read_multipart(payload).await {
        Ok(parts) => parts,
        Err(message) => {
            return HttpResponse::BadRequest().json(json!({ "error": message }));
        }
    };

    let Some((filename, bytes)) = parts.capture else {
        return HttpResponse::BadRequest().json(json!({"error": "Missing p25_file in request"}));
    };

    let metadata: Option<Value> = match &parts.metadata {
        None => None,
        Some(text) => match serde_json::from_str(text) {
            Ok(value) => Some(value),
            Err(_) => {
                return HttpResponse::BadRequest()
                    .json(json!({"error": "Invalid metadata JSON"}));
            }
        },
    };
    let stream_name = parts.stream_name.unwrap_or_else(|| "default".to_string());

    // Persist the upload for the worker.
    let seq = state.upload_seq.fetch_add(1, Ordering::Relaxed);
    let safe_name = Path::new(&filename)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.p25".to_string());
    let temp_path = state
        .temp_dir
        .join(format!("{TEMP_FILE_PREFIX}_{}_{seq}_{safe_name}", unix_now()));
    if let Err(e) = std::fs::write(&temp_path, &bytes) {
        eprintln!("[http] failed to persist upload: {e}");
        return HttpResponse::InternalServerError()
            .json(json!({"error": "Failed to store upload"}));
    }

    let output_base = output_base_path(&state.output_dir, &safe_name, metadata.as_ref());

    let request = JobRequest {
        capture_path: temp_path.clone(),
        metadata,
        output_base,
        stream_name: stream_name.clone(),
        audio_format: state.audio_format,
        audio_bitrate: state.audio_bitrate,
        delete_capture: true,
    };

    match state.jobs.enqueue(request) {
        Ok(job_id) => HttpResponse::Accepted().json(json!({
            "job_id": job_id,
            "status": "queued",
            "stream_name": stream_name,
        })),
        Err(DecoderError::QueueFull) => {
            let _ = std::fs::remove_file(&temp_path);
            HttpResponse::ServiceUnavailable()
                .json(json!({"error": "Processing queue is full"}))
        }
        Err(_) => {
            let _ = std::fs::remove_file(&temp_path);
            HttpResponse::ServiceUnavailable().json(json!({"error": "Service is shutting down"}))
        }
    }
}

async fn handle_status(state: web::Data<AppState>) -> HttpResponse {
    let stats = state.jobs.stats();
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "processing": {
            "queued": stats.queued,
            "completed": stats.completed,
            "failed": stats.failed,
            "active_workers": stats.active_workers,
            "queue_size": stats.queue_size,
            "avg_processing_time_ms": stats.avg_processing_time_ms,
        },
    }))
}

async fn handle_job_status(path: web::Path<String>, state: web::Data<AppState>) -> HttpResponse {
    let Some(job) = state.jobs.job(&path) else {
        return HttpResponse::NotFound().json(json!({"error": "Unknown job"}));
    };

    let mut body = json!({
        "job_id": job.id,
        "status": job.status.as_str(),
        "stream_name": job.stream_name,
        "age_ms": job.received_at.elapsed().as_millis() as u64,
    });
    if let Some(started) = job.started_at {
        let end = job.completed_at.unwrap_or_else(std::time::Instant::now);
        body["processing_ms"] = json!(end.duration_since(started).as_millis() as u64);
    }
    if let Some(completed) = job.completed_at {
        body["total_time_ms"] =
            json!(completed.duration_since(job.received_at).as_millis() as u64);
    }
    if matches!(job.status, JobStatus::Failed) {
        if let Some(error) = job.error {
            body["error"] = json!(error);
        }
    }
    HttpResponse::Ok().json(body)
}

struct MultipartParts {
    capture: Option<(String, Vec<u8>)>,
    metadata: Option<String>,
    stream_name: Option<String>,
}

async fn read_multipart(mut payload: Multipart) -> Result<MultipartParts, String> {
    let mut parts = MultipartParts {
        capture: None,
        metadata: None,
        stream_name: None,
    };

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| format!("Malformed multipart body: {e}"))?
    {
        let disposition = field.content_disposition();
        let name = disposition.get_name().unwrap_or("").to_string();
        let filename = disposition.get_filename().map(|f| f.to_string());

        let mut data = Vec::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| format!("Malformed multipart body: {e}"))?
        {
            data.extend_from_slice(&chunk);
        }

        match name.as_str() {
            "p25_file" => {
                let filename = filename.unwrap_or_else(|| "upload.p25".to_string());
                parts.capture = Some((filename, data));
            }
            "metadata" => {
                parts.metadata = Some(String::from_utf8_lossy(&data).into_owned());
            }
            "stream_name" => {
                parts.stream_name = Some(String::from_utf8_lossy(&data).trim().to_string());
            }
            _ => {}
        }
    }

    Ok(parts)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Output base path for an upload: date-partitioned under the system short
/// name when the metadata carries one, flat otherwise. The `.p25` extension
/// is stripped from the base name.
fn output_base_path(output_dir: &Path, filename: &str, metadata: Option<&Value>) -> PathBuf {
    let base_name = filename.strip_suffix(".p25").unwrap_or(filename);

    if let Some(metadata) = metadata {
        let short_name = metadata.get("short_name").and_then(|v| v.as_str());
        let start_time = metadata.get("start_time").and_then(|v| v.as_i64());
        if let (Some(short_name), Some(start_time)) = (short_name, start_time) {
            let (year, month, day) = civil_date(start_time);
            return output_dir
                .join(short_name)
                .join(format!("{year:04}"))
                .join(format!("{month:02}"))
                .join(format!("{day:02}"))
                .join(base_name);
        }
    }

    output_dir.join(base_name)
}

/// Unix timestamp to UTC (year, month, day); days-to-civil conversion.
fn civil_date(unix: i64) -> (i64, u32, u32) {
    let days = unix.div_euclid(86_400);
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keyring;
    use crate::jobs::JobManagerConfig;
    use actix_web::{http::StatusCode, test};
    use tempfile::TempDir;

    fn test_state(dir: &TempDir, mgr_config: JobManagerConfig, token: Option<&str>) -> AppState {
        let jobs = Arc::new(JobManager::new(mgr_config, Arc::new(Keyring::new())));
        let mut state = AppState::new(
            jobs,
            dir.path().join("out"),
            token.map(String::from),
            AudioFormat::Wav,
            0,
        );
        state.temp_dir = dir.path().join("tmp");
        std::fs::create_dir_all(&state.temp_dir).unwrap();
        state
    }

    fn multipart_body(boundary: &str, capture: Option<&[u8]>, stream_name: Option<&str>) -> Vec<u8> {
        let mut body = Vec::new();
        if let Some(data) = capture {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"p25_file\"; \
                     filename=\"call_7.p25\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        if let Some(stream) = stream_name {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"stream_name\"\r\n\r\n{stream}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        body
    }

    #[actix_web::test]
    async fn status_endpoint_reports_counters() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir, JobManagerConfig::default(), None);
        let app =
            test::init_service(App::new().app_data(web::Data::new(state)).configure(routes))
                .await;

        let req = test::TestRequest::get().uri("/api/v1/status").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["status"], "ok");
        assert_eq!(body["processing"]["queued"], 0);
        assert_eq!(body["processing"]["queue_size"], 0);
        assert_eq!(body["processing"]["active_workers"], 0);
    }

    #[actix_web::test]
    async fn decode_enqueues_and_reports_job() {
        let dir = TempDir::new().unwrap();
        // Workers not started: job stays queued and observable.
        let state = test_state(&dir, JobManagerConfig::default(), None);
        let app =
            test::init_service(App::new().app_data(web::Data::new(state)).configure(routes))
                .await;

        let boundary = "XAB12";
        let req = test::TestRequest::post()
            .uri("/api/v1/decode")
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            ))
            .set_payload(multipart_body(
                boundary,
                Some(&[0x03, 0x02, 0x93, 0x00, 0x00]),
                Some("alpha"),
            ))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "queued");
        assert_eq!(body["stream_name"], "alpha");
        let job_id = body["job_id"].as_str().unwrap().to_string();

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/jobs/{job_id}"))
            .to_request();
        let job: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(job["status"], "queued");
        assert_eq!(job["stream_name"], "alpha");
        assert!(job["age_ms"].is_u64());
        assert!(job.get("processing_ms").is_none());
    }

    #[actix_web::test]
    async fn decode_without_file_is_bad_request() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir, JobManagerConfig::default(), None);
        let app =
            test::init_service(App::new().app_data(web::Data::new(state)).configure(routes))
                .await;

        let boundary = "XAB12";
        let req = test::TestRequest::post()
            .uri("/api/v1/decode")
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            ))
            .set_payload(multipart_body(boundary, None, Some("alpha")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Missing p25_file in request");
    }

    #[actix_web::test]
    async fn full_queue_returns_503() {
        let dir = TempDir::new().unwrap();
        let state = test_state(
            &dir,
            JobManagerConfig {
                max_queue_size: 1,
                ..Default::default()
            },
            None,
        );
        let app =
            test::init_service(App::new().app_data(web::Data::new(state)).configure(routes))
                .await;

        let boundary = "XAB12";
        let post = || {
            test::TestRequest::post()
                .uri("/api/v1/decode")
                .insert_header((
                    "content-type",
                    format!("multipart/form-data; boundary={boundary}"),
                ))
                .set_payload(multipart_body(
                    boundary,
                    Some(&[0x03, 0x02, 0x93, 0x00, 0x00]),
                    None,
                ))
                .to_request()
        };

        let first = test::call_service(&app, post()).await;
        assert_eq!(first.status(), StatusCode::ACCEPTED);

        let second = test::call_service(&app, post()).await;
        assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = test::read_body_json(second).await;
        assert_eq!(body["error"], "Processing queue is full");
    }

    #[actix_web::test]
    async fn bearer_auth_enforced() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir, JobManagerConfig::default(), Some("sekrit"));
        let app =
            test::init_service(App::new().app_data(web::Data::new(state)).configure(routes))
                .await;

        let boundary = "XAB12";
        let bare = test::TestRequest::post()
            .uri("/api/v1/decode")
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            ))
            .set_payload(multipart_body(boundary, Some(b"x"), None))
            .to_request();
        let resp = test::call_service(&app, bare).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.headers().contains_key("WWW-Authenticate"));

        let wrong = test::TestRequest::post()
            .uri("/api/v1/decode")
            .insert_header(("Authorization", "Bearer nope"))
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            ))
            .set_payload(multipart_body(boundary, Some(b"x"), None))
            .to_request();
        assert_eq!(
            test::call_service(&app, wrong).await.status(),
            StatusCode::UNAUTHORIZED
        );

        let right = test::TestRequest::post()
            .uri("/api/v1/decode")
            .insert_header(("Authorization", "Bearer sekrit"))
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            ))
            .set_payload(multipart_body(boundary, Some(b"x"), None))
            .to_request();
        assert_eq!(
            test::call_service(&app, right).await.status(),
            StatusCode::ACCEPTED
        );
    }

    #[actix_web::test]
    async fn unknown_job_is_404() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir, JobManagerConfig::default(), None);
        let app =
            test::init_service(App::new().app_data(web::Data::new(state)).configure(routes))
                .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/jobs/job_999999_0")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[::core::prelude::v1::test]
    fn output_base_flat_without_metadata() {
        let base = output_base_path(Path::new("/out"), "call_7.p25", None);
        assert_eq!(base, PathBuf::from("/out/call_7"));
    }

    #[::core::prelude::v1::test]
    fn output_base_date_partitioned() {
        let metadata = json!({"short_name": "county", "start_time": 1722470400});
        let base = output_base_path(Path::new("/out"), "call_7.p25", Some(&metadata));
        // 2024-08-01 UTC.
        assert_eq!(base, PathBuf::from("/out/county/2024/08/01/call_7"));
    }

    #[::core::prelude::v1::test]
    fn civil_date_known_values() {
        assert_eq!(civil_date(0), (1970, 1, 1));
        assert_eq!(civil_date(86_400), (1970, 1, 2));
        assert_eq!(civil_date(951_782_400), (2000, 2, 29));
        assert_eq!(civil_date(1_704_067_199), (2023, 12, 31));
        assert_eq!(civil_date(1_704_067_200), (2024, 1, 1));
    }
}
