// End-to-end pipeline runs against stub media tooling and unreachable
// provider endpoints. The contract under test: external services being down
// degrades output quality, never job success.

use async_trait::async_trait;
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use dubwave::api::videos::{self, DownloadQuery};
use dubwave::api::AppState;
use dubwave::auth::{AuthKeys, AuthUser};
use dubwave::config::Config;
use dubwave::error::{DubError, Result};
use dubwave::job::{JobRequest, JobStatus, JobStore, VideoType, VoiceMode};
use dubwave::lipsync::RemoteLipSyncEngine;
use dubwave::media::MediaTools;
use dubwave::payment::{PaymentStore, SimulatedGateway};
use dubwave::pipeline::JobOrchestrator;
use dubwave::storage::BlobStore;
use dubwave::synthesis::ElevenLabsClient;
use dubwave::transcribe::WhisperApiClient;
use dubwave::translate::TranslationChain;

/// Media stub that produces deterministic artifacts without ffmpeg.
struct StubMedia {
    /// Bytes written as the extracted audio track. Above the speech
    /// threshold this simulates a video with a real soundtrack.
    extracted_audio: Vec<u8>,
    /// Empty mux output simulates a failed final render.
    mux_produces_output: bool,
}

impl StubMedia {
    fn with_audio(bytes: usize) -> Self {
        Self {
            extracted_audio: vec![0u8; bytes],
            mux_produces_output: true,
        }
    }
}

#[async_trait]
impl MediaTools for StubMedia {
    async fn has_audio_stream(&self, _video_path: &Path) -> Result<bool> {
        Ok(!self.extracted_audio.is_empty())
    }

    async fn extract_audio(&self, _video_path: &Path, audio_path: &Path) -> Result<()> {
        tokio::fs::write(audio_path, &self.extracted_audio).await?;
        Ok(())
    }

    async fn convert(&self, input_path: &Path, output_path: &Path) -> Result<()> {
        tokio::fs::copy(input_path, output_path).await?;
        Ok(())
    }

    async fn mux(&self, _video_path: &Path, _audio_path: &Path, output_path: &Path) -> Result<()> {
        let content: &[u8] = if self.mux_produces_output {
            b"muxed video"
        } else {
            b""
        };
        tokio::fs::write(output_path, content).await?;
        Ok(())
    }

    async fn copy_video(&self, input_path: &Path, output_path: &Path) -> Result<()> {
        tokio::fs::copy(input_path, output_path).await?;
        Ok(())
    }

    async fn separate_channels(
        &self,
        _audio_path: &Path,
        vocals_path: &Path,
        background_path: &Path,
    ) -> Result<()> {
        tokio::fs::write(vocals_path, b"vocals").await?;
        tokio::fs::write(background_path, b"background").await?;
        Ok(())
    }

    async fn mix(
        &self,
        _vocals_path: &Path,
        _background_path: &Path,
        output_path: &Path,
        _vocals_gain: f64,
        _background_gain: f64,
    ) -> Result<()> {
        tokio::fs::write(output_path, b"mixed track").await?;
        Ok(())
    }

    async fn normalize(&self, audio_path: &Path, output_path: &Path) -> Result<()> {
        tokio::fs::copy(audio_path, output_path).await?;
        Ok(())
    }

    fn check_availability(&self) -> Result<()> {
        Ok(())
    }
}

/// Every provider endpoint points at an unroutable address, so all remote
/// calls fail fast with connection errors.
fn offline_config(storage_root: &Path) -> Config {
    let mut config = Config::default();
    config.storage.root = storage_root.to_path_buf();
    config.transcription.endpoint = "http://127.0.0.1:1".to_string();
    config.transcription.timeout_secs = 1;
    config.translation.primary_endpoint = "http://127.0.0.1:1".to_string();
    config.translation.primary_api_key = String::new();
    config.translation.fallback_endpoint = "http://127.0.0.1:1".to_string();
    config.translation.timeout_secs = 1;
    config.synthesis.endpoint = "http://127.0.0.1:1".to_string();
    config.synthesis.timeout_secs = 1;
    config.lipsync.endpoint = String::new();
    config
}

async fn orchestrator_with(
    storage_root: &Path,
    media: Arc<dyn MediaTools>,
) -> Arc<JobOrchestrator> {
    let config = offline_config(storage_root);
    let blobs = BlobStore::new(storage_root).await.unwrap();
    let store = JobStore::new();

    Arc::new(JobOrchestrator::new(
        config.clone(),
        store,
        blobs,
        Arc::clone(&media),
        Arc::new(WhisperApiClient::new(config.transcription.clone())),
        Arc::new(TranslationChain::from_config(&config.translation)),
        Arc::new(ElevenLabsClient::new(config.synthesis.clone())),
        Arc::new(RemoteLipSyncEngine::new(config.lipsync.clone(), media)),
    ))
}

async fn upload_blob(orchestrator: &JobOrchestrator) -> (PathBuf, u64) {
    let data = b"fake video container bytes".to_vec();
    let path = orchestrator
        .blobs()
        .save_upload("clip.mp4", &data)
        .await
        .unwrap();
    (path, data.len() as u64)
}

fn request(owner: Uuid, path: PathBuf, size: u64, source: &str, target: &str) -> JobRequest {
    JobRequest {
        owner_id: owner,
        original_file_name: "clip.mp4".to_string(),
        original_file_path: path,
        source_language: source.to_string(),
        target_language: target.to_string(),
        voice_mode: VoiceMode::Natural,
        video_type: VideoType::Short,
        duration: Some(120),
        file_size: size,
    }
}

#[tokio::test]
async fn test_job_completes_with_all_providers_down() {
    let dir = tempfile::tempdir().unwrap();
    // Extracted audio is above the speech threshold, so transcription,
    // translation, synthesis and separation are all attempted and all of
    // their remote calls fail.
    let media: Arc<dyn MediaTools> = Arc::new(StubMedia::with_audio(4096));
    let orchestrator = orchestrator_with(dir.path(), media).await;

    let (path, size) = upload_blob(&orchestrator).await;
    let owner = Uuid::new_v4();
    let job = orchestrator
        .submit(request(owner, path, size, "en", "hi"))
        .await
        .unwrap();

    orchestrator.run(job.id).await.unwrap();

    let job = orchestrator.store().get(job.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
    assert!(job.error_message.is_none());

    // Every stage flag is set despite every provider being down
    assert_eq!(job.processing_steps.completed_count(), 9);

    // The deliverable exists and is non-empty
    let output = job.processed_file_path.unwrap();
    let rendered = tokio::fs::metadata(&output).await.unwrap();
    assert!(rendered.len() > 0);

    // Subtitles were generated from the fallback sample text
    let subtitles = job.subtitles.unwrap();
    let srt = tokio::fs::read_to_string(&subtitles.srt).await.unwrap();
    assert!(srt.contains("-->"));
}

#[tokio::test]
async fn test_silent_video_skips_speech_stages_but_completes() {
    let dir = tempfile::tempdir().unwrap();
    // 44 bytes: a bare waveform header, below the speech threshold
    let media: Arc<dyn MediaTools> = Arc::new(StubMedia::with_audio(44));
    let orchestrator = orchestrator_with(dir.path(), media).await;

    let (path, size) = upload_blob(&orchestrator).await;
    let job = orchestrator
        .submit(request(Uuid::new_v4(), path, size, "en", "es"))
        .await
        .unwrap();

    orchestrator.run(job.id).await.unwrap();

    let job = orchestrator.store().get(job.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
    // Step flags are still all set: skipped work is recorded as done
    assert!(job.processing_steps.translation);
    assert!(job.processing_steps.background_music_extraction);
}

#[tokio::test]
async fn test_equal_languages_rejected_and_blob_removed() {
    let dir = tempfile::tempdir().unwrap();
    let media: Arc<dyn MediaTools> = Arc::new(StubMedia::with_audio(4096));
    let orchestrator = orchestrator_with(dir.path(), media).await;

    let (path, size) = upload_blob(&orchestrator).await;
    assert!(path.exists());

    let err = orchestrator
        .submit(request(Uuid::new_v4(), path.clone(), size, "hi", "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, DubError::Validation(_)));
    assert!(!path.exists());
}

#[tokio::test]
async fn test_unsupported_language_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let media: Arc<dyn MediaTools> = Arc::new(StubMedia::with_audio(4096));
    let orchestrator = orchestrator_with(dir.path(), media).await;

    let (path, size) = upload_blob(&orchestrator).await;
    let err = orchestrator
        .submit(request(Uuid::new_v4(), path.clone(), size, "en", "xx"))
        .await
        .unwrap_err();
    assert!(matches!(err, DubError::Validation(_)));
    assert!(!path.exists());
}

#[tokio::test]
async fn test_failed_render_marks_job_failed() {
    let dir = tempfile::tempdir().unwrap();
    let media: Arc<dyn MediaTools> = Arc::new(StubMedia {
        extracted_audio: vec![0u8; 44],
        mux_produces_output: false,
    });
    let orchestrator = orchestrator_with(dir.path(), media).await;

    let (path, size) = upload_blob(&orchestrator).await;
    let job = orchestrator
        .submit(request(Uuid::new_v4(), path, size, "en", "fr"))
        .await
        .unwrap();

    // Supervised spawn must record the failure instead of propagating it
    orchestrator.spawn(job.id).await.unwrap();

    let job = orchestrator.store().get(job.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.unwrap().contains("render"));
    assert!(job.processed_file_path.is_none());
}

fn app_state(orchestrator: Arc<JobOrchestrator>) -> AppState {
    AppState {
        orchestrator,
        payments: PaymentStore::new(Arc::new(SimulatedGateway)),
        auth: AuthKeys::new(&Config::default().auth),
    }
}

async fn download_video(
    state: AppState,
    user: Uuid,
    job_id: Uuid,
) -> Result<axum::response::Response> {
    videos::download(
        State(state),
        AuthUser { user_id: user },
        UrlPath(job_id),
        Query(DownloadQuery { format: None }),
    )
    .await
}

fn content_disposition(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_download_falls_back_to_original_when_render_blob_missing() {
    let dir = tempfile::tempdir().unwrap();
    let media: Arc<dyn MediaTools> = Arc::new(StubMedia::with_audio(4096));
    let orchestrator = orchestrator_with(dir.path(), media).await;

    let (path, size) = upload_blob(&orchestrator).await;
    let owner = Uuid::new_v4();
    let job = orchestrator
        .submit(request(owner, path, size, "en", "hi"))
        .await
        .unwrap();
    orchestrator.run(job.id).await.unwrap();

    // Completed normally: the dubbed rendition is served
    let response = download_video(app_state(Arc::clone(&orchestrator)), owner, job.id)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(content_disposition(&response).contains("dubbed_clip.mp4"));

    // With the dubbed blob gone, the original upload is served, relabeled
    // so the caller can tell it apart
    let completed = orchestrator.store().get(job.id).await.unwrap();
    tokio::fs::remove_file(completed.processed_file_path.unwrap())
        .await
        .unwrap();

    let response = download_video(app_state(Arc::clone(&orchestrator)), owner, job.id)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(content_disposition(&response).contains("original_clip.mp4"));

    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    assert_eq!(body.as_ref(), b"fake video container bytes");
}

#[tokio::test]
async fn test_download_before_completion_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let media: Arc<dyn MediaTools> = Arc::new(StubMedia::with_audio(4096));
    let orchestrator = orchestrator_with(dir.path(), media).await;

    let (path, size) = upload_blob(&orchestrator).await;
    let owner = Uuid::new_v4();
    let job = orchestrator
        .submit(request(owner, path, size, "en", "hi"))
        .await
        .unwrap();

    // Still at the initial processing checkpoint; no download yet
    let err = download_video(app_state(orchestrator), owner, job.id)
        .await
        .unwrap_err();
    assert!(matches!(err, DubError::Validation(_)));
    assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_download_with_both_blobs_missing_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let media: Arc<dyn MediaTools> = Arc::new(StubMedia::with_audio(4096));
    let orchestrator = orchestrator_with(dir.path(), media).await;

    let (path, size) = upload_blob(&orchestrator).await;
    let owner = Uuid::new_v4();
    let job = orchestrator
        .submit(request(owner, path.clone(), size, "en", "hi"))
        .await
        .unwrap();
    orchestrator.run(job.id).await.unwrap();

    let completed = orchestrator.store().get(job.id).await.unwrap();
    tokio::fs::remove_file(completed.processed_file_path.unwrap())
        .await
        .unwrap();
    tokio::fs::remove_file(&path).await.unwrap();

    let err = download_video(app_state(orchestrator), owner, job.id)
        .await
        .unwrap_err();
    assert!(matches!(err, DubError::NotFound(_)));
    assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_removes_record_and_blobs() {
    let dir = tempfile::tempdir().unwrap();
    let media: Arc<dyn MediaTools> = Arc::new(StubMedia::with_audio(4096));
    let orchestrator = orchestrator_with(dir.path(), media).await;

    let (path, size) = upload_blob(&orchestrator).await;
    let owner = Uuid::new_v4();
    let job = orchestrator
        .submit(request(owner, path.clone(), size, "en", "hi"))
        .await
        .unwrap();
    orchestrator.run(job.id).await.unwrap();

    let completed = orchestrator.store().get(job.id).await.unwrap();
    let output = completed.processed_file_path.clone().unwrap();
    assert!(output.exists());

    // A different user cannot delete the job
    let err = orchestrator
        .delete_job(job.id, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, DubError::Forbidden(_)));

    orchestrator.delete_job(job.id, owner).await.unwrap();
    assert!(!path.exists());
    assert!(!output.exists());
    let err = orchestrator.store().get(job.id).await.unwrap_err();
    assert!(matches!(err, DubError::NotFound(_)));
}
