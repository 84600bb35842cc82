use axum::body::Body;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path as FsPath;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use super::AppState;
use crate::auth::AuthUser;
use crate::error::{DubError, Result};
use crate::job::{Job, JobRequest, JobStatus, VideoType, VoiceMode};

/// Accept a video upload and start the dubbing pipeline. Responds as soon as
/// the job record exists; processing continues in the background.
pub async fn upload(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut source_language: Option<String> = None;
    let mut target_language: Option<String> = None;
    let mut video_type: Option<String> = None;
    let mut voice_mode: Option<String> = None;
    let mut duration_minutes: Option<u64> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DubError::Validation(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "video" => {
                let file_name = field
                    .file_name()
                    .map(|s| s.to_string())
                    .ok_or_else(|| {
                        DubError::Validation("Video field has no filename".to_string())
                    })?;
                let data = field.bytes().await.map_err(|e| {
                    DubError::Validation(format!("Failed to read upload: {}", e))
                })?;
                file = Some((file_name, data.to_vec()));
            }
            "sourceLanguage" => source_language = Some(read_text(field).await?),
            "targetLanguage" => target_language = Some(read_text(field).await?),
            "videoType" => video_type = Some(read_text(field).await?),
            "voiceMode" => voice_mode = Some(read_text(field).await?),
            "duration" => {
                let text = read_text(field).await?;
                duration_minutes = Some(text.parse().map_err(|_| {
                    DubError::Validation(format!("Invalid duration '{}'", text))
                })?);
            }
            _ => {}
        }
    }

    let (file_name, data) = file
        .ok_or_else(|| DubError::Validation("Missing 'video' file field".to_string()))?;
    if data.is_empty() {
        return Err(DubError::Validation("Uploaded video is empty".to_string()));
    }
    let source_language = require(source_language, "sourceLanguage")?;
    let target_language = require(target_language, "targetLanguage")?;

    // Enum fields are checked before the blob lands so a bad request leaves
    // nothing on disk.
    let video_type = VideoType::parse(&require(video_type, "videoType")?)?;
    let voice_mode = match voice_mode {
        Some(mode) => VoiceMode::parse(&mode)?,
        None => VoiceMode::Natural,
    };

    let file_size = data.len() as u64;
    let path = state
        .orchestrator
        .blobs()
        .save_upload(&file_name, &data)
        .await?;

    let job = state
        .orchestrator
        .submit(JobRequest {
            owner_id: user.user_id,
            original_file_name: file_name,
            original_file_path: path,
            source_language,
            target_language,
            voice_mode,
            video_type,
            duration: duration_minutes.map(|m| m * 60),
            file_size,
        })
        .await?;

    state.orchestrator.spawn(job.id);

    Ok((StatusCode::ACCEPTED, Json(job_detail(&job))))
}

pub async fn status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>> {
    let job = state
        .orchestrator
        .store()
        .get_owned(id, user.user_id)
        .await?;
    Ok(Json(job_detail(&job)))
}

pub async fn list(State(state): State<AppState>, user: AuthUser) -> Result<Json<Value>> {
    let jobs = state
        .orchestrator
        .store()
        .list_for_owner(user.user_id)
        .await;
    Ok(Json(json!({ "videos": jobs })))
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    /// `video` (default), `srt`, `vtt`, or `json`
    pub format: Option<String>,
}

pub async fn download(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response> {
    let job = state
        .orchestrator
        .store()
        .get_owned(id, user.user_id)
        .await?;

    let format = query.format.as_deref().unwrap_or("video");
    let (path, content_type, download_name) = match format {
        "video" => {
            if job.status != JobStatus::Completed {
                return Err(DubError::Validation(format!(
                    "Job {} is not completed yet",
                    id
                )));
            }
            // Prefer the dubbed rendition; a missing blob falls back to the
            // original upload, relabeled so the caller can tell.
            match job.processed_file_path.clone().filter(|p| p.exists()) {
                Some(path) => (
                    path,
                    "video/mp4",
                    format!("dubbed_{}", job.original_file_name),
                ),
                None => (
                    job.original_file_path.clone(),
                    "video/mp4",
                    format!("original_{}", job.original_file_name),
                ),
            }
        }
        "srt" | "vtt" | "json" => {
            let subtitles = job.subtitles.as_ref().ok_or_else(|| {
                DubError::NotFound(format!("Job {} has no subtitles", id))
            })?;
            let (path, content_type) = match format {
                "srt" => (subtitles.srt.clone(), "application/x-subrip"),
                "vtt" => (subtitles.vtt.clone(), "text/vtt"),
                _ => (subtitles.json.clone(), "application/json"),
            };
            (path, content_type, format!("{}_subtitles.{}", id, format))
        }
        other => {
            return Err(DubError::Validation(format!(
                "Unknown download format '{}'",
                other
            )))
        }
    };

    stream_file(&path, content_type, &download_name).await
}

pub async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.orchestrator.delete_job(id, user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn stream_file(path: &FsPath, content_type: &str, download_name: &str) -> Result<Response> {
    let file = tokio::fs::File::open(path).await.map_err(|_| {
        DubError::NotFound(format!("Artifact {} is missing", path.display()))
    })?;
    let stream = ReaderStream::new(file);

    let response = Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", download_name),
        )
        .body(Body::from_stream(stream))
        .map_err(|e| DubError::Media(format!("Failed to build response: {}", e)))?;
    Ok(response)
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String> {
    field
        .text()
        .await
        .map_err(|e| DubError::Validation(format!("Malformed form field: {}", e)))
}

fn require(value: Option<String>, name: &str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| DubError::Validation(format!("Missing '{}' field", name)))
}

fn job_detail(job: &Job) -> Value {
    json!({
        "id": job.id,
        "fileName": job.original_file_name,
        "sourceLanguage": job.source_language,
        "targetLanguage": job.target_language,
        "status": job.status,
        "progress": job.progress,
        "processingSteps": job.processing_steps,
        "videoType": job.video_type,
        "voiceMode": job.voice_mode,
        "duration": job.duration,
        "fileSize": job.file_size,
        "emotions": job.emotions,
        "hasSubtitles": job.subtitles.is_some(),
        "errorMessage": job.error_message,
        "createdAt": job.created_at,
        "updatedAt": job.updated_at,
    })
}
