use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use crate::emotion::Emotion;
use crate::error::{DubError, Result};

/// Lifecycle of a dubbing job. `Uploading` is transient: jobs are created
/// already in `Processing` once the blob has landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Uploading,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoType {
    Movie,
    Short,
}

impl VideoType {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "movie" => Ok(VideoType::Movie),
            "short" => Ok(VideoType::Short),
            other => Err(DubError::Validation(format!(
                "Invalid video type '{}'. Valid types: movie, short",
                other
            ))),
        }
    }
}

/// Named prosody preset controlling synthesis parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceMode {
    Natural,
    Expressive,
    Calm,
    Energetic,
}

impl VoiceMode {
    pub const ALL: [VoiceMode; 4] = [
        VoiceMode::Natural,
        VoiceMode::Expressive,
        VoiceMode::Calm,
        VoiceMode::Energetic,
    ];

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "natural" => Ok(VoiceMode::Natural),
            "expressive" => Ok(VoiceMode::Expressive),
            "calm" => Ok(VoiceMode::Calm),
            "energetic" => Ok(VoiceMode::Energetic),
            other => Err(DubError::Validation(format!(
                "Invalid voice mode '{}'. Valid modes: natural, expressive, calm, energetic",
                other
            ))),
        }
    }
}

/// Pipeline stages in execution order. Each maps to exactly one flag in
/// [`ProcessingSteps`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStep {
    Upload,
    AudioExtraction,
    EmotionDetection,
    Translation,
    VoiceSynthesis,
    BackgroundMusicExtraction,
    LipSync,
    SubtitleGeneration,
    Rendering,
}

impl ProcessingStep {
    pub const ALL: [ProcessingStep; 9] = [
        ProcessingStep::Upload,
        ProcessingStep::AudioExtraction,
        ProcessingStep::EmotionDetection,
        ProcessingStep::Translation,
        ProcessingStep::VoiceSynthesis,
        ProcessingStep::BackgroundMusicExtraction,
        ProcessingStep::LipSync,
        ProcessingStep::SubtitleGeneration,
        ProcessingStep::Rendering,
    ];

    fn index(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(0)
    }
}

/// Ordered boolean step flags. Each flips false -> true exactly once, in
/// pipeline order, and never reverts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingSteps {
    pub upload: bool,
    pub audio_extraction: bool,
    pub emotion_detection: bool,
    pub translation: bool,
    pub voice_synthesis: bool,
    pub background_music_extraction: bool,
    pub lip_sync: bool,
    pub subtitle_generation: bool,
    pub rendering: bool,
}

impl ProcessingSteps {
    pub fn get(&self, step: ProcessingStep) -> bool {
        match step {
            ProcessingStep::Upload => self.upload,
            ProcessingStep::AudioExtraction => self.audio_extraction,
            ProcessingStep::EmotionDetection => self.emotion_detection,
            ProcessingStep::Translation => self.translation,
            ProcessingStep::VoiceSynthesis => self.voice_synthesis,
            ProcessingStep::BackgroundMusicExtraction => self.background_music_extraction,
            ProcessingStep::LipSync => self.lip_sync,
            ProcessingStep::SubtitleGeneration => self.subtitle_generation,
            ProcessingStep::Rendering => self.rendering,
        }
    }

    /// A step may only be marked once every earlier step is already set.
    pub fn can_set(&self, step: ProcessingStep) -> bool {
        ProcessingStep::ALL[..step.index()]
            .iter()
            .all(|earlier| self.get(*earlier))
    }

    pub fn set(&mut self, step: ProcessingStep) {
        match step {
            ProcessingStep::Upload => self.upload = true,
            ProcessingStep::AudioExtraction => self.audio_extraction = true,
            ProcessingStep::EmotionDetection => self.emotion_detection = true,
            ProcessingStep::Translation => self.translation = true,
            ProcessingStep::VoiceSynthesis => self.voice_synthesis = true,
            ProcessingStep::BackgroundMusicExtraction => {
                self.background_music_extraction = true
            }
            ProcessingStep::LipSync => self.lip_sync = true,
            ProcessingStep::SubtitleGeneration => self.subtitle_generation = true,
            ProcessingStep::Rendering => self.rendering = true,
        }
    }

    pub fn completed_count(&self) -> usize {
        ProcessingStep::ALL.iter().filter(|s| self.get(**s)).count()
    }
}

/// Per-sentence emotion tag produced once by the emotion analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionTag {
    pub timestamp: f64,
    pub emotion: Emotion,
    pub confidence: f64,
    pub text: String,
}

/// Subtitle artifact references, set once by the subtitle generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleArtifacts {
    pub srt: PathBuf,
    pub vtt: PathBuf,
    pub json: PathBuf,
}

/// One user-submitted dubbing request and its mutable processing record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub original_file_name: String,
    pub original_file_path: PathBuf,
    pub processed_file_path: Option<PathBuf>,
    pub source_language: String,
    pub target_language: String,
    pub status: JobStatus,
    pub progress: u8,
    pub processing_steps: ProcessingSteps,
    pub voice_mode: VoiceMode,
    pub video_type: VideoType,
    pub duration: Option<u64>,
    pub file_size: u64,
    pub emotions: Vec<EmotionTag>,
    pub subtitles: Option<SubtitleArtifacts>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Redacted job view for list responses: no blob paths.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: Uuid,
    pub original_file_name: String,
    pub source_language: String,
    pub target_language: String,
    pub status: JobStatus,
    pub progress: u8,
    pub video_type: VideoType,
    pub voice_mode: VoiceMode,
    pub created_at: DateTime<Utc>,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            original_file_name: job.original_file_name.clone(),
            source_language: job.source_language.clone(),
            target_language: job.target_language.clone(),
            status: job.status,
            progress: job.progress,
            video_type: job.video_type,
            voice_mode: job.voice_mode,
            created_at: job.created_at,
        }
    }
}

/// Request metadata captured at creation time.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub owner_id: Uuid,
    pub original_file_name: String,
    pub original_file_path: PathBuf,
    pub source_language: String,
    pub target_language: String,
    pub voice_mode: VoiceMode,
    pub video_type: VideoType,
    pub duration: Option<u64>,
    pub file_size: u64,
}

/// In-memory job store. Jobs are keyed by their own id and mutated only by
/// the background task that owns them, so a single RwLock suffices: there is
/// no cross-job shared state.
#[derive(Clone, Default)]
pub struct JobStore {
    inner: Arc<RwLock<HashMap<Uuid, Job>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a job that has already accepted its upload: status is
    /// `Processing`, progress 10, with the upload step set.
    pub async fn create(&self, request: JobRequest) -> Job {
        let now = Utc::now();
        let mut steps = ProcessingSteps::default();
        steps.set(ProcessingStep::Upload);

        let job = Job {
            id: Uuid::new_v4(),
            owner_id: request.owner_id,
            original_file_name: request.original_file_name,
            original_file_path: request.original_file_path,
            processed_file_path: None,
            source_language: request.source_language,
            target_language: request.target_language,
            status: JobStatus::Processing,
            progress: 10,
            processing_steps: steps,
            voice_mode: request.voice_mode,
            video_type: request.video_type,
            duration: request.duration,
            file_size: request.file_size,
            emotions: Vec::new(),
            subtitles: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        };

        self.inner.write().await.insert(job.id, job.clone());
        job
    }

    pub async fn get(&self, id: Uuid) -> Result<Job> {
        self.inner
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| DubError::NotFound(format!("Job {} not found", id)))
    }

    /// Fetch a job, enforcing owner scoping. Existence is checked before
    /// ownership so unknown ids surface as 404, not 403.
    pub async fn get_owned(&self, id: Uuid, owner_id: Uuid) -> Result<Job> {
        let job = self.get(id).await?;
        if job.owner_id != owner_id {
            return Err(DubError::Forbidden(format!(
                "Job {} is not owned by the requesting user",
                id
            )));
        }
        Ok(job)
    }

    /// Newest-first summaries for one owner.
    pub async fn list_for_owner(&self, owner_id: Uuid) -> Vec<JobSummary> {
        let guard = self.inner.read().await;
        let mut summaries: Vec<JobSummary> = guard
            .values()
            .filter(|job| job.owner_id == owner_id)
            .map(JobSummary::from)
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        summaries
    }

    /// Advance a running job to a stage checkpoint: bump progress (never
    /// backwards) and mark the stage's step flag. Mutations of terminal jobs
    /// are refused.
    pub async fn advance(&self, id: Uuid, progress: u8, step: ProcessingStep) -> Result<()> {
        self.mutate(id, |job| {
            if !job.processing_steps.can_set(step) {
                warn!(job_id = %id, ?step, "Step flag set out of pipeline order");
            }
            job.progress = job.progress.max(progress.min(100));
            job.processing_steps.set(step);
        })
        .await
    }

    pub async fn record_emotions(&self, id: Uuid, emotions: Vec<EmotionTag>) -> Result<()> {
        self.mutate(id, |job| {
            if job.emotions.is_empty() {
                job.emotions = emotions;
            }
        })
        .await
    }

    pub async fn record_subtitles(&self, id: Uuid, artifacts: SubtitleArtifacts) -> Result<()> {
        self.mutate(id, |job| {
            if job.subtitles.is_none() {
                job.subtitles = Some(artifacts);
            }
        })
        .await
    }

    pub async fn complete(&self, id: Uuid, processed_path: PathBuf) -> Result<()> {
        self.mutate(id, |job| {
            job.status = JobStatus::Completed;
            job.progress = 100;
            job.processed_file_path = Some(processed_path);
        })
        .await
    }

    pub async fn fail(&self, id: Uuid, message: &str) -> Result<()> {
        self.mutate(id, |job| {
            job.status = JobStatus::Failed;
            job.error_message = Some(message.to_string());
        })
        .await
    }

    /// Remove the record. Blob cleanup is the caller's concern.
    pub async fn delete(&self, id: Uuid) -> Result<Job> {
        self.inner
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| DubError::NotFound(format!("Job {} not found", id)))
    }

    async fn mutate<F: FnOnce(&mut Job)>(&self, id: Uuid, apply: F) -> Result<()> {
        let mut guard = self.inner.write().await;
        let job = guard
            .get_mut(&id)
            .ok_or_else(|| DubError::NotFound(format!("Job {} not found", id)))?;
        if job.status.is_terminal() {
            warn!(job_id = %id, status = ?job.status, "Ignoring mutation of terminal job");
            return Ok(());
        }
        apply(job);
        job.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(owner: Uuid) -> JobRequest {
        JobRequest {
            owner_id: owner,
            original_file_name: "clip.mp4".to_string(),
            original_file_path: PathBuf::from("/tmp/clip.mp4"),
            source_language: "en".to_string(),
            target_language: "hi".to_string(),
            voice_mode: VoiceMode::Natural,
            video_type: VideoType::Movie,
            duration: Some(600),
            file_size: 1024,
        }
    }

    #[tokio::test]
    async fn test_create_starts_processing_at_ten_percent() {
        let store = JobStore::new();
        let job = store.create(request(Uuid::new_v4())).await;
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.progress, 10);
        assert!(job.processing_steps.upload);
        assert_eq!(job.processing_steps.completed_count(), 1);
    }

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let store = JobStore::new();
        let job = store.create(request(Uuid::new_v4())).await;

        store
            .advance(job.id, 40, ProcessingStep::AudioExtraction)
            .await
            .unwrap();
        // A lower checkpoint must not move progress backwards
        store
            .advance(job.id, 20, ProcessingStep::EmotionDetection)
            .await
            .unwrap();

        let job = store.get(job.id).await.unwrap();
        assert_eq!(job.progress, 40);
        assert!(job.processing_steps.emotion_detection);
    }

    #[tokio::test]
    async fn test_terminal_jobs_are_immutable() {
        let store = JobStore::new();
        let job = store.create(request(Uuid::new_v4())).await;
        store.fail(job.id, "render failed").await.unwrap();

        store
            .advance(job.id, 90, ProcessingStep::Rendering)
            .await
            .unwrap();
        store
            .complete(job.id, PathBuf::from("/tmp/out.mp4"))
            .await
            .unwrap();

        let job = store.get(job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("render failed"));
        assert!(job.processed_file_path.is_none());
    }

    #[tokio::test]
    async fn test_owner_scoping() {
        let store = JobStore::new();
        let owner = Uuid::new_v4();
        let job = store.create(request(owner)).await;

        assert!(store.get_owned(job.id, owner).await.is_ok());
        let err = store.get_owned(job.id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DubError::Forbidden(_)));

        let err = store.get_owned(Uuid::new_v4(), owner).await.unwrap_err();
        assert!(matches!(err, DubError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_owner_scoped() {
        let store = JobStore::new();
        let owner = Uuid::new_v4();
        let first = store.create(request(owner)).await;
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = store.create(request(owner)).await;
        store.create(request(Uuid::new_v4())).await;

        let listed = store.list_for_owner(owner).await;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }

    #[test]
    fn test_step_ordering_guard() {
        let mut steps = ProcessingSteps::default();
        assert!(steps.can_set(ProcessingStep::Upload));
        assert!(!steps.can_set(ProcessingStep::Translation));

        steps.set(ProcessingStep::Upload);
        steps.set(ProcessingStep::AudioExtraction);
        steps.set(ProcessingStep::EmotionDetection);
        assert!(steps.can_set(ProcessingStep::Translation));
        assert!(!steps.can_set(ProcessingStep::Rendering));
    }
}
