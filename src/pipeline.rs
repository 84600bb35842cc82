// Job orchestration
//
// One background task per accepted upload runs the ordered stage sequence,
// mutating only its own job record. Stages are best-effort-with-fallback:
// provider failures are recovered locally with a degraded output, and only
// the inability to produce any video artifact at all fails the job.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::emotion;
use crate::error::{DubError, Result};
use crate::job::{Job, JobRequest, JobStore, ProcessingStep};
use crate::lipsync::{LipSyncEngine, RemoteLipSyncEngine};
use crate::media::{MediaTools, MediaToolsFactory};
use crate::separation::AudioSeparationEngine;
use crate::storage::{ArtifactKind, BlobStore};
use crate::subtitle;
use crate::synthesis::{ElevenLabsClient, VoiceSynthesizer, SUPPORTED_LANGUAGES};
use crate::transcribe::{sample_text, Transcription, TranscriptionClient, WhisperApiClient};
use crate::translate::TranslationChain;

/// Canonical stage -> progress checkpoints, applied uniformly.
const PROGRESS_AUDIO_EXTRACTION: u8 = 20;
const PROGRESS_EMOTION_DETECTION: u8 = 30;
const PROGRESS_TRANSLATION: u8 = 40;
const PROGRESS_VOICE_SYNTHESIS: u8 = 60;
const PROGRESS_BACKGROUND_MUSIC: u8 = 70;
const PROGRESS_LIP_SYNC: u8 = 80;
const PROGRESS_SUBTITLES: u8 = 85;
const PROGRESS_RENDERING: u8 = 90;

pub struct JobOrchestrator {
    config: Config,
    store: JobStore,
    blobs: BlobStore,
    media: Arc<dyn MediaTools>,
    transcriber: Arc<dyn TranscriptionClient>,
    translator: Arc<TranslationChain>,
    synthesizer: Arc<dyn VoiceSynthesizer>,
    lipsync: Arc<dyn LipSyncEngine>,
    separation: AudioSeparationEngine,
}

impl JobOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        store: JobStore,
        blobs: BlobStore,
        media: Arc<dyn MediaTools>,
        transcriber: Arc<dyn TranscriptionClient>,
        translator: Arc<TranslationChain>,
        synthesizer: Arc<dyn VoiceSynthesizer>,
        lipsync: Arc<dyn LipSyncEngine>,
    ) -> Self {
        let separation =
            AudioSeparationEngine::new(config.separation.clone(), Arc::clone(&media));
        Self {
            config,
            store,
            blobs,
            media,
            transcriber,
            translator,
            synthesizer,
            lipsync,
            separation,
        }
    }

    /// Wire up the production service implementations.
    pub fn from_config(config: Config, store: JobStore, blobs: BlobStore) -> Self {
        let media: Arc<dyn MediaTools> =
            Arc::from(MediaToolsFactory::create(config.media.clone()));
        let transcriber: Arc<dyn TranscriptionClient> =
            Arc::new(WhisperApiClient::new(config.transcription.clone()));
        let translator = Arc::new(TranslationChain::from_config(&config.translation));
        let synthesizer: Arc<dyn VoiceSynthesizer> =
            Arc::new(ElevenLabsClient::new(config.synthesis.clone()));
        let lipsync: Arc<dyn LipSyncEngine> = Arc::new(RemoteLipSyncEngine::new(
            config.lipsync.clone(),
            Arc::clone(&media),
        ));
        Self::new(
            config, store, blobs, media, transcriber, translator, synthesizer, lipsync,
        )
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Accept a landed upload and create the job record. Upload and
    /// validation are not atomic: the blob is already on disk, so a
    /// validation failure removes it before returning.
    pub async fn submit(&self, request: JobRequest) -> Result<Job> {
        if let Err(e) = Self::validate_languages(
            &request.source_language,
            &request.target_language,
        ) {
            self.blobs.remove_blob(&request.original_file_path).await;
            return Err(e);
        }

        let job = self.store.create(request).await;
        info!(
            job_id = %job.id,
            source = %job.source_language,
            target = %job.target_language,
            "Dubbing job accepted"
        );
        Ok(job)
    }

    fn validate_languages(source: &str, target: &str) -> Result<()> {
        for (label, code) in [("source", source), ("target", target)] {
            if !SUPPORTED_LANGUAGES.contains(&code) {
                return Err(DubError::Validation(format!(
                    "Unsupported {} language '{}'",
                    label, code
                )));
            }
        }
        if source == target {
            return Err(DubError::Validation(
                "Source and target languages must be different".to_string(),
            ));
        }
        Ok(())
    }

    /// Launch the pipeline as a supervised detached task. The handle is
    /// discardable: any stage error is caught here and recorded as a failed
    /// job, never propagated across the async boundary, and tokio contains
    /// panics within the task.
    pub fn spawn(self: &Arc<Self>, job_id: Uuid) -> JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = orchestrator.run(job_id).await {
                error!(job_id = %job_id, error = %e, "Dubbing pipeline failed");
                if let Err(store_err) = orchestrator.store.fail(job_id, &e.to_string()).await {
                    error!(job_id = %job_id, error = %store_err, "Could not record job failure");
                }
            }
        })
    }

    /// Execute the ordered stage sequence for one job.
    pub async fn run(&self, job_id: Uuid) -> Result<()> {
        let job = self.store.get(job_id).await?;

        // Stage 1: audio extraction. Degrades internally to an empty
        // waveform, so downstream always has a structurally valid file.
        self.store
            .advance(job_id, PROGRESS_AUDIO_EXTRACTION, ProcessingStep::AudioExtraction)
            .await?;
        let audio_path = self.blobs.artifact_path(job_id, ArtifactKind::ExtractedAudio);
        let container_has_audio = self
            .media
            .has_audio_stream(&job.original_file_path)
            .await
            .unwrap_or(true);
        self.media
            .extract_audio(&job.original_file_path, &audio_path)
            .await?;
        let has_real_audio = container_has_audio
            && fs::metadata(&audio_path)
                .await
                .map(|m| m.len() > self.config.transcription.min_speech_bytes)
                .unwrap_or(false);

        // Stage 2: transcription + emotion tagging. Provider failure or no
        // speech both leave the transcript empty.
        let transcription = match self
            .transcriber
            .transcribe(&audio_path, &job.source_language)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Transcription failed, continuing without transcript");
                None
            }
        };

        let emotion_source = transcription
            .as_ref()
            .map(|t| t.text.clone())
            .unwrap_or_else(|| sample_text(&job.source_language).to_string());
        let emotions = emotion::analyze_text(&emotion_source);
        let dominant = emotion::dominant_emotion(&emotions);
        self.store.record_emotions(job_id, emotions).await?;
        self.store
            .advance(job_id, PROGRESS_EMOTION_DETECTION, ProcessingStep::EmotionDetection)
            .await?;

        // Stage 3: translation. The chain bottoms out in an identity
        // fallback; with no transcript the language-tagged sample line keeps
        // the pipeline voiced.
        let translated = match &transcription {
            Some(t) => {
                self.translator
                    .translate(&t.text, &job.source_language, &job.target_language)
                    .await
            }
            None => sample_text(&job.target_language).to_string(),
        };
        self.store
            .advance(job_id, PROGRESS_TRANSLATION, ProcessingStep::Translation)
            .await?;

        // Stage 4: voice synthesis. Degrades internally to a placeholder
        // waveform. The provider returns compressed audio, so the track is
        // converted to the canonical waveform for mixing and muxing; a failed
        // conversion keeps the raw track.
        let voice_path = self.blobs.artifact_path(job_id, ArtifactKind::Voice);
        self.synthesizer
            .synthesize(
                &translated,
                &job.target_language,
                job.voice_mode,
                dominant,
                &voice_path,
            )
            .await?;
        let voice_wav = self.blobs.artifact_path(job_id, ArtifactKind::VoiceWav);
        let voice_track = match self.media.convert(&voice_path, &voice_wav).await {
            Ok(()) => voice_wav,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Voice track conversion failed, using raw track");
                voice_path.clone()
            }
        };
        self.store
            .advance(job_id, PROGRESS_VOICE_SYNTHESIS, ProcessingStep::VoiceSynthesis)
            .await?;

        // Stage 5: background score preservation. Only worth attempting when
        // the source actually carried audio; any failure keeps the plain
        // voice track.
        let dub_track = if has_real_audio {
            self.preserve_background(job_id, &audio_path, &voice_track)
                .await
        } else {
            voice_track.clone()
        };
        self.store
            .advance(
                job_id,
                PROGRESS_BACKGROUND_MUSIC,
                ProcessingStep::BackgroundMusicExtraction,
            )
            .await?;

        // Stage 6: lip sync. The engine degrades to a pass-through copy; an
        // error here means no video artifact exists and the job cannot
        // continue.
        let lipsynced_path = self.blobs.artifact_path(job_id, ArtifactKind::LipSynced);
        self.lipsync
            .sync(&job.original_file_path, &dub_track, &lipsynced_path)
            .await?;
        self.store
            .advance(job_id, PROGRESS_LIP_SYNC, ProcessingStep::LipSync)
            .await?;

        // Stage 7: subtitle tracks. Pure formatting; failure costs the
        // captions, not the job.
        let caption_source = transcription.unwrap_or_else(|| Transcription {
            text: sample_text(&job.source_language).to_string(),
            segments: Vec::new(),
        });
        let segments = subtitle::segments_from_transcription(&caption_source, &translated);
        match subtitle::write_all(&self.blobs, job_id, &segments).await {
            Ok(artifacts) => self.store.record_subtitles(job_id, artifacts).await?,
            Err(e) => warn!(job_id = %job_id, error = %e, "Subtitle generation failed"),
        }
        self.store
            .advance(job_id, PROGRESS_SUBTITLES, ProcessingStep::SubtitleGeneration)
            .await?;

        // Stage 8: final render. Mux degrades to copying the source video;
        // if even that produced nothing the job fails.
        self.store
            .advance(job_id, PROGRESS_RENDERING, ProcessingStep::Rendering)
            .await?;
        let output_path = self.blobs.artifact_path(job_id, ArtifactKind::Dubbed);
        self.media
            .mux(&lipsynced_path, &dub_track, &output_path)
            .await
            .map_err(|e| DubError::FatalStage(format!("Final render failed: {}", e)))?;

        let rendered = fs::metadata(&output_path)
            .await
            .map(|m| m.len() > 0)
            .unwrap_or(false);
        if !rendered {
            return Err(DubError::FatalStage(
                "Final render produced no output file".to_string(),
            ));
        }

        self.store.complete(job_id, output_path).await?;
        info!(job_id = %job_id, "Dubbing job completed");
        Ok(())
    }

    /// Separate the original score, mix the dubbed voice over it and level
    /// the result. Any failure degrades to the plain voice track.
    async fn preserve_background(
        &self,
        job_id: Uuid,
        audio_path: &std::path::Path,
        voice_path: &std::path::Path,
    ) -> PathBuf {
        let vocals_path = self.blobs.artifact_path(job_id, ArtifactKind::Vocals);
        let background_path = self.blobs.artifact_path(job_id, ArtifactKind::Background);
        let mixed_path = self.blobs.artifact_path(job_id, ArtifactKind::MixedAudio);
        let dub_path = self.blobs.artifact_path(job_id, ArtifactKind::DubTrack);

        let attempt = async {
            let stems = self
                .separation
                .separate(audio_path, &vocals_path, &background_path)
                .await?;
            self.separation
                .mix(voice_path, &stems.background, &mixed_path)
                .await?;
            self.media.normalize(&mixed_path, &dub_path).await?;
            Ok::<PathBuf, DubError>(dub_path.clone())
        };

        match attempt.await {
            Ok(dub) => dub,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Background preservation failed, using voice track only");
                voice_path.to_path_buf()
            }
        }
    }

    /// Delete a job record and its owned blobs, best effort.
    pub async fn delete_job(&self, job_id: Uuid, owner_id: Uuid) -> Result<()> {
        self.store.get_owned(job_id, owner_id).await?;
        let job = self.store.delete(job_id).await?;
        self.blobs
            .remove_job_blobs(job_id, &job.original_file_path)
            .await;
        info!(job_id = %job_id, "Job deleted");
        Ok(())
    }
}
