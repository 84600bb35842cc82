use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::LipSyncConfig;
use crate::error::{DubError, Result};
use crate::media::MediaTools;
use std::sync::Arc;

/// Lip alignment seam. The remote model service is optional: when it is not
/// configured or not reachable the stage degrades to a structural
/// pass-through copy. An error from `sync` means no video artifact could be
/// produced at all, which aborts the job.
#[async_trait]
pub trait LipSyncEngine: Send + Sync {
    async fn sync(&self, video_path: &Path, audio_path: &Path, output_path: &Path) -> Result<()>;
}

pub struct RemoteLipSyncEngine {
    client: Client,
    config: LipSyncConfig,
    media: Arc<dyn MediaTools>,
}

impl RemoteLipSyncEngine {
    pub fn new(config: LipSyncConfig, media: Arc<dyn MediaTools>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("HTTP client creation should not fail");
        Self {
            client,
            config,
            media,
        }
    }

    async fn sync_remote(
        &self,
        video_path: &Path,
        audio_path: &Path,
        output_path: &Path,
    ) -> Result<()> {
        let video = tokio::fs::read(video_path).await?;
        let audio = tokio::fs::read(audio_path).await?;

        let form = reqwest::multipart::Form::new()
            .part(
                "video",
                reqwest::multipart::Part::bytes(video)
                    .file_name("input.mp4")
                    .mime_str("video/mp4")
                    .map_err(|e| DubError::Provider(format!("Invalid MIME type: {}", e)))?,
            )
            .part(
                "audio",
                reqwest::multipart::Part::bytes(audio)
                    .file_name("voice.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| DubError::Provider(format!("Invalid MIME type: {}", e)))?,
            );

        let url = format!("{}/v1/sync", self.config.endpoint);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DubError::Provider(format!("Lip-sync request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(DubError::Provider(format!(
                "Lip-sync API error: {}",
                response.status()
            )));
        }

        let synced = response
            .bytes()
            .await
            .map_err(|e| DubError::Provider(format!("Failed to read lip-sync output: {}", e)))?;
        if synced.is_empty() {
            return Err(DubError::Provider("Empty lip-sync response".to_string()));
        }

        tokio::fs::write(output_path, &synced).await?;
        Ok(())
    }
}

#[async_trait]
impl LipSyncEngine for RemoteLipSyncEngine {
    async fn sync(&self, video_path: &Path, audio_path: &Path, output_path: &Path) -> Result<()> {
        if !self.config.endpoint.is_empty() {
            match self.sync_remote(video_path, audio_path, output_path).await {
                Ok(()) => {
                    info!(output = %output_path.display(), "Lip sync completed");
                    return Ok(());
                }
                Err(e) => {
                    warn!(error = %e, "Lip-sync service unavailable, passing video through");
                }
            }
        }

        // Structural pass-through: downstream rendering still needs a video
        // artifact even without real alignment.
        self.media
            .copy_video(video_path, output_path)
            .await
            .map_err(|e| {
                DubError::FatalStage(format!("Could not produce lip-sync artifact: {}", e))
            })?;
        Ok(())
    }
}
