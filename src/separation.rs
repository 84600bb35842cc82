// Audio stem separation
//
// Two interchangeable strategies: an external source-separation model
// (higher quality, may be unavailable) and the ffmpeg channel-difference
// heuristic (always available, lower quality). The engine tries them in
// order and takes the first success.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::SeparationConfig;
use crate::error::{DubError, Result};
use crate::media::MediaTools;

#[derive(Debug, Clone)]
pub struct SeparatedStems {
    pub vocals: PathBuf,
    pub background: PathBuf,
}

pub struct AudioSeparationEngine {
    config: SeparationConfig,
    media: Arc<dyn MediaTools>,
}

impl AudioSeparationEngine {
    pub fn new(config: SeparationConfig, media: Arc<dyn MediaTools>) -> Self {
        Self { config, media }
    }

    /// Split source audio into vocal and background stems so dubbed vocals
    /// can be mixed back over the original score.
    pub async fn separate(
        &self,
        audio_path: &Path,
        vocals_path: &Path,
        background_path: &Path,
    ) -> Result<SeparatedStems> {
        if !self.config.binary_path.is_empty() {
            match self
                .separate_with_model(audio_path, vocals_path, background_path)
                .await
            {
                Ok(stems) => {
                    info!("Stem separation completed with model backend");
                    return Ok(stems);
                }
                Err(e) => {
                    warn!(error = %e, "Model separation unavailable, using channel heuristic");
                }
            }
        }

        self.media
            .separate_channels(audio_path, vocals_path, background_path)
            .await?;
        info!("Stem separation completed with channel heuristic");
        Ok(SeparatedStems {
            vocals: vocals_path.to_path_buf(),
            background: background_path.to_path_buf(),
        })
    }

    /// Gain-weighted mix of dubbed vocals over the (attenuated) original
    /// score. Defaults favor the vocals.
    pub async fn mix(
        &self,
        vocals_path: &Path,
        background_path: &Path,
        output_path: &Path,
    ) -> Result<()> {
        self.media
            .mix(
                vocals_path,
                background_path,
                output_path,
                self.config.vocals_gain,
                self.config.background_gain,
            )
            .await
    }

    async fn separate_with_model(
        &self,
        audio_path: &Path,
        vocals_path: &Path,
        background_path: &Path,
    ) -> Result<SeparatedStems> {
        let out_dir = vocals_path
            .parent()
            .ok_or_else(|| DubError::Media("Invalid stem output path".to_string()))?;

        // spleeter-compatible invocation: 2 stems into the output directory
        let output = Command::new(&self.config.binary_path)
            .arg("separate")
            .arg("-p")
            .arg("spleeter:2stems")
            .arg("-o")
            .arg(out_dir)
            .arg(audio_path)
            .output()
            .await
            .map_err(|e| DubError::Provider(format!("Separation binary not runnable: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DubError::Provider(format!(
                "Stem separation failed: {}",
                stderr
            )));
        }

        let stem = audio_path
            .file_stem()
            .ok_or_else(|| DubError::Media("Invalid audio filename".to_string()))?;
        let model_vocals = out_dir.join(stem).join("vocals.wav");
        let model_background = out_dir.join(stem).join("accompaniment.wav");

        tokio::fs::rename(&model_vocals, vocals_path).await?;
        tokio::fs::rename(&model_background, background_path).await?;

        Ok(SeparatedStems {
            vocals: vocals_path.to_path_buf(),
            background: background_path.to_path_buf(),
        })
    }
}
