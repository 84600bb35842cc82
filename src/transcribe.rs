use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::TranscriptionConfig;
use crate::error::{DubError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
}

impl Transcription {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Speech-to-text seam. Returns `None` when there is no speech to transcribe
/// (placeholder/silent input); provider failures surface as
/// [`DubError::Provider`] and are recovered by the pipeline stage.
#[async_trait]
pub trait TranscriptionClient: Send + Sync {
    async fn transcribe(
        &self,
        audio_path: &Path,
        source_language: &str,
    ) -> Result<Option<Transcription>>;
}

/// Whisper-compatible HTTP transcription client.
pub struct WhisperApiClient {
    client: Client,
    config: TranscriptionConfig,
}

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
    #[serde(default)]
    segments: Vec<TranscriptSegment>,
}

impl WhisperApiClient {
    pub fn new(config: TranscriptionConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("HTTP client creation should not fail");
        Self { client, config }
    }
}

#[async_trait]
impl TranscriptionClient for WhisperApiClient {
    async fn transcribe(
        &self,
        audio_path: &Path,
        source_language: &str,
    ) -> Result<Option<Transcription>> {
        let metadata = tokio::fs::metadata(audio_path).await?;
        if metadata.len() <= self.config.min_speech_bytes {
            // Placeholder/silent waveform; skip the remote call entirely.
            debug!(
                bytes = metadata.len(),
                "Audio below speech threshold, treating as no speech"
            );
            return Ok(None);
        }

        let audio_bytes = tokio::fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.wav".to_string());

        let part = reqwest::multipart::Part::bytes(audio_bytes)
            .file_name(file_name)
            .mime_str("audio/wav")
            .map_err(|e| DubError::Provider(format!("Invalid audio MIME type: {}", e)))?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.config.model.clone())
            .text("language", source_language.to_string())
            .text("response_format", "verbose_json");

        let url = format!("{}/v1/audio/transcriptions", self.config.endpoint);
        debug!(url = %url, "Sending transcription request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DubError::Provider(format!("Transcription request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DubError::Provider(format!(
                "Transcription API error {}: {}",
                status, body
            )));
        }

        let parsed: WhisperResponse = response
            .json()
            .await
            .map_err(|e| DubError::Provider(format!("Failed to parse transcription: {}", e)))?;

        if parsed.text.trim().is_empty() {
            return Err(DubError::Provider("Empty transcription result".to_string()));
        }

        info!(
            language = source_language,
            chars = parsed.text.len(),
            segments = parsed.segments.len(),
            "Transcription completed"
        );

        Ok(Some(Transcription {
            text: parsed.text,
            segments: parsed.segments,
        }))
    }
}

/// Fixed language-tagged sample sentences, substituted when no transcript
/// exists so the pipeline always has some text to voice.
pub fn sample_text(language: &str) -> &'static str {
    match language {
        "hi" => "नमस्ते! यह एक परीक्षण वीडियो है। हम इस वीडियो को हिंदी में डब कर रहे हैं।",
        "es" => "Hola! Este es un video de prueba. Estamos doblando este video al español.",
        "fr" => "Bonjour! Ceci est une vidéo de test. Nous doublons cette vidéo en français.",
        "de" => "Hallo! Dies ist ein Testvideo. Wir synchronisieren dieses Video auf Deutsch.",
        "ja" => "こんにちは！これはテストビデオです。このビデオを日本語に吹き替えています。",
        "zh" => "你好！这是一个测试视频。我们正在将此视频配音为中文。",
        _ => "Hello! This is a test video. We are dubbing this video.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_text_is_language_tagged() {
        assert!(sample_text("hi").contains("हिंदी"));
        assert!(sample_text("de").contains("Testvideo"));
        // Unknown codes fall back to English
        assert!(sample_text("xx").starts_with("Hello!"));
    }

    #[tokio::test]
    async fn test_small_audio_skips_remote_call() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("tiny.wav");
        tokio::fs::write(&audio, crate::media::silent_wav_bytes())
            .await
            .unwrap();

        // Endpoint is unroutable; the call must not be attempted at all.
        let client = WhisperApiClient::new(TranscriptionConfig {
            endpoint: "http://127.0.0.1:1".to_string(),
            api_key: String::new(),
            model: "whisper-1".to_string(),
            timeout_secs: 1,
            min_speech_bytes: 1024,
        });

        let result = client.transcribe(&audio, "en").await.unwrap();
        assert!(result.is_none());
    }
}
