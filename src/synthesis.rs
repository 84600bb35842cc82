use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

use crate::config::SynthesisConfig;
use crate::emotion::Emotion;
use crate::error::{DubError, Result};
use crate::job::VoiceMode;
use crate::media::silent_wav_bytes;

/// Languages the service accepts in upload requests. Every entry resolves to
/// a voice identity; this is checked at startup.
pub const SUPPORTED_LANGUAGES: [&str; 13] = [
    "en", "hi", "es", "fr", "de", "pt", "zh", "ja", "ko", "ar", "bn", "ta", "te",
];

/// Prosody parameters for one synthesis request. Voice character is driven
/// by these declarative tuples, not by code branches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoiceSettings {
    pub stability: f64,
    pub similarity_boost: f64,
    pub style: f64,
    pub use_speaker_boost: bool,
}

/// Fixed language -> provider voice identity table. One multilingual
/// identity is shared by the languages without a dedicated voice.
pub fn voice_for_language(language: &str) -> &'static str {
    match language {
        "en" => "21m00Tcm4TlvDq8ikWAM",
        "es" => "EXAVITQu4vr4xnSDxMaL",
        "fr" => "ErXwobaYiN019PkySvjV",
        "de" => "VR6AewLTigWG4xSOukaG",
        "pt" => "pqHfZKP75CvOlQylNhV4",
        "zh" => "yoZ06aMxZJJ28mfd3POQ",
        "ja" => "bVMeCyTHy58xNoL34h3p",
        "ko" => "iP95p4xoKVk53GoZ742B",
        // Multilingual identity covers hi/ar/bn/ta/te
        _ => "pNInz6obpgDQGcFmaJgB",
    }
}

pub fn settings_for_mode(mode: VoiceMode) -> VoiceSettings {
    match mode {
        VoiceMode::Natural => VoiceSettings {
            stability: 0.5,
            similarity_boost: 0.75,
            style: 0.0,
            use_speaker_boost: true,
        },
        VoiceMode::Expressive => VoiceSettings {
            stability: 0.3,
            similarity_boost: 0.85,
            style: 0.5,
            use_speaker_boost: true,
        },
        VoiceMode::Calm => VoiceSettings {
            stability: 0.7,
            similarity_boost: 0.6,
            style: 0.0,
            use_speaker_boost: false,
        },
        VoiceMode::Energetic => VoiceSettings {
            stability: 0.4,
            similarity_boost: 0.8,
            style: 0.6,
            use_speaker_boost: true,
        },
    }
}

/// When emotion data is available the dominant detected emotion refines the
/// base mode.
pub fn settings_for_emotion(emotion: Emotion) -> VoiceSettings {
    match emotion {
        Emotion::Happy => VoiceSettings {
            stability: 0.4,
            similarity_boost: 0.8,
            style: 0.6,
            use_speaker_boost: true,
        },
        Emotion::Sad => VoiceSettings {
            stability: 0.7,
            similarity_boost: 0.6,
            style: 0.3,
            use_speaker_boost: false,
        },
        Emotion::Angry => VoiceSettings {
            stability: 0.3,
            similarity_boost: 0.9,
            style: 0.8,
            use_speaker_boost: true,
        },
        Emotion::Fearful => VoiceSettings {
            stability: 0.5,
            similarity_boost: 0.7,
            style: 0.4,
            use_speaker_boost: true,
        },
        Emotion::Surprised => VoiceSettings {
            stability: 0.35,
            similarity_boost: 0.85,
            style: 0.7,
            use_speaker_boost: true,
        },
        Emotion::Calm => VoiceSettings {
            stability: 0.75,
            similarity_boost: 0.65,
            style: 0.1,
            use_speaker_boost: false,
        },
        Emotion::Curious => VoiceSettings {
            stability: 0.45,
            similarity_boost: 0.75,
            style: 0.5,
            use_speaker_boost: true,
        },
        Emotion::Neutral => settings_for_mode(VoiceMode::Natural),
    }
}

/// Resolve the settings for one synthesis request: the dominant detected
/// emotion wins over the requested base mode when present.
pub fn resolve_settings(mode: VoiceMode, emotion: Option<Emotion>) -> VoiceSettings {
    match emotion {
        Some(e) if e != Emotion::Neutral => settings_for_emotion(e),
        _ => settings_for_mode(mode),
    }
}

/// Startup check: every enum value and supported language must resolve to an
/// entry instead of falling through silently.
pub fn validate_tables() -> Result<()> {
    for mode in VoiceMode::ALL {
        let s = settings_for_mode(mode);
        if !(0.0..=1.0).contains(&s.stability) || !(0.0..=1.0).contains(&s.style) {
            return Err(DubError::Config(format!(
                "Voice settings for mode {:?} out of range",
                mode
            )));
        }
    }
    for emotion in Emotion::ALL {
        let s = settings_for_emotion(emotion);
        if !(0.0..=1.0).contains(&s.stability) || !(0.0..=1.0).contains(&s.style) {
            return Err(DubError::Config(format!(
                "Voice settings for emotion {:?} out of range",
                emotion
            )));
        }
    }
    for language in SUPPORTED_LANGUAGES {
        if voice_for_language(language).is_empty() {
            return Err(DubError::Config(format!(
                "No voice identity for language '{}'",
                language
            )));
        }
    }
    Ok(())
}

/// Text-to-speech seam. Writes synthesized audio to `output_path`; provider
/// failure degrades to a placeholder waveform, never an error.
#[async_trait]
pub trait VoiceSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        target_language: &str,
        mode: VoiceMode,
        emotion: Option<Emotion>,
        output_path: &Path,
    ) -> Result<()>;
}

/// ElevenLabs-compatible HTTP synthesis client.
pub struct ElevenLabsClient {
    client: Client,
    config: SynthesisConfig,
}

impl ElevenLabsClient {
    pub fn new(config: SynthesisConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("HTTP client creation should not fail");
        Self { client, config }
    }

    async fn request_audio(
        &self,
        text: &str,
        target_language: &str,
        settings: VoiceSettings,
    ) -> Result<Vec<u8>> {
        let voice_id = voice_for_language(target_language);
        let url = format!("{}/v1/text-to-speech/{}", self.config.endpoint, voice_id);

        let body = json!({
            "text": text,
            "model_id": self.config.model,
            "voice_settings": settings,
        });

        let response = self
            .client
            .post(&url)
            .header("Accept", "audio/mpeg")
            .header("xi-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DubError::Provider(format!("Synthesis request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(DubError::Provider(format!(
                "Synthesis API error: {}",
                response.status()
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| DubError::Provider(format!("Failed to read synthesis audio: {}", e)))?;

        if audio.is_empty() {
            return Err(DubError::Provider("Empty synthesis response".to_string()));
        }
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl VoiceSynthesizer for ElevenLabsClient {
    async fn synthesize(
        &self,
        text: &str,
        target_language: &str,
        mode: VoiceMode,
        emotion: Option<Emotion>,
        output_path: &Path,
    ) -> Result<()> {
        let settings = resolve_settings(mode, emotion);
        info!(
            language = target_language,
            ?mode,
            ?emotion,
            chars = text.len(),
            "Synthesizing voice"
        );

        match self.request_audio(text, target_language, settings).await {
            Ok(audio) => {
                fs::write(output_path, &audio).await?;
                info!(bytes = audio.len(), output = %output_path.display(), "Voice synthesized");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Synthesis failed, writing placeholder waveform");
                fs::write(output_path, silent_wav_bytes()).await?;
                Ok(())
            }
        }
    }
}
