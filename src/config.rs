use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DubError, Result};

fn default_min_speech_bytes() -> u64 {
    1024
}

fn default_vocals_gain() -> f64 {
    1.0
}

fn default_background_gain() -> f64 {
    0.3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub media: MediaConfig,
    pub transcription: TranscriptionConfig,
    pub translation: TranslationConfig,
    pub synthesis: SynthesisConfig,
    pub lipsync: LipSyncConfig,
    pub separation: SeparationConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to
    pub bind_addr: String,
    /// Upload size ceiling in megabytes, enforced at the transport layer
    pub max_upload_mb: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for uploads and derived artifacts
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub ffmpeg_path: String,
    /// Path to ffprobe binary
    pub ffprobe_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Whisper-compatible speech-to-text endpoint
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Audio files at or below this size are treated as silent and the
    /// remote call is skipped entirely
    #[serde(default = "default_min_speech_bytes")]
    pub min_speech_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    /// Primary provider endpoint (Google-translate style REST)
    pub primary_endpoint: String,
    pub primary_api_key: String,
    /// Free-tier fallback provider endpoint (MyMemory style REST)
    pub fallback_endpoint: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// ElevenLabs-compatible text-to-speech endpoint
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LipSyncConfig {
    /// Lip-sync model service endpoint; empty disables the remote call and
    /// the stage degrades to a pass-through copy
    pub endpoint: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeparationConfig {
    /// Path to the stem-separation binary (e.g. spleeter); empty falls
    /// back to the ffmpeg channel-difference heuristic
    pub binary_path: String,
    #[serde(default = "default_vocals_gain")]
    pub vocals_gain: f64,
    #[serde(default = "default_background_gain")]
    pub background_gain: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret for bearer tokens
    pub secret: String,
    /// Token lifetime in seconds
    pub token_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_addr: "127.0.0.1:8080".to_string(),
                max_upload_mb: 500,
            },
            storage: StorageConfig {
                root: PathBuf::from(".dubwave/uploads"),
            },
            media: MediaConfig {
                ffmpeg_path: "ffmpeg".to_string(),
                ffprobe_path: "ffprobe".to_string(),
            },
            transcription: TranscriptionConfig {
                endpoint: "https://api.openai.com".to_string(),
                api_key: String::new(),
                model: "whisper-1".to_string(),
                timeout_secs: 60,
                min_speech_bytes: default_min_speech_bytes(),
            },
            translation: TranslationConfig {
                primary_endpoint: "https://translation.googleapis.com".to_string(),
                primary_api_key: String::new(),
                fallback_endpoint: "https://api.mymemory.translated.net".to_string(),
                timeout_secs: 30,
            },
            synthesis: SynthesisConfig {
                endpoint: "https://api.elevenlabs.io".to_string(),
                api_key: String::new(),
                model: "eleven_multilingual_v2".to_string(),
                timeout_secs: 60,
            },
            lipsync: LipSyncConfig {
                endpoint: String::new(),
                api_key: String::new(),
                timeout_secs: 120,
            },
            separation: SeparationConfig {
                binary_path: String::new(),
                vocals_gain: default_vocals_gain(),
                background_gain: default_background_gain(),
            },
            auth: AuthConfig {
                secret: "change-me".to_string(),
                token_ttl_secs: 24 * 60 * 60,
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DubError::Config(format!("Failed to read config file: {}", e)))?;

        Ok(toml::from_str(&content)?)
    }

    /// Explicit path when given, otherwise `config.toml` in `dir` when one
    /// exists, otherwise runnable defaults.
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let local = dir.join("config.toml");
        if local.exists() {
            tracing::info!(path = %local.display(), "Loading configuration");
            return Self::from_file(local);
        }
        Ok(Self::default())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| DubError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| DubError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate values a misconfigured deployment would otherwise only
    /// discover mid-pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.server.max_upload_mb == 0 {
            return Err(DubError::Config(
                "server.max_upload_mb must be greater than zero".to_string(),
            ));
        }
        if self.auth.secret.is_empty() {
            return Err(DubError::Config("auth.secret must not be empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.separation.vocals_gain)
            || !(0.0..=2.0).contains(&self.separation.background_gain)
        {
            return Err(DubError::Config(
                "separation gains must be within 0.0..=2.0".to_string(),
            ));
        }
        // Every voice mode and emotion must resolve to synthesis settings,
        // and every supported language to a voice identity.
        crate::synthesis::validate_tables()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_round_trip() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.server.bind_addr, config.server.bind_addr);
        assert_eq!(parsed.transcription.min_speech_bytes, 1024);
    }

    #[test]
    fn test_zero_upload_ceiling_rejected() {
        let mut config = Config::default();
        config.server.max_upload_mb = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_discover_prefers_local_file_and_defaults_otherwise() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::discover(None, dir.path()).unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:8080");

        let mut saved = Config::default();
        saved.server.bind_addr = "0.0.0.0:9000".to_string();
        saved.save_to_file(dir.path().join("config.toml")).unwrap();
        let config = Config::discover(None, dir.path()).unwrap();
        assert_eq!(config.server.bind_addr, "0.0.0.0:9000");
    }

    #[test]
    fn test_discover_reports_corrupt_local_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "server = [broken").unwrap();
        assert!(Config::discover(None, dir.path()).is_err());
    }

    #[test]
    fn test_default_config_replaces_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "server = [broken").unwrap();
        assert!(Config::from_file(&path).is_err());

        Config::default().save_to_file(&path).unwrap();
        let reloaded = Config::from_file(&path).unwrap();
        assert!(reloaded.validate().is_ok());
    }
}
