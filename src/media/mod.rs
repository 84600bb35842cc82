// Media processing abstraction
//
// A thin wrapper over ffmpeg/ffprobe built from an abstract command
// representation. Every operation downstream stages depend on degrades to a
// structurally valid output instead of failing, with the single exception of
// copy_video which is the last-resort render path.

pub mod commands;
pub mod ffmpeg;

use async_trait::async_trait;
use std::path::Path;

pub use commands::*;
pub use ffmpeg::*;

use crate::config::MediaConfig;
use crate::error::Result;

/// Main trait for media tool operations.
#[async_trait]
pub trait MediaTools: Send + Sync {
    /// Probe the container for an audio stream.
    async fn has_audio_stream(&self, video_path: &Path) -> Result<bool>;

    /// Extract a mono 16kHz waveform, the canonical format downstream
    /// transcription and synthesis expect. On any failure the output is a
    /// minimal valid empty waveform, never an error.
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<()>;

    /// Convert between the audio container formats used internally.
    async fn convert(&self, input_path: &Path, output_path: &Path) -> Result<()>;

    /// Replace the video's audio track, preserving the video stream. Falls
    /// back to copying the original video unchanged.
    async fn mux(&self, video_path: &Path, audio_path: &Path, output_path: &Path) -> Result<()>;

    /// Stream-copy a video container.
    async fn copy_video(&self, input_path: &Path, output_path: &Path) -> Result<()>;

    /// Cheap stereo mid/side split into vocal and background stems.
    async fn separate_channels(
        &self,
        audio_path: &Path,
        vocals_path: &Path,
        background_path: &Path,
    ) -> Result<()>;

    /// Gain-weighted linear mix of two tracks.
    async fn mix(
        &self,
        vocals_path: &Path,
        background_path: &Path,
        output_path: &Path,
        vocals_gain: f64,
        background_gain: f64,
    ) -> Result<()>;

    /// Loudness normalization pass; returns the input untouched on failure.
    async fn normalize(&self, audio_path: &Path, output_path: &Path) -> Result<()>;

    /// Check the media binaries are runnable.
    fn check_availability(&self) -> Result<()>;
}

/// Factory for creating media tool instances.
pub struct MediaToolsFactory;

impl MediaToolsFactory {
    pub fn create(config: MediaConfig) -> Box<dyn MediaTools> {
        Box::new(ffmpeg::FfmpegMediaTools::new(config))
    }
}
