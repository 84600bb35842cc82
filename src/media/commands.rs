use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::error::{DubError, Result};

/// Abstract media tool command representation.
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    pub fn copy_video(self) -> Self {
        self.video_codec("copy")
    }

    pub fn no_video(self) -> Self {
        self.arg("-vn")
    }

    pub fn audio_sample_rate(self, rate: u32) -> Self {
        self.arg("-ar").arg(rate.to_string())
    }

    pub fn audio_channels(self, channels: u32) -> Self {
        self.arg("-ac").arg(channels.to_string())
    }

    pub fn audio_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-af").arg(filter)
    }

    pub fn filter_complex<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-filter_complex").arg(filter)
    }

    pub fn map<S: Into<String>>(self, stream: S) -> Self {
        self.arg("-map").arg(stream)
    }

    /// Execute, discarding stdout.
    pub async fn execute(&self) -> Result<()> {
        self.execute_capture().await.map(|_| ())
    }

    /// Execute and return stdout for probe-style commands.
    pub async fn execute_capture(&self) -> Result<String> {
        debug!(
            "Executing media command ({}): {} {:?}",
            self.description, self.binary_path, self.args
        );

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| DubError::Media(format!("Failed to execute media tool: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DubError::Media(format!(
                "{} failed: {}",
                self.description, stderr
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Builder for the media operations the pipeline needs.
pub struct MediaCommandBuilder {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl MediaCommandBuilder {
    pub fn new<S1: Into<String>, S2: Into<String>>(ffmpeg_path: S1, ffprobe_path: S2) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Probe for the first audio stream; prints `audio` when present.
    pub fn probe_audio_stream<P: AsRef<Path>>(&self, video_path: P) -> MediaCommand {
        MediaCommand::new(&self.ffprobe_path, "Audio stream probe")
            .arg("-v")
            .arg("error")
            .arg("-select_streams")
            .arg("a:0")
            .arg("-show_entries")
            .arg("stream=codec_type")
            .arg("-of")
            .arg("default=noprint_wrappers=1:nokey=1")
            .arg(video_path.as_ref().to_string_lossy().to_string())
    }

    /// Mono 16kHz PCM extraction, the canonical downstream format.
    pub fn extract_audio<P: AsRef<Path>>(&self, video_path: P, audio_path: P) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Audio extraction")
            .input(video_path)
            .no_video()
            .audio_codec("pcm_s16le")
            .audio_sample_rate(16000)
            .audio_channels(1)
            .overwrite()
            .output(audio_path)
    }

    pub fn convert_audio<P: AsRef<Path>>(&self, input_path: P, output_path: P) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Audio conversion")
            .input(input_path)
            .audio_codec("pcm_s16le")
            .audio_sample_rate(16000)
            .overwrite()
            .output(output_path)
    }

    /// Replace the audio track, keeping the video stream untouched.
    pub fn mux<P: AsRef<Path>>(
        &self,
        video_path: P,
        audio_path: P,
        output_path: P,
    ) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Audio track replacement")
            .input(video_path)
            .input(audio_path)
            .copy_video()
            .audio_codec("aac")
            .map("0:v:0")
            .map("1:a:0")
            .arg("-shortest")
            .overwrite()
            .output(output_path)
    }

    pub fn copy_video<P: AsRef<Path>>(&self, input_path: P, output_path: P) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Video stream copy")
            .input(input_path)
            .arg("-c")
            .arg("copy")
            .overwrite()
            .output(output_path)
    }

    /// Mid channel (L+R): carries most vocal content on typical mixes.
    pub fn extract_mid_channel<P: AsRef<Path>>(&self, input_path: P, output_path: P) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Mid channel extraction")
            .input(input_path)
            .audio_filter("pan=mono|c0=0.5*c0+0.5*c1")
            .overwrite()
            .output(output_path)
    }

    /// Side channel (L-R): approximates the instrumental bed.
    pub fn extract_side_channel<P: AsRef<Path>>(&self, input_path: P, output_path: P) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Side channel extraction")
            .input(input_path)
            .audio_filter("pan=mono|c0=0.5*c0-0.5*c1")
            .overwrite()
            .output(output_path)
    }

    pub fn mix<P: AsRef<Path>>(
        &self,
        vocals_path: P,
        background_path: P,
        output_path: P,
        vocals_gain: f64,
        background_gain: f64,
    ) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Audio mix")
            .input(vocals_path)
            .input(background_path)
            .filter_complex(format!(
                "[0:a]volume={}[a1];[1:a]volume={}[a2];[a1][a2]amix=inputs=2:duration=first:dropout_transition=2",
                vocals_gain, background_gain
            ))
            .overwrite()
            .output(output_path)
    }

    pub fn normalize<P: AsRef<Path>>(&self, input_path: P, output_path: P) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Loudness normalization")
            .input(input_path)
            .audio_filter("loudnorm=I=-16:TP=-1.5:LRA=11")
            .overwrite()
            .output(output_path)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_audio_args() {
        let builder = MediaCommandBuilder::new("ffmpeg", "ffprobe");
        let cmd = builder.extract_audio("in.mp4", "out.wav");
        assert_eq!(
            cmd.args,
            vec![
                "-i", "in.mp4", "-vn", "-c:a", "pcm_s16le", "-ar", "16000", "-ac", "1", "-y",
                "out.wav"
            ]
        );
    }

    #[test]
    fn test_mux_maps_streams() {
        let builder = MediaCommandBuilder::new("ffmpeg", "ffprobe");
        let cmd = builder.mux("in.mp4", "voice.wav", "out.mp4");
        assert!(cmd.args.contains(&"-map".to_string()));
        assert!(cmd.args.contains(&"0:v:0".to_string()));
        assert!(cmd.args.contains(&"1:a:0".to_string()));
        assert!(cmd.args.contains(&"-shortest".to_string()));
    }

    #[test]
    fn test_probe_uses_ffprobe_binary() {
        let builder = MediaCommandBuilder::new("ffmpeg", "ffprobe");
        let cmd = builder.probe_audio_stream("in.mp4");
        assert_eq!(cmd.binary_path, "ffprobe");
    }
}
