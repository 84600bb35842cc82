use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DubError, Result};

/// Accepted video container extensions for uploads.
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["mp4", "mov", "avi", "mkv", "webm"];

/// Kinds of derived artifacts a job owns. Filenames are a pure function of
/// `(job_id, kind)` so lookup and cleanup never need the job record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    ExtractedAudio,
    Voice,
    VoiceWav,
    MixedAudio,
    DubTrack,
    Vocals,
    Background,
    LipSynced,
    Dubbed,
    SubtitleSrt,
    SubtitleVtt,
    SubtitleJson,
}

impl ArtifactKind {
    const ALL: [ArtifactKind; 12] = [
        ArtifactKind::ExtractedAudio,
        ArtifactKind::Voice,
        ArtifactKind::VoiceWav,
        ArtifactKind::MixedAudio,
        ArtifactKind::DubTrack,
        ArtifactKind::Vocals,
        ArtifactKind::Background,
        ArtifactKind::LipSynced,
        ArtifactKind::Dubbed,
        ArtifactKind::SubtitleSrt,
        ArtifactKind::SubtitleVtt,
        ArtifactKind::SubtitleJson,
    ];

    fn file_name(&self, job_id: Uuid) -> String {
        match self {
            ArtifactKind::ExtractedAudio => format!("{}_audio.wav", job_id),
            ArtifactKind::Voice => format!("{}_voice.mp3", job_id),
            ArtifactKind::VoiceWav => format!("{}_voice.wav", job_id),
            ArtifactKind::MixedAudio => format!("{}_mixed.wav", job_id),
            ArtifactKind::DubTrack => format!("{}_dub.wav", job_id),
            ArtifactKind::Vocals => format!("{}_vocals.wav", job_id),
            ArtifactKind::Background => format!("{}_background.wav", job_id),
            ArtifactKind::LipSynced => format!("{}_lipsynced.mp4", job_id),
            ArtifactKind::Dubbed => format!("{}_dubbed.mp4", job_id),
            ArtifactKind::SubtitleSrt => format!("{}_subtitles.srt", job_id),
            ArtifactKind::SubtitleVtt => format!("{}_subtitles.vtt", job_id),
            ArtifactKind::SubtitleJson => format!("{}_subtitles.json", job_id),
        }
    }

    fn dir(&self) -> &'static str {
        match self {
            ArtifactKind::ExtractedAudio
            | ArtifactKind::Voice
            | ArtifactKind::VoiceWav
            | ArtifactKind::MixedAudio
            | ArtifactKind::DubTrack => "audio",
            ArtifactKind::Vocals | ArtifactKind::Background => "separated",
            ArtifactKind::LipSynced | ArtifactKind::Dubbed => "processed",
            ArtifactKind::SubtitleSrt
            | ArtifactKind::SubtitleVtt
            | ArtifactKind::SubtitleJson => "subtitles",
        }
    }
}

/// Local-disk blob store. Uploads and derived artifacts live under a single
/// root, namespaced by job id so concurrent jobs never collide.
#[derive(Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub async fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        for dir in ["uploads", "audio", "separated", "processed", "subtitles"] {
            fs::create_dir_all(root.join(dir)).await?;
        }
        Ok(Self { root })
    }

    /// Validate the upload's container extension against the allowed set.
    pub fn validate_extension(file_name: &str) -> Result<String> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .ok_or_else(|| {
                DubError::Validation(format!("File '{}' has no extension", file_name))
            })?;

        if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(DubError::Validation(format!(
                "Unsupported video format '.{}'. Allowed: {}",
                ext,
                ALLOWED_EXTENSIONS.join(", ")
            )));
        }
        Ok(ext)
    }

    /// Persist an uploaded video blob under a fresh upload id.
    pub async fn save_upload(&self, file_name: &str, data: &[u8]) -> Result<PathBuf> {
        let ext = Self::validate_extension(file_name)?;
        let path = self
            .root
            .join("uploads")
            .join(format!("{}_original.{}", Uuid::new_v4(), ext));
        fs::write(&path, data).await?;
        debug!(path = %path.display(), bytes = data.len(), "Stored uploaded blob");
        Ok(path)
    }

    pub fn artifact_path(&self, job_id: Uuid, kind: ArtifactKind) -> PathBuf {
        self.root.join(kind.dir()).join(kind.file_name(job_id))
    }

    pub async fn remove_blob(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to delete blob");
            }
        }
    }

    /// Best-effort cleanup of everything a job owns: failures are logged,
    /// never surfaced.
    pub async fn remove_job_blobs(&self, job_id: Uuid, original: &Path) {
        self.remove_blob(original).await;
        for kind in ArtifactKind::ALL {
            self.remove_blob(&self.artifact_path(job_id, kind)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_validation() {
        assert_eq!(BlobStore::validate_extension("movie.MP4").unwrap(), "mp4");
        assert!(BlobStore::validate_extension("notes.txt").is_err());
        assert!(BlobStore::validate_extension("no_extension").is_err());
    }

    #[tokio::test]
    async fn test_artifact_paths_are_job_scoped() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path()).await.unwrap();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_ne!(
            store.artifact_path(a, ArtifactKind::Voice),
            store.artifact_path(b, ArtifactKind::Voice)
        );
    }

    #[tokio::test]
    async fn test_save_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path()).await.unwrap();
        let path = store.save_upload("clip.mp4", b"data").await.unwrap();
        assert!(path.exists());

        let job_id = Uuid::new_v4();
        store.remove_job_blobs(job_id, &path).await;
        assert!(!path.exists());
    }
}
