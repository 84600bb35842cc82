use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::info;
use uuid::Uuid;

use crate::emotion::split_sentences;
use crate::error::Result;
use crate::job::SubtitleArtifacts;
use crate::storage::{ArtifactKind, BlobStore};
use crate::transcribe::Transcription;

/// Estimated segment length when transcription timestamps are unavailable.
const ESTIMATED_SEGMENT_SECS: f64 = 3.0;

/// One caption segment. `translated_text` carries the dubbed-language line
/// alongside the source line when both exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(default)]
    pub translated_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SubtitleDocument {
    version: String,
    subtitles: Vec<SubtitleSegment>,
}

/// Build segments from a transcription's own timestamps, or estimate a fixed
/// cadence from sentence splits when the provider returned plain text.
pub fn segments_from_transcription(
    transcription: &Transcription,
    translated_text: &str,
) -> Vec<SubtitleSegment> {
    let mut segments: Vec<SubtitleSegment> = if !transcription.segments.is_empty() {
        transcription
            .segments
            .iter()
            .map(|s| SubtitleSegment {
                start: s.start,
                end: s.end,
                text: s.text.trim().to_string(),
                translated_text: String::new(),
            })
            .collect()
    } else {
        split_sentences(&transcription.text)
            .into_iter()
            .enumerate()
            .map(|(i, text)| SubtitleSegment {
                start: i as f64 * ESTIMATED_SEGMENT_SECS,
                end: (i + 1) as f64 * ESTIMATED_SEGMENT_SECS,
                text,
                translated_text: String::new(),
            })
            .collect()
    };

    let translated_sentences = split_sentences(translated_text);
    for (segment, translated) in segments.iter_mut().zip(translated_sentences) {
        segment.translated_text = translated;
    }
    segments
}

/// Line-oriented format with numeric index and `HH:MM:SS,mmm` timestamps.
pub fn format_srt(segments: &[SubtitleSegment]) -> String {
    let mut content = String::new();
    for (index, segment) in segments.iter().enumerate() {
        content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            format_timestamp(segment.start, ','),
            format_timestamp(segment.end, ','),
            caption_line(segment)
        ));
    }
    content
}

/// WebVTT variant: header plus `.` in place of `,`.
pub fn format_vtt(segments: &[SubtitleSegment]) -> String {
    let mut content = String::from("WEBVTT\n\n");
    for (index, segment) in segments.iter().enumerate() {
        content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            format_timestamp(segment.start, '.'),
            format_timestamp(segment.end, '.'),
            caption_line(segment)
        ));
    }
    content
}

pub fn format_json(segments: &[SubtitleSegment]) -> Result<String> {
    let document = SubtitleDocument {
        version: "1.0".to_string(),
        subtitles: segments.to_vec(),
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

/// Inverse of [`format_json`]; `parse_json(format_json(x)) == x`.
pub fn parse_json(content: &str) -> Result<Vec<SubtitleSegment>> {
    let document: SubtitleDocument = serde_json::from_str(content)?;
    Ok(document.subtitles)
}

/// Write all three serializations for a job and return their blob refs.
pub async fn write_all(
    blobs: &BlobStore,
    job_id: Uuid,
    segments: &[SubtitleSegment],
) -> Result<SubtitleArtifacts> {
    let srt = blobs.artifact_path(job_id, ArtifactKind::SubtitleSrt);
    let vtt = blobs.artifact_path(job_id, ArtifactKind::SubtitleVtt);
    let json = blobs.artifact_path(job_id, ArtifactKind::SubtitleJson);

    fs::write(&srt, format_srt(segments)).await?;
    fs::write(&vtt, format_vtt(segments)).await?;
    fs::write(&json, format_json(segments)?).await?;

    info!(job_id = %job_id, segments = segments.len(), "Subtitle tracks written");
    Ok(SubtitleArtifacts { srt, vtt, json })
}

fn caption_line(segment: &SubtitleSegment) -> &str {
    if segment.translated_text.is_empty() {
        segment.text.trim()
    } else {
        segment.translated_text.trim()
    }
}

fn format_timestamp(seconds: f64, millis_separator: char) -> String {
    let total_milliseconds = (seconds * 1000.0) as u64;
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!(
        "{:02}:{:02}:{:02}{}{:03}",
        hours, minutes, secs, millis_separator, millis
    )
}

pub async fn read_segments<P: AsRef<Path>>(path: P) -> Result<Vec<SubtitleSegment>> {
    let content = fs::read_to_string(path).await?;
    parse_json(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcribe::TranscriptSegment;

    fn segments() -> Vec<SubtitleSegment> {
        vec![
            SubtitleSegment {
                start: 0.0,
                end: 2.4,
                text: "Hello there.".to_string(),
                translated_text: "नमस्ते।".to_string(),
            },
            SubtitleSegment {
                start: 2.4,
                end: 65.123,
                text: "How are you?".to_string(),
                translated_text: String::new(),
            },
        ]
    }

    #[test]
    fn test_srt_timestamp_format() {
        assert_eq!(format_timestamp(0.0, ','), "00:00:00,000");
        assert_eq!(format_timestamp(65.123, ','), "00:01:05,123");
        assert_eq!(format_timestamp(3661.5, ','), "01:01:01,500");
    }

    #[test]
    fn test_srt_and_vtt_layout() {
        let srt = format_srt(&segments());
        assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:02,400\nनमस्ते।\n"));

        let vtt = format_vtt(&segments());
        assert!(vtt.starts_with("WEBVTT\n\n"));
        assert!(vtt.contains("00:01:05.123"));
        assert!(!vtt.contains("00:01:05,123"));
    }

    #[test]
    fn test_json_round_trip() {
        let original = segments();
        let json = format_json(&original).unwrap();
        let parsed = parse_json(&json).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_segments_from_plain_text_use_estimated_timing() {
        let transcription = Transcription {
            text: "First sentence. Second sentence. Third one!".to_string(),
            segments: Vec::new(),
        };
        let segments = segments_from_transcription(&transcription, "पहला वाक्य। दूसरा वाक्य।");
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1].start, 3.0);
        assert_eq!(segments[1].end, 6.0);
        assert_eq!(segments[0].translated_text, "पहला वाक्य।");
        assert!(segments[2].translated_text.is_empty());
    }

    #[test]
    fn test_segments_prefer_real_timestamps() {
        let transcription = Transcription {
            text: "Hello.".to_string(),
            segments: vec![TranscriptSegment {
                start: 1.5,
                end: 4.25,
                text: " Hello. ".to_string(),
            }],
        };
        let segments = segments_from_transcription(&transcription, "");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start, 1.5);
        assert_eq!(segments[0].text, "Hello.");
    }
}
