use serde::{Deserialize, Serialize};

use crate::job::EmotionTag;

/// Estimated seconds per sentence when no real alignment data exists.
const SECONDS_PER_SENTENCE: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Happy,
    Sad,
    Angry,
    Fearful,
    Surprised,
    Calm,
    Curious,
    Neutral,
}

impl Emotion {
    pub const ALL: [Emotion; 8] = [
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Fearful,
        Emotion::Surprised,
        Emotion::Calm,
        Emotion::Curious,
        Emotion::Neutral,
    ];
}

/// Fixed emotion -> keyword lexicon. Exclamation marks score like any other
/// keyword. Intentionally simple; the contract is sentence -> label +
/// confidence, and the classifier behind it is swappable.
const EMOTION_KEYWORDS: [(Emotion, &[&str]); 6] = [
    (
        Emotion::Happy,
        &[
            "happy", "joy", "excited", "wonderful", "great", "amazing", "love", "fantastic", "!",
        ],
    ),
    (
        Emotion::Sad,
        &[
            "sad", "sorry", "unfortunately", "tragic", "terrible", "awful", "cry", "tears",
        ],
    ),
    (
        Emotion::Angry,
        &["angry", "furious", "mad", "hate", "damn", "stupid"],
    ),
    (
        Emotion::Fearful,
        &["afraid", "scared", "fear", "terrified", "worried", "anxious"],
    ),
    (
        Emotion::Surprised,
        &["wow", "incredible", "unbelievable", "shocked", "astonishing", "!"],
    ),
    (
        Emotion::Calm,
        &["calm", "peaceful", "relaxed", "serene", "quiet", "gentle"],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmotionScore {
    pub emotion: Emotion,
    pub confidence: f64,
}

/// Rule-based keyword classifier for one sentence. Confidence is
/// `min(matches / 3, 1)` with a 0.5 floor when nothing matches (weakly
/// neutral); a trailing question mark overrides the label to curious.
pub fn analyze_sentence(sentence: &str) -> EmotionScore {
    let lowered = sentence.to_lowercase();

    let mut max_score = 0usize;
    let mut detected = Emotion::Neutral;

    for (emotion, keywords) in EMOTION_KEYWORDS {
        let score = keywords.iter().filter(|k| lowered.contains(**k)).count();
        if score > max_score {
            max_score = score;
            detected = emotion;
        }
    }

    if lowered.contains('?') {
        detected = Emotion::Curious;
        max_score = max_score.max(1);
    }

    let confidence = (max_score as f64 / 3.0).min(1.0);
    EmotionScore {
        emotion: detected,
        confidence: if confidence > 0.0 { confidence } else { 0.5 },
    }
}

/// Split on sentence terminators and tag each sentence, approximating
/// timestamps at a fixed cadence absent real alignment data.
pub fn analyze_text(text: &str) -> Vec<EmotionTag> {
    split_sentences(text)
        .into_iter()
        .enumerate()
        .map(|(i, sentence)| {
            let score = analyze_sentence(&sentence);
            EmotionTag {
                timestamp: i as f64 * SECONDS_PER_SENTENCE,
                emotion: score.emotion,
                confidence: score.confidence,
                text: sentence,
            }
        })
        .collect()
}

/// Highest-confidence non-neutral label, used to bias voice synthesis.
pub fn dominant_emotion(tags: &[EmotionTag]) -> Option<Emotion> {
    tags.iter()
        .filter(|t| t.emotion != Emotion::Neutral)
        .max_by(|a, b| {
            a.confidence
                .partial_cmp(&b.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|t| t.emotion)
}

pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?' | '।' | '。') {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_match() {
        let score = analyze_sentence("What a wonderful and amazing day, I love it.");
        assert_eq!(score.emotion, Emotion::Happy);
        assert!((score.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_exclamation_scores_without_a_lexicon_word() {
        let score = analyze_sentence("We won the match!");
        assert_eq!(score.emotion, Emotion::Happy);
        assert!((score.confidence - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_question_overrides_to_curious() {
        let score = analyze_sentence("Are you happy about this?");
        assert_eq!(score.emotion, Emotion::Curious);
    }

    #[test]
    fn test_no_match_is_weakly_neutral() {
        let score = analyze_sentence("The meeting starts at noon.");
        assert_eq!(score.emotion, Emotion::Neutral);
        assert!((score.confidence - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_confidence_scales_with_matches() {
        let score = analyze_sentence("I am so sad and sorry, this is terrible.");
        assert_eq!(score.emotion, Emotion::Sad);
        assert!((score.confidence - 1.0).abs() < f64::EPSILON);

        let score = analyze_sentence("I am sad today.");
        assert!((score.confidence - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_analyze_text_timestamps() {
        let tags = analyze_text("Hello there. This is amazing! Is it raining?");
        assert_eq!(tags.len(), 3);
        assert_eq!(tags[0].timestamp, 0.0);
        assert_eq!(tags[1].timestamp, 3.0);
        assert_eq!(tags[2].timestamp, 6.0);
        assert_eq!(tags[2].emotion, Emotion::Curious);
    }

    #[test]
    fn test_dominant_emotion_skips_neutral() {
        let tags = analyze_text("The meeting starts at noon. This is terrible and awful.");
        assert_eq!(dominant_emotion(&tags), Some(Emotion::Sad));

        let tags = analyze_text("The meeting starts at noon.");
        assert_eq!(dominant_emotion(&tags), None);
    }
}
