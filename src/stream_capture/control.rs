//! Control-phrase detection for the cassette-deck protocol.
//!
//! Ported from `stream_capture.py`'s `DEFAULT_CONTROL_PHRASES` and
//! `detect_control_phrase`.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlSignal {
    Send,
    Pause,
    Resume,
    Play,
    Stop,
}

impl ControlSignal {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Play => "play",
            Self::Stop => "stop",
        }
    }
}

/// Maps each control signal to its list of trigger phrases.
#[derive(Debug, Clone)]
pub struct ControlPhrases(HashMap<ControlSignal, Vec<String>>);

impl ControlPhrases {
    pub fn get(&self, signal: ControlSignal) -> &[String] {
        self.0.get(&signal).map(Vec::as_slice).unwrap_or(&[])
    }

    fn iter(&self) -> impl Iterator<Item = (ControlSignal, &str)> {
        self.0
            .iter()
            .flat_map(|(sig, phrases)| phrases.iter().map(move |p| (*sig, p.as_str())))
    }
}

impl Default for ControlPhrases {
    fn default() -> Self {
        let mut map = HashMap::new();
        map.insert(
            ControlSignal::Send,
            vec![
                "send".into(),
                "i'm done".into(),
                "go ahead".into(),
                "that's all".into(),
            ],
        );
        map.insert(
            ControlSignal::Pause,
            vec!["pause".into(), "hold on".into()],
        );
        map.insert(
            ControlSignal::Resume,
            vec!["resume".into(), "continue".into(), "unpause".into()],
        );
        map.insert(
            ControlSignal::Play,
            vec!["play back".into(), "repeat".into(), "read that".into()],
        );
        map.insert(
            ControlSignal::Stop,
            vec!["stop".into(), "cancel".into(), "discard".into()],
        );
        Self(map)
    }
}

/// Detect whether `text` contains a control phrase. Case-insensitive;
/// single-word phrases require a whole-word match (punctuation stripped
/// from each word first); multi-word phrases use substring match.
pub fn detect_control_phrase(text: &str, phrases: &ControlPhrases) -> Option<ControlSignal> {
    let text_lower = text.to_lowercase();
    let words_no_punct: Vec<String> = text_lower
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| c.is_ascii_punctuation()).to_string())
        .collect();

    for (signal, phrase) in phrases.iter() {
        let phrase_lower = phrase.to_lowercase();
        if phrase_lower.contains(' ') {
            if text_lower.contains(&phrase_lower) {
                return Some(signal);
            }
        } else if words_no_punct.iter().any(|w| w == &phrase_lower) {
            return Some(signal);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_single_word_with_punctuation_stripped() {
        let phrases = ControlPhrases::default();
        assert_eq!(
            detect_control_phrase("okay, pause.", &phrases),
            Some(ControlSignal::Pause)
        );
    }

    #[test]
    fn detects_multi_word_phrase_as_substring() {
        let phrases = ControlPhrases::default();
        assert_eq!(
            detect_control_phrase("please play back that last bit", &phrases),
            Some(ControlSignal::Play)
        );
    }

    #[test]
    fn whole_word_match_rejects_partial_word() {
        let phrases = ControlPhrases::default();
        // "stopper" should not match the single-word phrase "stop"
        assert_eq!(detect_control_phrase("stopper", &phrases), None);
    }

    #[test]
    fn no_match_returns_none() {
        let phrases = ControlPhrases::default();
        assert_eq!(detect_control_phrase("just chatting here", &phrases), None);
    }
}
