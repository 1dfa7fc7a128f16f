use crate::engine::EngineKind;
use serde::{Deserialize, Serialize};

const QUOTE_CHARS: &[char] = &['"', '\'', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}'];

/// One engine's answer for one page. `is_valid` is derived from `text` alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextCandidate {
    pub text: String,
    pub source_engine: EngineKind,
    pub is_valid: bool,
}

impl TextCandidate {
    pub fn new(text: impl Into<String>, source_engine: EngineKind) -> Self {
        let text = text.into();
        let is_valid = is_valid(&text);
        Self {
            text,
            source_engine,
            is_valid,
        }
    }

    pub fn score(&self) -> usize {
        score(&self.text)
    }
}

/// The quality gate: more than five characters and at least one letter.
pub fn is_valid(text: &str) -> bool {
    text.chars().count() > 5 && text.chars().any(char::is_alphabetic)
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn quote_count(text: &str) -> usize {
    text.chars().filter(|c| QUOTE_CHARS.contains(c)).count()
}

pub fn score(text: &str) -> usize {
    word_count(text) + 2 * quote_count(text)
}

/// Best valid candidate by `score`; on a tie the earlier candidate wins.
pub fn pick_best(candidates: &[TextCandidate]) -> Option<&TextCandidate> {
    let mut best: Option<&TextCandidate> = None;
    for c in candidates.iter().filter(|c| c.is_valid) {
        match best {
            Some(b) if c.score() <= b.score() => {}
            _ => best = Some(c),
        }
    }
    best
}
