use crate::{
    config::{self, RomanizedHints, ScriptRange, Substitution},
    engine::{LanguageDetector, Transliterator},
    util::preview,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const AUTO: &str = "auto";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageDecision {
    /// A language code or `auto`.
    pub requested: String,
    /// Never `auto`.
    pub resolved: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedBy {
    Explicit,
    Script,
    RomanizedHint,
    Detector,
    Baseline,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub decision: LanguageDecision,
    /// Input text, or its native-script form when transliteration applied.
    pub text: String,
    pub transliterated: bool,
    pub method: ResolvedBy,
}

pub struct LanguageResolver<'a> {
    cfg: &'a config::Language,
    detector: &'a dyn LanguageDetector,
    transliterator: &'a dyn Transliterator,
}

impl<'a> LanguageResolver<'a> {
    pub fn new(
        cfg: &'a config::Language,
        detector: &'a dyn LanguageDetector,
        transliterator: &'a dyn Transliterator,
    ) -> Self {
        Self {
            cfg,
            detector,
            transliterator,
        }
    }

    pub fn resolve(&self, requested: &str, text: &str) -> Resolution {
        let (resolved, method) = if requested == AUTO {
            self.infer(text)
        } else if self.cfg.is_supported(requested) {
            (requested.to_string(), ResolvedBy::Explicit)
        } else {
            warn!(
                "unsupported source language {requested:?}, using {}",
                self.cfg.baseline
            );
            (self.cfg.baseline.clone(), ResolvedBy::Baseline)
        };

        info!("source language {requested} -> {resolved} ({method:?})");

        let (text, transliterated) = self.to_native_script(&resolved, text);
        Resolution {
            decision: LanguageDecision {
                requested: requested.to_string(),
                resolved,
            },
            text,
            transliterated,
            method,
        }
    }

    fn infer(&self, text: &str) -> (String, ResolvedBy) {
        if text.trim().is_empty() {
            return (self.cfg.baseline.clone(), ResolvedBy::Baseline);
        }
        if let Some(lang) = script_language(&self.cfg.scripts, text) {
            return (lang.to_string(), ResolvedBy::Script);
        }
        if let Some(lang) = romanized_hint(&self.cfg.romanized_hints, text) {
            return (lang.to_string(), ResolvedBy::RomanizedHint);
        }
        match self.detector.detect(text) {
            Ok(code) if self.cfg.is_supported(&code) => (code, ResolvedBy::Detector),
            Ok(code) => {
                debug!("detected unsupported language {code:?}");
                (self.cfg.baseline.clone(), ResolvedBy::Baseline)
            }
            Err(err) => {
                warn!("language detection failed: {err:#}");
                (self.cfg.baseline.clone(), ResolvedBy::Baseline)
            }
        }
    }

    /// Romanized text for a language with a native scheme is rewritten and
    /// converted. A failing transliterator leaves the text as it was.
    fn to_native_script(&self, lang: &str, text: &str) -> (String, bool) {
        let Some(scheme) = self.cfg.schemes.get(lang) else {
            return (text.to_string(), false);
        };
        if !is_latin_only(text) {
            return (text.to_string(), false);
        }

        let rewritten = romanized_rewrite(&self.cfg.romanized_rewrites, text);
        match self.transliterator.transliterate(&rewritten, scheme) {
            Ok(native) => {
                debug!(
                    "transliterated {:?} -> {:?}",
                    preview(text, 40),
                    preview(&native, 40)
                );
                (native, true)
            }
            Err(err) => {
                warn!("transliteration to {scheme} failed: {err:#}");
                (text.to_string(), false)
            }
        }
    }
}

/// Target languages are never inferred.
pub fn resolve_target(cfg: &config::Language, target: &str) -> String {
    if cfg.is_supported(target) {
        target.to_string()
    } else {
        warn!("unsupported target language {target:?}, using {}", cfg.baseline);
        cfg.baseline.clone()
    }
}

fn is_latin_letter(c: char) -> bool {
    c.is_ascii_alphabetic() || (c.is_alphabetic() && ('\u{00C0}'..='\u{024F}').contains(&c))
}

/// At least one letter, and every letter is Latin.
pub fn is_latin_only(text: &str) -> bool {
    let mut any = false;
    for c in text.chars().filter(|c| c.is_alphabetic()) {
        if !is_latin_letter(c) {
            return false;
        }
        any = true;
    }
    any
}

pub fn script_language<'a>(scripts: &'a [ScriptRange], text: &str) -> Option<&'a str> {
    scripts
        .iter()
        .find(|r| text.chars().any(|c| (r.start..=r.end).contains(&(c as u32))))
        .map(|r| r.language.as_str())
}

/// Language whose Romanized lexicon covers enough of the text's words.
pub fn romanized_hint<'a>(hints: &'a [RomanizedHints], text: &str) -> Option<&'a str> {
    if !is_latin_only(text) {
        return None;
    }
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    if words.is_empty() {
        return None;
    }

    hints
        .iter()
        .find(|h| {
            let hits = words.iter().filter(|w| h.words.contains(w)).count();
            hits as f32 / words.len() as f32 >= h.min_hint_ratio
        })
        .map(|h| h.language.as_str())
}

/// Lowercases, then applies each literal rewrite in order.
pub fn romanized_rewrite(rewrites: &[Substitution], text: &str) -> String {
    rewrites
        .iter()
        .fold(text.to_lowercase(), |acc, r| acc.replace(&r.pattern, &r.replacement))
}
