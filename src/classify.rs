use crate::{
    config::Config,
    document::Page,
    engine::{ClassicalRequest, EngineKind, EngineSet},
    quality::{TextCandidate, word_count},
    util::preview,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextType {
    Printed,
    Handwritten,
    Code,
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub text_type: TextType,
    /// The classical probe, kept so the cascade does not repeat the call.
    /// `None` when the probe engine failed.
    pub probe: Option<TextCandidate>,
}

/// Runs one classical probe on the (classical-preprocessed) page and derives
/// the text type from it. A failing probe yields `Printed`, never an error.
pub fn classify(cfg: &Config, engines: &EngineSet, page: &Page, lang: &str) -> Classification {
    let req = ClassicalRequest::for_text(&cfg.engines.classical, lang);
    let probe = match engines.classical.recognize(&page.image, &req) {
        Ok(text) => TextCandidate::new(text, EngineKind::Tesseract),
        Err(err) => {
            warn!(
                "page {} classification probe failed, assuming printed: {err:#}",
                page.index
            );
            return Classification {
                text_type: TextType::Printed,
                probe: None,
            };
        }
    };

    let text_type = if cfg.classifier.detect_code
        && has_code_indicator(&cfg.classifier.code_indicators, &probe.text)
    {
        TextType::Code
    } else {
        printed_or_handwritten(&probe, cfg.classifier.min_printed_words)
    };

    info!(
        "page {} classified {:?} (probe valid={} words={} text={:?})",
        page.index,
        text_type,
        probe.is_valid,
        word_count(&probe.text),
        preview(&probe.text, 60)
    );

    Classification {
        text_type,
        probe: Some(probe),
    }
}

pub fn has_code_indicator(indicators: &[String], text: &str) -> bool {
    indicators
        .iter()
        .any(|ind| !ind.is_empty() && text.contains(ind.as_str()))
}

pub fn printed_or_handwritten(probe: &TextCandidate, min_printed_words: usize) -> TextType {
    if !probe.is_valid || word_count(&probe.text) < min_printed_words {
        TextType::Handwritten
    } else {
        TextType::Printed
    }
}
