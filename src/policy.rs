use crate::{
    classify::TextType,
    config::{CascadePolicyKind, Config},
    engine::EngineKind,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    /// First valid candidate wins.
    Sequential,
    /// Run every listed engine, keep the best scoring valid candidate.
    CompareAll,
    /// Classical engine only, no fallback.
    CodeBlock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizerKind {
    Generic,
    Code,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadePlan {
    pub text_type: TextType,
    pub kind: PlanKind,
    pub engines: Vec<EngineKind>,
    /// Tried only when no engine in `engines` produced a valid candidate.
    pub fallback: Option<EngineKind>,
    pub normalizer: NormalizerKind,
}

pub fn decide(cfg: &Config, text_type: TextType) -> CascadePlan {
    if text_type == TextType::Code {
        return CascadePlan {
            text_type,
            kind: PlanKind::CodeBlock,
            engines: vec![EngineKind::Tesseract],
            fallback: None,
            normalizer: NormalizerKind::Code,
        };
    }

    match cfg.cascade.policy {
        CascadePolicyKind::Sequential => CascadePlan {
            text_type,
            kind: PlanKind::Sequential,
            engines: sequential_order(text_type),
            fallback: None,
            normalizer: NormalizerKind::Generic,
        },
        CascadePolicyKind::CompareAll => CascadePlan {
            text_type,
            kind: PlanKind::CompareAll,
            engines: cfg.cascade.compare_engines.clone(),
            fallback: (text_type == TextType::Handwritten).then_some(EngineKind::Trocr),
            normalizer: NormalizerKind::Generic,
        },
    }
}

/// Classical first unless the page looks handwritten; multilingual always last.
pub fn sequential_order(text_type: TextType) -> Vec<EngineKind> {
    match text_type {
        TextType::Handwritten => vec![
            EngineKind::Trocr,
            EngineKind::Tesseract,
            EngineKind::Easyocr,
        ],
        TextType::Printed => vec![
            EngineKind::Tesseract,
            EngineKind::Trocr,
            EngineKind::Easyocr,
        ],
        TextType::Code => vec![EngineKind::Tesseract],
    }
}
