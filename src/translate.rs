use crate::{
    config,
    engine::{GenerationConfig, Translator},
    error::PipelineError,
    language::LanguageDecision,
};
use tracing::info;

#[derive(Debug, Clone)]
pub struct TranslationRequest {
    pub text: String,
    pub source: LanguageDecision,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translated {
    pub text: String,
    /// False when source and target matched and the text came back untouched.
    pub translated: bool,
}

pub fn generation_config(cfg: &config::Translation) -> GenerationConfig {
    GenerationConfig {
        num_beams: cfg.num_beams,
        max_length: cfg.max_length,
    }
}

pub fn translate(
    cfg: &config::Translation,
    translator: &dyn Translator,
    req: &TranslationRequest,
) -> Result<Translated, PipelineError> {
    if req.source.resolved == req.target {
        info!("source and target are both {}, skipping translation", req.target);
        return Ok(Translated {
            text: req.text.clone(),
            translated: false,
        });
    }

    info!(
        "translating {} chars {} -> {}",
        req.text.chars().count(),
        req.source.resolved,
        req.target
    );
    let text = translator
        .translate(
            &req.text,
            &req.source.resolved,
            &req.target,
            &generation_config(cfg),
        )
        .map_err(|e| PipelineError::engine("translation", e))?;

    Ok(Translated {
        text,
        translated: true,
    })
}
