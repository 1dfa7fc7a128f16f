use crate::{
    config::Config,
    document::{Document, FileBlob},
    engine::EngineSet,
    error::{InputError, PipelineError},
    language::{AUTO, LanguageDecision, LanguageResolver, resolve_target},
    pipeline::Pipeline,
    report::PageReport,
    translate::{TranslationRequest, translate},
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{info, warn};

pub const NOTHING_TO_TRANSLATE: &str = "No text to translate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessOption {
    Ocr,
    Translate,
}

impl FromStr for ProcessOption {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ocr" => Ok(ProcessOption::Ocr),
            "translate" => Ok(ProcessOption::Translate),
            other => Err(InputError::InvalidOption {
                option: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub text: Option<String>,
    pub file: Option<FileBlob>,
    /// Parsed at the boundary so a bad value surfaces as `InvalidOption`.
    pub option: String,
    pub source_lang: String,
    pub target_lang: String,
}

impl Default for ProcessRequest {
    fn default() -> Self {
        Self {
            text: None,
            file: None,
            option: "ocr".into(),
            source_lang: AUTO.into(),
            target_lang: "en".into(),
        }
    }
}

impl ProcessRequest {
    fn inline_text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.is_empty())
    }

    /// The document this request carries. `prefer_file` picks the file when
    /// both are present.
    fn document(&self, prefer_file: bool) -> Result<Document, InputError> {
        match (self.inline_text(), &self.file) {
            (_, Some(file)) if prefer_file => Ok(Document::File(file.clone())),
            (Some(text), _) => Ok(Document::Text(text.to_string())),
            (None, Some(file)) => Ok(Document::File(file.clone())),
            (None, None) => Err(InputError::MissingInput),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    /// Inline text returned as given.
    Text,
    Extracted,
    /// Every page ended in the extraction sentinel.
    NoExtractableText,
    Translated,
    /// Source and target matched.
    Unchanged,
    NothingToTranslate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub result: String,
    pub kind: ResultKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<LanguageDecision>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pages: Vec<PageReport>,
}

pub struct Service {
    cfg: Config,
    engines: EngineSet,
    pipeline: Pipeline,
}

impl Service {
    pub fn new(cfg: &Config, engines: EngineSet) -> Result<Self> {
        Ok(Self {
            cfg: cfg.clone(),
            pipeline: Pipeline::new(cfg, engines.clone())?,
            engines,
        })
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn process(&self, req: &ProcessRequest) -> Result<ProcessResponse, PipelineError> {
        if req.inline_text().is_none() && req.file.is_none() {
            warn!("no text or file provided");
            return Err(InputError::MissingInput.into());
        }
        let option: ProcessOption = req.option.parse()?;
        info!(
            "process option={:?} text={} file={} source={} target={}",
            option,
            req.inline_text().is_some(),
            req.file.as_ref().and_then(|f| f.filename.as_deref()).unwrap_or("-"),
            req.source_lang,
            req.target_lang
        );

        match option {
            ProcessOption::Ocr => self.ocr(req),
            ProcessOption::Translate => self.translate(req),
        }
    }

    fn ocr(&self, req: &ProcessRequest) -> Result<ProcessResponse, PipelineError> {
        let blob = match req.document(false)? {
            Document::Text(text) => {
                return Ok(ProcessResponse {
                    result: text,
                    kind: ResultKind::Text,
                    language: None,
                    pages: Vec::new(),
                });
            }
            Document::File(blob) => blob,
        };

        let lang = resolve_target(&self.cfg.language, &req.target_lang);
        let out = self.pipeline.run_document(&blob, &lang)?;
        Ok(ProcessResponse {
            kind: if out.found_text {
                ResultKind::Extracted
            } else {
                ResultKind::NoExtractableText
            },
            result: out.text,
            language: None,
            pages: out.pages,
        })
    }

    fn translate(&self, req: &ProcessRequest) -> Result<ProcessResponse, PipelineError> {
        let (text, pages) = match req.document(true)? {
            Document::Text(text) => (text, Vec::new()),
            Document::File(blob) => {
                let lang = if req.source_lang == AUTO {
                    self.cfg.language.baseline.clone()
                } else {
                    resolve_target(&self.cfg.language, &req.source_lang)
                };
                let out = self.pipeline.run_document(&blob, &lang)?;
                if !out.found_text {
                    info!("nothing extracted, skipping translation");
                    return Ok(ProcessResponse {
                        result: out.text,
                        kind: ResultKind::NoExtractableText,
                        language: None,
                        pages: out.pages,
                    });
                }
                (out.text, out.pages)
            }
        };

        if text.trim().is_empty() {
            warn!("no text to translate");
            return Ok(ProcessResponse {
                result: NOTHING_TO_TRANSLATE.into(),
                kind: ResultKind::NothingToTranslate,
                language: None,
                pages,
            });
        }

        let resolver = LanguageResolver::new(
            &self.cfg.language,
            self.engines.detector.as_ref(),
            self.engines.transliterator.as_ref(),
        );
        let resolution = resolver.resolve(&req.source_lang, &text);
        let target = resolve_target(&self.cfg.language, &req.target_lang);

        let translation = TranslationRequest {
            text: resolution.text,
            source: resolution.decision,
            target,
        };
        let out = translate(
            &self.cfg.translation,
            self.engines.translator.as_ref(),
            &translation,
        )?;

        Ok(ProcessResponse {
            result: out.text,
            kind: if out.translated {
                ResultKind::Translated
            } else {
                ResultKind::Unchanged
            },
            language: Some(translation.source),
            pages,
        })
    }
}
