use crate::{
    classify::{self, Classification},
    config::Config,
    document::{FileBlob, Page, decode_pages},
    engine::{ClassicalRequest, EngineKind, EngineSet},
    error::PipelineError,
    policy::{self, CascadePlan, NormalizerKind, PlanKind},
    postprocess::{Normalizer, merge_pages},
    preprocess::{PreprocessingProfile, preprocess},
    quality::{TextCandidate, pick_best},
    report::{AttemptReport, PageReport},
};
use anyhow::Result;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Terminal state of one page's cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeOutcome {
    Validated { text: String, engine: EngineKind },
    Exhausted,
}

pub struct OcrOutput {
    pub text: String,
    /// False when every page ended in the sentinel.
    pub found_text: bool,
    pub pages: Vec<PageReport>,
}

pub struct PageOutput {
    pub text: String,
    pub outcome: CascadeOutcome,
    pub report: PageReport,
}

pub struct Pipeline {
    cfg: Config,
    engines: EngineSet,
    normalizer: Normalizer,
}

/// Per-page scratch: preprocessed variants are built at most once per profile.
struct PageRun<'a> {
    page: &'a Page,
    lang: &'a str,
    transformer: Option<Page>,
    multilingual: Option<Page>,
    probe: Option<TextCandidate>,
    attempts: Vec<AttemptReport>,
}

impl Pipeline {
    pub fn new(cfg: &Config, engines: EngineSet) -> Result<Self> {
        Ok(Self {
            cfg: cfg.clone(),
            normalizer: Normalizer::from_config(&cfg.normalize)?,
            engines,
        })
    }

    pub fn decode(&self, blob: &FileBlob) -> Result<Vec<Page>, PipelineError> {
        decode_pages(blob, self.engines.rasterizer.as_ref(), &self.cfg.limits)
    }

    pub fn run_document(&self, blob: &FileBlob, lang: &str) -> Result<OcrOutput, PipelineError> {
        let pages = self.decode(blob)?;
        Ok(self.run_pages(&pages, lang))
    }

    /// Pages run strictly in order; output order is page order.
    pub fn run_pages(&self, pages: &[Page], lang: &str) -> OcrOutput {
        let started = Instant::now();
        let mut texts = Vec::with_capacity(pages.len());
        let mut reports = Vec::with_capacity(pages.len());
        let mut found_text = false;

        for page in pages {
            let out = self.run_page(page, lang);
            found_text |= matches!(out.outcome, CascadeOutcome::Validated { .. });
            texts.push(out.text);
            reports.push(out.report);
        }

        info!(
            "ocr done pages={} found_text={} elapsed={:?}",
            pages.len(),
            found_text,
            started.elapsed()
        );

        OcrOutput {
            text: merge_pages(&texts),
            found_text,
            pages: reports,
        }
    }

    pub fn classify_page(&self, page: &Page, lang: &str) -> Classification {
        let classical = self.prepare(page, &self.cfg.preprocess.classical);
        classify::classify(&self.cfg, &self.engines, &classical, lang)
    }

    pub fn run_page(&self, page: &Page, lang: &str) -> PageOutput {
        let (w, h) = page.dimensions();
        info!("page {} start {}x{} lang={}", page.index, w, h, lang);

        let classical = self.prepare(page, &self.cfg.preprocess.classical);
        let classification = classify::classify(&self.cfg, &self.engines, &classical, lang);
        let plan = policy::decide(&self.cfg, classification.text_type);
        debug!(?plan, "cascade plan");

        let mut run = PageRun {
            page,
            lang,
            transformer: None,
            multilingual: None,
            probe: classification.probe,
            attempts: Vec::new(),
        };

        let outcome = match plan.kind {
            PlanKind::CodeBlock => self.run_code(&mut run),
            PlanKind::Sequential => self.run_sequential(&plan, &mut run),
            PlanKind::CompareAll => self.run_compare_all(&plan, &mut run),
        };

        let (text, chosen_engine) = match &outcome {
            CascadeOutcome::Validated { text, engine } => {
                info!("page {} validated by {}", page.index, engine);
                (self.finish(text, plan.normalizer), Some(*engine))
            }
            CascadeOutcome::Exhausted => {
                warn!("page {}: all OCR engines failed to produce valid text", page.index);
                (self.cfg.cascade.sentinel.clone(), None)
            }
        };

        PageOutput {
            text,
            outcome,
            report: PageReport {
                page_index: page.index,
                text_type: plan.text_type,
                plan: plan.kind,
                attempts: run.attempts,
                chosen_engine,
            },
        }
    }

    fn run_sequential(&self, plan: &CascadePlan, run: &mut PageRun<'_>) -> CascadeOutcome {
        for (i, engine) in plan.engines.iter().enumerate() {
            debug!("page {} attempt {} engine={}", run.page.index, i, engine);
            if let Some(c) = self.attempt(*engine, run) {
                if c.is_valid {
                    return CascadeOutcome::Validated {
                        text: c.text,
                        engine: c.source_engine,
                    };
                }
            }
            debug!("page {} next engine after {}", run.page.index, engine);
        }
        CascadeOutcome::Exhausted
    }

    fn run_compare_all(&self, plan: &CascadePlan, run: &mut PageRun<'_>) -> CascadeOutcome {
        let candidates: Vec<TextCandidate> = plan
            .engines
            .iter()
            .filter_map(|engine| self.attempt(*engine, run))
            .collect();

        if let Some(best) = pick_best(&candidates) {
            debug!(
                "page {} compare-all picked {} score={}",
                run.page.index,
                best.source_engine,
                best.score()
            );
            return CascadeOutcome::Validated {
                text: best.text.clone(),
                engine: best.source_engine,
            };
        }

        // An engine that already ran in the comparison is not asked again.
        if let Some(fallback) = plan.fallback.filter(|f| !plan.engines.contains(f)) {
            if let Some(c) = self.attempt(fallback, run) {
                if c.is_valid {
                    return CascadeOutcome::Validated {
                        text: c.text,
                        engine: c.source_engine,
                    };
                }
            }
        }
        CascadeOutcome::Exhausted
    }

    /// The code path never falls back: other engines mangle monospaced blocks.
    fn run_code(&self, run: &mut PageRun<'_>) -> CascadeOutcome {
        let prepared = self.prepare(run.page, &self.cfg.preprocess.code);
        let req = ClassicalRequest::for_code(&self.cfg.engines.classical, run.lang);
        let result = self.engines.classical.recognize(&prepared.image, &req);
        match record(run, EngineKind::Tesseract, result, false) {
            Some(c) if c.is_valid => CascadeOutcome::Validated {
                text: c.text,
                engine: EngineKind::Tesseract,
            },
            _ => CascadeOutcome::Exhausted,
        }
    }

    /// One engine attempt; a failing engine contributes no candidate.
    fn attempt(&self, engine: EngineKind, run: &mut PageRun<'_>) -> Option<TextCandidate> {
        match engine {
            EngineKind::Tesseract => {
                let probe = run.probe.clone();
                let result = probe
                    .map(|p| p.text)
                    .ok_or_else(|| anyhow::anyhow!("classification probe failed"));
                record(run, engine, result, true)
            }
            EngineKind::Trocr => {
                if run.transformer.is_none() {
                    run.transformer = Some(self.prepare(run.page, &self.cfg.preprocess.transformer));
                }
                let image = &run.transformer.as_ref().unwrap_or(run.page).image;
                let result = self.engines.transformer.recognize(image);
                record(run, engine, result, false)
            }
            EngineKind::Easyocr => {
                if run.multilingual.is_none() {
                    run.multilingual =
                        Some(self.prepare(run.page, &self.cfg.preprocess.multilingual));
                }
                let profile = self.cfg.engines.multilingual.profile_for(run.lang);
                let image = &run.multilingual.as_ref().unwrap_or(run.page).image;
                let result = self.engines.multilingual.recognize(image, &profile);
                record(run, engine, result, false)
            }
        }
    }

    fn prepare(&self, page: &Page, profile: &PreprocessingProfile) -> Page {
        if self.cfg.preprocess.enabled {
            preprocess(page, profile)
        } else {
            page.clone()
        }
    }

    fn finish(&self, text: &str, kind: NormalizerKind) -> String {
        match kind {
            NormalizerKind::Code => self.normalizer.normalize_code(text),
            NormalizerKind::Generic => {
                let normalized = self.normalizer.normalize(text);
                if normalized.is_empty() {
                    text.trim().to_string()
                } else {
                    normalized
                }
            }
        }
    }
}

fn record(
    run: &mut PageRun<'_>,
    engine: EngineKind,
    result: Result<String>,
    reused_probe: bool,
) -> Option<TextCandidate> {
    match result {
        Ok(text) => {
            let c = TextCandidate::new(text, engine);
            run.attempts.push(AttemptReport {
                engine,
                valid: c.is_valid,
                chars: c.text.chars().count(),
                reused_probe,
                error: None,
            });
            Some(c)
        }
        Err(err) => {
            warn!("page {} engine {} failed: {err:#}", run.page.index, engine);
            run.attempts.push(AttemptReport {
                engine,
                valid: false,
                chars: 0,
                reused_probe,
                error: Some(format!("{err:#}")),
            });
            None
        }
    }
}
