pub mod python;
pub mod runner;
pub mod types;

use crate::config::Config;
use anyhow::{Result, anyhow};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};

pub use types::{DoctorOut, GenerationConfig};

/// The OCR engine a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Classical, fast, printed text.
    Tesseract,
    /// Transformer, handwriting, fixed small input.
    Trocr,
    /// Multilingual, per-script readers.
    Easyocr,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngineKind::Tesseract => "tesseract",
            EngineKind::Trocr => "trocr",
            EngineKind::Easyocr => "easyocr",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassicalRequest {
    /// Tesseract language pack, e.g. `eng`.
    pub lang: String,
    pub psm: u32,
    pub oem: u32,
}

impl ClassicalRequest {
    /// Sparse-text segmentation for ordinary pages.
    pub fn for_text(cfg: &crate::config::ClassicalEngine, lang: &str) -> Self {
        Self {
            lang: cfg.lang_pack(lang),
            psm: cfg.psm,
            oem: cfg.oem,
        }
    }

    /// Single uniform block, which keeps code lines and indentation together.
    pub fn for_code(cfg: &crate::config::ClassicalEngine, lang: &str) -> Self {
        Self {
            lang: cfg.lang_pack(lang),
            psm: cfg.code_psm,
            oem: cfg.oem,
        }
    }
}

pub trait ClassicalOcr: Send + Sync {
    fn recognize(&self, image: &DynamicImage, req: &ClassicalRequest) -> Result<String>;
}

pub trait TransformerOcr: Send + Sync {
    fn recognize(&self, image: &DynamicImage) -> Result<String>;
}

pub trait MultilingualOcr: Send + Sync {
    fn recognize(&self, image: &DynamicImage, script_profile: &[String]) -> Result<String>;
}

pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str) -> Result<String>;
}

pub trait Transliterator: Send + Sync {
    fn transliterate(&self, text: &str, scheme: &str) -> Result<String>;
}

pub trait Translator: Send + Sync {
    fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
        generation: &GenerationConfig,
    ) -> Result<String>;
}

pub trait PdfRasterizer: Send + Sync {
    fn rasterize(&self, pdf: &[u8]) -> Result<Vec<DynamicImage>>;
}

/// Process-wide engine handles. Built once, read-only afterwards.
#[derive(Clone)]
pub struct EngineSet {
    pub classical: Arc<dyn ClassicalOcr>,
    pub transformer: Arc<dyn TransformerOcr>,
    pub multilingual: Arc<dyn MultilingualOcr>,
    pub detector: Arc<dyn LanguageDetector>,
    pub transliterator: Arc<dyn Transliterator>,
    pub translator: Arc<dyn Translator>,
    pub rasterizer: Arc<dyn PdfRasterizer>,
}

impl EngineSet {
    /// Every capability backed by the python runners. Transliteration is
    /// built in.
    pub fn python(cfg: &Config) -> Result<Self> {
        let engine = python::PythonEngine::new(cfg)?;
        let transliterator = Arc::new(crate::translit::ItransTransliterator);

        if cfg.engines.serialize_calls {
            let engine = Arc::new(Serialized::new(engine));
            return Ok(Self {
                classical: engine.clone(),
                transformer: engine.clone(),
                multilingual: engine.clone(),
                detector: engine.clone(),
                transliterator,
                translator: engine.clone(),
                rasterizer: engine,
            });
        }

        let engine = Arc::new(engine);
        Ok(Self {
            classical: engine.clone(),
            transformer: engine.clone(),
            multilingual: engine.clone(),
            detector: engine.clone(),
            transliterator,
            translator: engine.clone(),
            rasterizer: engine,
        })
    }
}

/// Exclusive access to something that is not safe to use concurrently: a
/// non-reentrant capability, or a runner process with one request in flight.
pub struct Serialized<T> {
    inner: Mutex<T>,
}

impl<T> Serialized<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> Result<R>) -> Result<R> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| anyhow!("engine lock poisoned"))?;
        f(&mut *guard)
    }
}

impl<T: ClassicalOcr> ClassicalOcr for Serialized<T> {
    fn recognize(&self, image: &DynamicImage, req: &ClassicalRequest) -> Result<String> {
        self.with(|e| e.recognize(image, req))
    }
}

impl<T: TransformerOcr> TransformerOcr for Serialized<T> {
    fn recognize(&self, image: &DynamicImage) -> Result<String> {
        self.with(|e| e.recognize(image))
    }
}

impl<T: MultilingualOcr> MultilingualOcr for Serialized<T> {
    fn recognize(&self, image: &DynamicImage, script_profile: &[String]) -> Result<String> {
        self.with(|e| e.recognize(image, script_profile))
    }
}

impl<T: LanguageDetector> LanguageDetector for Serialized<T> {
    fn detect(&self, text: &str) -> Result<String> {
        self.with(|e| e.detect(text))
    }
}

impl<T: Translator> Translator for Serialized<T> {
    fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
        generation: &GenerationConfig,
    ) -> Result<String> {
        self.with(|e| e.translate(text, source, target, generation))
    }
}

impl<T: PdfRasterizer> PdfRasterizer for Serialized<T> {
    fn rasterize(&self, pdf: &[u8]) -> Result<Vec<DynamicImage>> {
        self.with(|e| e.rasterize(pdf))
    }
}
