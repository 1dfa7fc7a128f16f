#![allow(dead_code)]

use anyhow::{Result, anyhow};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use inkbridge::{
    config::Config,
    document::{FileBlob, Page},
    engine::{
        ClassicalOcr, ClassicalRequest, EngineSet, GenerationConfig, LanguageDetector,
        MultilingualOcr, PdfRasterizer, TransformerOcr, Translator, Transliterator,
    },
    translit::ItransTransliterator,
};
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

pub type CallLog = Arc<Mutex<Vec<String>>>;

fn push(log: &CallLog, entry: impl Into<String>) {
    log.lock().expect("log lock").push(entry.into());
}

/// Replays scripted answers in call order; errors once the script runs dry.
pub struct ScriptedOcr {
    log: CallLog,
    script: Mutex<VecDeque<Result<String, String>>>,
}

impl ScriptedOcr {
    fn new(log: CallLog) -> Self {
        Self {
            log,
            script: Mutex::new(VecDeque::new()),
        }
    }

    pub fn answer(&self, text: &str) -> &Self {
        self.script.lock().expect("script lock").push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(&self, msg: &str) -> &Self {
        self.script.lock().expect("script lock").push_back(Err(msg.to_string()));
        self
    }

    fn next(&self, entry: String) -> Result<String> {
        push(&self.log, entry);
        match self.script.lock().expect("script lock").pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(msg)) => Err(anyhow!(msg)),
            None => Err(anyhow!("no scripted answer left")),
        }
    }
}

impl ClassicalOcr for ScriptedOcr {
    fn recognize(&self, _image: &DynamicImage, req: &ClassicalRequest) -> Result<String> {
        self.next(format!("tesseract:psm{}:{}", req.psm, req.lang))
    }
}

impl TransformerOcr for ScriptedOcr {
    fn recognize(&self, _image: &DynamicImage) -> Result<String> {
        self.next("trocr".into())
    }
}

impl MultilingualOcr for ScriptedOcr {
    fn recognize(&self, _image: &DynamicImage, script_profile: &[String]) -> Result<String> {
        self.next(format!("easyocr:{}", script_profile.join("+")))
    }
}

pub struct FixedDetector {
    log: CallLog,
    pub answer: Mutex<Result<String, String>>,
}

impl LanguageDetector for FixedDetector {
    fn detect(&self, _text: &str) -> Result<String> {
        push(&self.log, "detect");
        self.answer.lock().expect("answer lock").clone().map_err(|e| anyhow!(e))
    }
}

pub struct RecordingTransliterator {
    log: CallLog,
}

impl Transliterator for RecordingTransliterator {
    fn transliterate(&self, text: &str, scheme: &str) -> Result<String> {
        push(&self.log, format!("translit:{scheme}"));
        ItransTransliterator.transliterate(text, scheme)
    }
}

/// Answers `"{source}->{target}:{text}"`, or fails when `fail` is set.
pub struct EchoTranslator {
    log: CallLog,
    pub fail: Mutex<bool>,
    pub last_generation: Mutex<Option<GenerationConfig>>,
}

impl Translator for EchoTranslator {
    fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
        generation: &GenerationConfig,
    ) -> Result<String> {
        push(&self.log, format!("translate:{source}->{target}"));
        *self.last_generation.lock().expect("generation lock") = Some(*generation);
        if *self.fail.lock().expect("fail lock") {
            return Err(anyhow!("model unavailable"));
        }
        Ok(format!("{source}->{target}:{text}"))
    }
}

pub struct BlankRasterizer {
    log: CallLog,
    pub pages: Mutex<usize>,
}

impl PdfRasterizer for BlankRasterizer {
    fn rasterize(&self, _pdf: &[u8]) -> Result<Vec<DynamicImage>> {
        push(&self.log, "rasterize");
        let n = *self.pages.lock().expect("pages lock");
        Ok((0..n).map(|_| white_image(120, 60)).collect())
    }
}

pub struct Harness {
    pub log: CallLog,
    pub classical: Arc<ScriptedOcr>,
    pub transformer: Arc<ScriptedOcr>,
    pub multilingual: Arc<ScriptedOcr>,
    pub detector: Arc<FixedDetector>,
    pub translator: Arc<EchoTranslator>,
    pub rasterizer: Arc<BlankRasterizer>,
    transliterator: Arc<RecordingTransliterator>,
}

impl Harness {
    pub fn new() -> Self {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        Self {
            classical: Arc::new(ScriptedOcr::new(log.clone())),
            transformer: Arc::new(ScriptedOcr::new(log.clone())),
            multilingual: Arc::new(ScriptedOcr::new(log.clone())),
            detector: Arc::new(FixedDetector {
                log: log.clone(),
                answer: Mutex::new(Ok("en".into())),
            }),
            translator: Arc::new(EchoTranslator {
                log: log.clone(),
                fail: Mutex::new(false),
                last_generation: Mutex::new(None),
            }),
            rasterizer: Arc::new(BlankRasterizer {
                log: log.clone(),
                pages: Mutex::new(1),
            }),
            transliterator: Arc::new(RecordingTransliterator { log: log.clone() }),
            log,
        }
    }

    pub fn engines(&self) -> EngineSet {
        EngineSet {
            classical: self.classical.clone(),
            transformer: self.transformer.clone(),
            multilingual: self.multilingual.clone(),
            detector: self.detector.clone(),
            transliterator: self.transliterator.clone(),
            translator: self.translator.clone(),
            rasterizer: self.rasterizer.clone(),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().expect("log lock").clone()
    }
}

/// Preprocessing off keeps the cascade tests about the cascade.
pub fn fast_config() -> Config {
    let mut cfg = Config::default();
    cfg.preprocess.enabled = false;
    cfg
}

pub fn white_image(w: u32, h: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([255, 255, 255])))
}

pub fn page(index: usize) -> Page {
    Page::new(index, white_image(120, 60))
}

pub fn png_blob() -> FileBlob {
    let mut buf = Vec::new();
    white_image(120, 60)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encode png");
    FileBlob::new(buf, Some("image/png".into()), Some("scan.png".into()))
}

pub fn pdf_blob() -> FileBlob {
    FileBlob::new(
        b"%PDF-1.4\n%stub\n".to_vec(),
        Some("application/pdf".into()),
        Some("doc.pdf".into()),
    )
}
