use super::{
    ClassicalOcr, ClassicalRequest, LanguageDetector, MultilingualOcr, PdfRasterizer, Serialized,
    TransformerOcr, Translator,
    runner::{Runner, RunnerSpec},
    types::*,
};
use crate::{
    config::Config,
    util::{ensure_dir, preview},
};
use anyhow::{Context, Result, anyhow};
use image::{DynamicImage, ImageFormat};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, warn};

const OCR_SCRIPT: &str = "ocr_runner.py";
const LANGUAGE_SCRIPT: &str = "language_runner.py";
const PDF_SCRIPT: &str = "pdf_render.py";

/// Drives the OCR, language and PDF capabilities through long-lived python
/// runners, one process per engine. Each runner loads its model once and is
/// started on first use. A runner takes one request at a time, so calls to
/// the same engine queue while different engines run side by side.
pub struct PythonEngine {
    cfg: Config,
    work_dir: PathBuf,
    tesseract: Serialized<Runner>,
    trocr: Serialized<Runner>,
    easyocr: Serialized<Runner>,
    detector: Serialized<Runner>,
    translator: Serialized<Runner>,
    pdf: Serialized<Runner>,
}

impl PythonEngine {
    pub fn new(cfg: &Config) -> Result<Self> {
        let scripts_dir = PathBuf::from(&cfg.paths.scripts_dir);
        if cfg.security.pin_scripts_dir {
            let cwd = std::env::current_dir().with_context(|| "current_dir")?;
            let canon = scripts_dir
                .canonicalize()
                .with_context(|| format!("canonicalize scripts_dir: {}", scripts_dir.display()))?;
            if !canon.starts_with(&cwd) {
                return Err(anyhow!(
                    "scripts_dir is outside cwd while pin_scripts_dir=true: {}",
                    canon.display()
                ));
            }
        }
        for script in [OCR_SCRIPT, LANGUAGE_SCRIPT, PDF_SCRIPT] {
            let path = scripts_dir.join(script);
            if !path.exists() {
                return Err(anyhow!("missing script: {}", path.display()));
            }
        }
        let work_dir = PathBuf::from(&cfg.paths.work_dir);
        ensure_dir(&work_dir)?;

        let python_exe = resolve_python_exe(&cfg.engines.python_exe);
        let seconds = |s: u64| (s > 0).then(|| Duration::from_secs(s));
        let runner = |name: &'static str, script: &str, args: &[&str]| {
            let mut argv = vec![scripts_dir.join(script).display().to_string()];
            argv.extend(args.iter().map(|a| a.to_string()));
            Serialized::new(Runner::new(RunnerSpec {
                name,
                program: python_exe.clone(),
                args: argv,
                env: cfg.engines.env.clone(),
                timeout: seconds(cfg.engines.timeout_seconds),
                startup_timeout: seconds(cfg.engines.startup_timeout_seconds),
                log_stderr: cfg.debug.keep_python_stderr,
            }))
        };

        let easyocr_langs = cfg.engines.multilingual.default_profile.join(",");
        Ok(Self {
            tesseract: runner("tesseract", OCR_SCRIPT, &["--engine", "tesseract"]),
            trocr: runner(
                "trocr",
                OCR_SCRIPT,
                &["--engine", "trocr", "--model", cfg.engines.transformer.model.as_str()],
            ),
            easyocr: runner(
                "easyocr",
                OCR_SCRIPT,
                &["--engine", "easyocr", "--langs", easyocr_langs.as_str()],
            ),
            detector: runner("detector", LANGUAGE_SCRIPT, &["--role", "detect"]),
            translator: runner(
                "translator",
                LANGUAGE_SCRIPT,
                &["--role", "translate", "--model", cfg.translation.model.as_str()],
            ),
            pdf: runner("pdf", PDF_SCRIPT, &[]),
            cfg: cfg.clone(),
            work_dir,
        })
    }

    /// Reports interpreter and engine availability through the tesseract
    /// runner, which starts without loading a model.
    pub fn doctor(&self) -> Result<DoctorOut> {
        self.tesseract.with(|r| r.call(&OcrIn::Doctor))
    }

    fn run_ocr(
        &self,
        runner: &Serialized<Runner>,
        image: &DynamicImage,
        build: impl FnOnce(String) -> OcrIn,
    ) -> Result<String> {
        let staged = stage_image(&self.work_dir, image)?;
        let req = build(staged.path().display().to_string());
        let out: Result<TextOut> = runner.with(|r| {
            debug!("{} request {}", r.name(), staged.path().display());
            r.call(&req)
        });
        self.release_file(staged);
        let out = out?;
        if !out.ok {
            let msg = out.error.unwrap_or_else(|| "ocr runner returned ok=false".into());
            return Err(anyhow!(msg));
        }
        debug!("ocr text: {}", preview(&out.text, 100));
        Ok(out.text.trim().to_string())
    }

    /// Dropping the handle deletes the file unless page images are kept.
    fn release_file(&self, staged: NamedTempFile) {
        if !self.cfg.debug.keep_page_images {
            return;
        }
        match staged.keep() {
            Ok((_, path)) => debug!("kept {}", path.display()),
            Err(err) => warn!("keeping staged file: {err}"),
        }
    }

    fn release_dir(&self, staged: TempDir) {
        if self.cfg.debug.keep_page_images {
            debug!("kept {}", staged.keep().display());
        }
    }
}

/// Writes the page as PNG under `work_dir` with a name unique to this call,
/// so concurrent requests on the same image never share a file.
pub fn stage_image(work_dir: &Path, image: &DynamicImage) -> Result<NamedTempFile> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .with_context(|| "encoding page as PNG")?;
    let mut file = tempfile::Builder::new()
        .prefix("page-")
        .suffix(".png")
        .tempfile_in(work_dir)
        .with_context(|| format!("creating page file in {}", work_dir.display()))?;
    file.write_all(&buf)
        .and_then(|_| file.flush())
        .with_context(|| format!("writing page image: {}", file.path().display()))?;
    Ok(file)
}

impl ClassicalOcr for PythonEngine {
    fn recognize(&self, image: &DynamicImage, req: &ClassicalRequest) -> Result<String> {
        self.run_ocr(&self.tesseract, image, |image_path| OcrIn::Tesseract {
            image_path,
            lang: req.lang.clone(),
            psm: req.psm,
            oem: req.oem,
        })
        .with_context(|| "tesseract")
    }
}

impl TransformerOcr for PythonEngine {
    fn recognize(&self, image: &DynamicImage) -> Result<String> {
        let max_length = self.cfg.engines.transformer.max_length;
        self.run_ocr(&self.trocr, image, |image_path| OcrIn::Trocr {
            image_path,
            max_length,
        })
        .with_context(|| "trocr")
    }
}

impl MultilingualOcr for PythonEngine {
    fn recognize(&self, image: &DynamicImage, script_profile: &[String]) -> Result<String> {
        self.run_ocr(&self.easyocr, image, |image_path| OcrIn::Easyocr {
            image_path,
            langs: script_profile.to_vec(),
            paragraph: self.cfg.engines.multilingual.paragraph,
        })
        .with_context(|| "easyocr")
    }
}

impl LanguageDetector for PythonEngine {
    fn detect(&self, text: &str) -> Result<String> {
        let req = LanguageIn::Detect {
            text: text.to_string(),
        };
        let out: DetectOut = self.detector.with(|r| r.call(&req))?;
        if !out.ok || out.language.is_empty() {
            let msg = out.error.unwrap_or_else(|| "language detection failed".into());
            return Err(anyhow!(msg));
        }
        Ok(out.language)
    }
}

impl Translator for PythonEngine {
    fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
        generation: &GenerationConfig,
    ) -> Result<String> {
        let req = LanguageIn::Translate {
            text: text.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            generation: *generation,
        };
        let out: TextOut = self.translator.with(|r| r.call(&req))?;
        if !out.ok {
            let msg = out.error.unwrap_or_else(|| "translation failed".into());
            return Err(anyhow!(msg));
        }
        Ok(out.text)
    }
}

impl PdfRasterizer for PythonEngine {
    fn rasterize(&self, pdf: &[u8]) -> Result<Vec<DynamicImage>> {
        let staged = tempfile::Builder::new()
            .prefix("pdf-")
            .tempdir_in(&self.work_dir)
            .with_context(|| format!("creating pdf dir in {}", self.work_dir.display()))?;
        let input = staged.path().join("input.pdf");
        std::fs::write(&input, pdf).with_context(|| format!("writing {}", input.display()))?;

        let req = RasterizeIn {
            input_pdf: input.display().to_string(),
            out_dir: staged.path().display().to_string(),
            dpi: self.cfg.engines.pdf_dpi,
        };
        let res: Result<RasterizeOut> = self.pdf.with(|r| r.call(&req));
        let pages = res.and_then(|out| {
            if !out.ok {
                let msg = out.error.unwrap_or_else(|| "pdf_render failed".into());
                return Err(anyhow!(msg));
            }
            out.pages
                .iter()
                .map(|p| image::open(p).with_context(|| format!("opening rendered page {p}")))
                .collect::<Result<Vec<_>>>()
        });

        self.release_dir(staged);
        pages
    }
}

fn resolve_python_exe(raw: &str) -> PathBuf {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("auto") {
        if let Ok(env_val) = std::env::var("INKBRIDGE_PYTHON") {
            let p = expand_tilde(&env_val);
            if p.exists() {
                return p;
            }
        }
        return PathBuf::from("python3");
    }
    expand_tilde(raw)
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}
