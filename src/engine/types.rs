use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorOut {
    pub python_exe: String,
    pub python_version: String,
    /// Engine name -> importable.
    #[serde(default)]
    pub engines: BTreeMap<String, bool>,
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum OcrIn {
    Doctor,
    Tesseract {
        image_path: String,
        lang: String,
        psm: u32,
        oem: u32,
    },
    Trocr {
        image_path: String,
        max_length: u32,
    },
    Easyocr {
        image_path: String,
        langs: Vec<String>,
        paragraph: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextOut {
    pub ok: bool,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// Beam search budget for one translation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub num_beams: u32,
    pub max_length: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum LanguageIn {
    Detect {
        text: String,
    },
    Translate {
        text: String,
        source: String,
        target: String,
        #[serde(flatten)]
        generation: GenerationConfig,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectOut {
    pub ok: bool,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterizeIn {
    pub input_pdf: String,
    pub out_dir: String,
    pub dpi: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterizeOut {
    pub ok: bool,
    #[serde(default)]
    pub pages: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}
