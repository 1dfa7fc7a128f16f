use crate::preprocess::PreprocessingProfile;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub engines: Engines,
    #[serde(default)]
    pub preprocess: Preprocess,
    #[serde(default)]
    pub classifier: Classifier,
    #[serde(default)]
    pub cascade: Cascade,
    #[serde(default)]
    pub normalize: Normalize,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub translation: Translation,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
    #[serde(default)]
    pub security: Security,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// A stable, normalization-friendly string for hashing.
    pub fn normalized_for_hash(&self) -> String {
        toml::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Global {
    pub print_summary: bool,
    pub write_report: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            print_summary: true,
            write_report: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    pub out_dir: String,
    pub work_dir: String,
    pub scripts_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            out_dir: "out".into(),
            work_dir: ".inkbridge-work".into(),
            scripts_dir: "scripts".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    pub max_input_file_bytes: u64,
    pub max_pages: u32,
}
impl Default for Limits {
    fn default() -> Self {
        Self {
            max_input_file_bytes: 200 * 1024 * 1024,
            max_pages: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Engines {
    pub python_exe: String,
    /// 0 disables the per-call timeout; a hung engine then hangs the request.
    pub timeout_seconds: u64,
    /// Time allowed for a runner to load its model and report ready; 0 waits.
    pub startup_timeout_seconds: u64,
    /// One bridge call at a time across all capabilities. Each runner
    /// process already takes one request at a time on its own.
    pub serialize_calls: bool,
    pub pdf_dpi: u32,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub classical: ClassicalEngine,
    #[serde(default)]
    pub transformer: TransformerEngine,
    #[serde(default)]
    pub multilingual: MultilingualEngine,
}
impl Default for Engines {
    fn default() -> Self {
        Self {
            python_exe: "python3".into(),
            timeout_seconds: 0,
            startup_timeout_seconds: 0,
            serialize_calls: false,
            pdf_dpi: 200,
            env: Default::default(),
            classical: Default::default(),
            transformer: Default::default(),
            multilingual: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassicalEngine {
    pub psm: u32,
    pub oem: u32,
    /// Segmentation mode for the code path: a single uniform block of text.
    pub code_psm: u32,
    pub default_lang: String,
    /// ISO 639-1 code -> tesseract language pack.
    #[serde(default)]
    pub lang_packs: BTreeMap<String, String>,
}
impl Default for ClassicalEngine {
    fn default() -> Self {
        let lang_packs = [
            ("en", "eng"),
            ("hi", "hin"),
            ("fr", "fra"),
            ("es", "spa"),
            ("ru", "rus"),
            ("ta", "tam"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self {
            psm: 11,
            oem: 1,
            code_psm: 6,
            default_lang: "eng".into(),
            lang_packs,
        }
    }
}

impl ClassicalEngine {
    pub fn lang_pack(&self, lang: &str) -> String {
        self.lang_packs
            .get(lang)
            .cloned()
            .unwrap_or_else(|| self.default_lang.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformerEngine {
    pub model: String,
    pub max_length: u32,
}
impl Default for TransformerEngine {
    fn default() -> Self {
        Self {
            model: "microsoft/trocr-base-printed".into(),
            max_length: 512,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultilingualEngine {
    pub default_profile: Vec<String>,
    /// Language hint -> reader languages loaded for that script.
    #[serde(default)]
    pub script_profiles: BTreeMap<String, Vec<String>>,
    pub paragraph: bool,
}
impl Default for MultilingualEngine {
    fn default() -> Self {
        let script_profiles = [
            ("hi", vec!["hi", "en"]),
            ("ta", vec!["ta", "en"]),
            ("ru", vec!["ru", "en"]),
            ("fr", vec!["fr", "en"]),
            ("es", vec!["es", "en"]),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.into_iter().map(String::from).collect()))
        .collect();
        Self {
            default_profile: vec!["en".into()],
            script_profiles,
            paragraph: true,
        }
    }
}

impl MultilingualEngine {
    pub fn profile_for(&self, lang: &str) -> Vec<String> {
        self.script_profiles
            .get(lang)
            .cloned()
            .unwrap_or_else(|| self.default_profile.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preprocess {
    pub enabled: bool,
    #[serde(default = "PreprocessingProfile::classical")]
    pub classical: PreprocessingProfile,
    #[serde(default = "PreprocessingProfile::transformer")]
    pub transformer: PreprocessingProfile,
    #[serde(default = "PreprocessingProfile::multilingual")]
    pub multilingual: PreprocessingProfile,
    #[serde(default = "PreprocessingProfile::code")]
    pub code: PreprocessingProfile,
}
impl Default for Preprocess {
    fn default() -> Self {
        Self {
            enabled: true,
            classical: PreprocessingProfile::classical(),
            transformer: PreprocessingProfile::transformer(),
            multilingual: PreprocessingProfile::multilingual(),
            code: PreprocessingProfile::code(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classifier {
    pub detect_code: bool,
    /// Any of these substrings in the probe text marks the page as code.
    pub code_indicators: Vec<String>,
    pub min_printed_words: usize,
}
impl Default for Classifier {
    fn default() -> Self {
        Self {
            detect_code: true,
            code_indicators: [
                "def ", "class ", "import ", "function ", "return ", "=", "{", "}", "(", ")", "#",
                "//",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            min_printed_words: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadePolicyKind {
    Sequential,
    CompareAll,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cascade {
    pub policy: CascadePolicyKind,
    /// Engines run unconditionally under `compare_all`.
    pub compare_engines: Vec<crate::engine::EngineKind>,
    pub sentinel: String,
}
impl Default for Cascade {
    fn default() -> Self {
        Self {
            policy: CascadePolicyKind::Sequential,
            compare_engines: vec![
                crate::engine::EngineKind::Tesseract,
                crate::engine::EngineKind::Easyocr,
            ],
            sentinel: "Unable to extract text".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Substitution {
    pub pattern: String,
    pub replacement: String,
}

impl Substitution {
    pub fn new(pattern: &str, replacement: &str) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Normalize {
    pub enabled: bool,
    pub unicode_nfkc: bool,
    pub min_line_chars: usize,
    /// Characters stripped from the end of every line.
    pub trailing_stray: String,
    /// Applied in order; later rules see the output of earlier ones.
    pub substitutions: Vec<Substitution>,
    pub comment_marker: char,
    pub format_marker: char,
    pub format_spec_chars: String,
}
impl Default for Normalize {
    fn default() -> Self {
        Self {
            enabled: true,
            unicode_nfkc: true,
            min_line_chars: 3,
            trailing_stray: "|~_`^\\,;•·¬".into(),
            substitutions: vec![
                Substitution::new(r"\s+([,.;:!?])", "$1"),
                Substitution::new(",,", "\""),
                Substitution::new("''", "\""),
                Substitution::new(r"\b([A-Za-z]+)0([A-Za-z]+)\b", "${1}o${2}"),
                Substitution::new(r"\b([A-Za-z]+)1([A-Za-z]+)\b", "${1}l${2}"),
                Substitution::new(r"\b0f\b", "of"),
                Substitution::new(r"\btbe\b", "the"),
                Substitution::new(r"\bTbe\b", "The"),
                Substitution::new(r"\bl\b", "I"),
                // Must stay last: earlier rules can produce letters right after punctuation.
                Substitution::new(r"([,;:!?])([A-Za-z])", "$1 $2"),
            ],
            comment_marker: '#',
            format_marker: '%',
            format_spec_chars: "sdifrxXoeEgGc.-0123456789".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptRange {
    pub language: String,
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RomanizedHints {
    pub language: String,
    pub words: Vec<String>,
    pub min_hint_ratio: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Language {
    pub supported: Vec<String>,
    pub baseline: String,
    /// Checked in order; the first range with a hit decides.
    pub scripts: Vec<ScriptRange>,
    #[serde(default)]
    pub romanized_hints: Vec<RomanizedHints>,
    /// Language -> transliteration scheme for Romanized input.
    #[serde(default)]
    pub schemes: BTreeMap<String, String>,
    /// Spelling normalization before the scheme conversion, in order.
    #[serde(default)]
    pub romanized_rewrites: Vec<Substitution>,
}
impl Default for Language {
    fn default() -> Self {
        Self {
            supported: ["en", "hi", "fr", "es", "ru", "ta"]
                .into_iter()
                .map(String::from)
                .collect(),
            baseline: "en".into(),
            scripts: vec![ScriptRange {
                language: "hi".into(),
                start: 0x0900,
                end: 0x097F,
            }],
            romanized_hints: vec![RomanizedHints {
                language: "hi".into(),
                words: [
                    "mujhe", "chahiye", "hai", "hain", "kya", "nahi", "nahin", "mera", "meri",
                    "tum", "aap", "hum", "kaise", "jana", "laga", "kahan", "kyun", "accha",
                    "achha", "bahut", "kuch", "abhi", "tera", "tumhe", "hoon",
                ]
                .into_iter()
                .map(String::from)
                .collect(),
                min_hint_ratio: 0.5,
            }],
            schemes: [("hi".to_string(), "devanagari".to_string())]
                .into_iter()
                .collect(),
            romanized_rewrites: vec![
                Substitution::new("ki", "kii"),
                Substitution::new("chahiye", "chaahiye"),
                Substitution::new("jana", "jaanaa"),
                Substitution::new("laga", "lagaa"),
                Substitution::new("mujhe", "mujhe"),
            ],
        }
    }
}

impl Language {
    pub fn is_supported(&self, code: &str) -> bool {
        self.supported.iter().any(|s| s == code)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Translation {
    pub model: String,
    pub num_beams: u32,
    pub max_length: u32,
}
impl Default for Translation {
    fn default() -> Self {
        Self {
            model: "facebook/m2m100_418M".into(),
            num_beams: 5,
            max_length: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debug {
    pub keep_python_stderr: bool,
    pub dump_effective_config: bool,
    /// Keep the PNGs handed to the bridge instead of deleting them after each call.
    pub keep_page_images: bool,
}
impl Default for Debug {
    fn default() -> Self {
        Self {
            keep_python_stderr: true,
            dump_effective_config: false,
            keep_page_images: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Security {
    pub reject_url_inputs: bool,
    pub pin_scripts_dir: bool,
}
impl Default for Security {
    fn default() -> Self {
        Self {
            reject_url_inputs: true,
            pin_scripts_dir: true,
        }
    }
}
