use crate::{
    config::Limits,
    engine::PdfRasterizer,
    error::{InputError, PipelineError},
    preprocess::ColorMode,
};
use anyhow::{Context, Result};
use image::DynamicImage;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

/// Word-processor formats we refuse rather than mis-decode.
const LEGACY_WORD_MIMETYPES: &[&str] = &[
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

#[derive(Debug, Clone)]
pub enum Document {
    Text(String),
    File(FileBlob),
}

#[derive(Debug, Clone)]
pub struct FileBlob {
    pub bytes: Vec<u8>,
    pub mimetype: Option<String>,
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ContentKind {
    Image,
    Pdf,
    Unsupported(String),
    Unknown,
}

impl FileBlob {
    pub fn new(bytes: Vec<u8>, mimetype: Option<String>, filename: Option<String>) -> Self {
        Self {
            bytes,
            mimetype,
            filename,
        }
    }

    pub fn from_path(path: &Path, mimetype: Option<String>) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("reading input: {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        Ok(Self::new(bytes, mimetype, filename))
    }

    /// Declared mimetype first, then magic bytes, then the filename extension.
    pub fn content_kind(&self) -> ContentKind {
        if let Some(declared) = self.mimetype.as_deref().map(str::trim) {
            if !declared.is_empty() && declared != "application/octet-stream" {
                return classify_mimetype(declared);
            }
        }
        if let Some(kind) = infer::get(&self.bytes) {
            return classify_mimetype(kind.mime_type());
        }
        if let Some(name) = self.filename.as_deref() {
            if let Some(guess) = mime_guess::from_path(name).first() {
                return classify_mimetype(guess.essence_str());
            }
        }
        ContentKind::Unknown
    }
}

pub fn classify_mimetype(mimetype: &str) -> ContentKind {
    let m = mimetype.to_ascii_lowercase();
    if m.starts_with("image") {
        ContentKind::Image
    } else if m == "application/pdf" {
        ContentKind::Pdf
    } else if LEGACY_WORD_MIMETYPES.contains(&m.as_str()) {
        ContentKind::Unsupported(m)
    } else {
        ContentKind::Unknown
    }
}

/// One decoded image; a PDF yields one per page.
#[derive(Debug, Clone)]
pub struct Page {
    pub index: usize,
    pub image: DynamicImage,
}

impl Page {
    pub fn new(index: usize, image: DynamicImage) -> Self {
        Self { index, image }
    }

    pub fn with_image(&self, image: DynamicImage) -> Self {
        Self {
            index: self.index,
            image,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    pub fn color_mode(&self) -> ColorMode {
        match self.image {
            DynamicImage::ImageLuma8(_) | DynamicImage::ImageLuma16(_) => ColorMode::Gray,
            _ => ColorMode::Rgb,
        }
    }
}

pub fn decode_pages(
    blob: &FileBlob,
    rasterizer: &dyn PdfRasterizer,
    limits: &Limits,
) -> Result<Vec<Page>, PipelineError> {
    let size = blob.bytes.len() as u64;
    if size > limits.max_input_file_bytes {
        return Err(InputError::TooLarge {
            bytes: size,
            max: limits.max_input_file_bytes,
        }
        .into());
    }

    let kind = blob.content_kind();
    info!(
        "decoding file name={:?} mimetype={:?} kind={:?} bytes={}",
        blob.filename, blob.mimetype, kind, size
    );

    let images = match kind {
        ContentKind::Unsupported(mimetype) => {
            return Err(InputError::UnsupportedMimetype { mimetype }.into());
        }
        ContentKind::Image => vec![decode_image(&blob.bytes)?],
        ContentKind::Pdf => {
            let pages = rasterizer
                .rasterize(&blob.bytes)
                .map_err(|e| InputError::Undecodable {
                    details: format!("{e:#}"),
                })?;
            if pages.is_empty() {
                return Err(InputError::Undecodable {
                    details: "PDF has zero pages".into(),
                }
                .into());
            }
            pages
        }
        ContentKind::Unknown => {
            let image = decode_image(&blob.bytes)?;
            info!("opened file as image despite unknown mimetype");
            vec![image]
        }
    };

    let max = limits.max_pages as usize;
    let mut images = images;
    if images.len() > max {
        warn!("document has {} pages, keeping the first {max}", images.len());
        images.truncate(max);
    }

    Ok(images
        .into_iter()
        .enumerate()
        .map(|(i, img)| Page::new(i, DynamicImage::ImageRgb8(img.to_rgb8())))
        .collect())
}

fn decode_image(bytes: &[u8]) -> Result<DynamicImage, InputError> {
    image::load_from_memory(bytes).map_err(|e| InputError::Undecodable {
        details: e.to_string(),
    })
}
