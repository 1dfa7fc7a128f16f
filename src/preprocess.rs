//! Per-engine image preparation.
//!
//! `preprocess` never fails: any error or panic inside an image routine is
//! logged and the original page is handed back unchanged.

use crate::document::Page;
use anyhow::{Result, bail};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::contrast::{ThresholdType, otsu_level, threshold};
use imageproc::filter::{gaussian_blur_f32, median_filter, sharpen3x3};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use imageproc::geometry::min_area_rect;
use imageproc::integral_image::{integral_image, sum_image_pixels};
use imageproc::point::Point;
use serde::{Deserialize, Serialize};
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{debug, warn};

/// Fraction of near-black pixels above which the page is treated as light text on dark.
pub const DARK_PIXEL_RATIO: f64 = 0.7;

/// Histogram buckets counted as "dark" by the inversion check.
const DARK_BUCKETS: usize = 3;

/// Deskew ignores corrections smaller than this many degrees.
const MIN_DESKEW_DEGREES: f64 = 0.5;

/// Upper bound on points handed to the rectangle fit; larger sets are strided.
const MAX_DESKEW_POINTS: usize = 200_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Binarization {
    None,
    Otsu,
    /// Local mean threshold; preferred under uneven lighting.
    Adaptive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvertPolicy {
    Never,
    DarkBackground,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    Gray,
    Rgb,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingProfile {
    pub name: String,
    pub pad_px: u32,
    pub background: u8,
    /// 0 keeps the original size.
    pub max_dimension: u32,
    pub contrast_factor: f32,
    pub binarization: Binarization,
    pub adaptive_window: u32,
    pub adaptive_offset: i32,
    pub deskew: bool,
    pub denoise: bool,
    pub sharpen: bool,
    pub invert_policy: InvertPolicy,
    pub output: ColorMode,
}

impl Default for PreprocessingProfile {
    fn default() -> Self {
        Self::classical()
    }
}

impl PreprocessingProfile {
    /// Classical engines gain from resolution, so they get the large canvas.
    pub fn classical() -> Self {
        Self {
            name: "classical".into(),
            pad_px: 10,
            background: 255,
            max_dimension: 1000,
            contrast_factor: 2.5,
            binarization: Binarization::Otsu,
            adaptive_window: 11,
            adaptive_offset: 2,
            deskew: false,
            denoise: false,
            sharpen: false,
            invert_policy: InvertPolicy::DarkBackground,
            output: ColorMode::Gray,
        }
    }

    /// Transformer engines expect a small fixed input and color pixels.
    pub fn transformer() -> Self {
        Self {
            name: "transformer".into(),
            max_dimension: 384,
            contrast_factor: 1.5,
            output: ColorMode::Rgb,
            ..Self::classical()
        }
    }

    pub fn multilingual() -> Self {
        Self {
            name: "multilingual".into(),
            ..Self::classical()
        }
    }

    pub fn code() -> Self {
        Self {
            name: "code".into(),
            contrast_factor: 1.5,
            binarization: Binarization::Adaptive,
            deskew: true,
            sharpen: true,
            ..Self::classical()
        }
    }
}

pub fn preprocess(page: &Page, profile: &PreprocessingProfile) -> Page {
    let attempt = catch_unwind(AssertUnwindSafe(|| apply(&page.image, profile)));
    match attempt {
        Ok(Ok(image)) => {
            debug!(
                "page {} preprocessed profile={} size={}x{}",
                page.index,
                profile.name,
                image.width(),
                image.height()
            );
            page.with_image(image)
        }
        Ok(Err(err)) => {
            warn!(
                "page {} preprocessing failed (profile={}), using original: {err:#}",
                page.index, profile.name
            );
            page.clone()
        }
        Err(_) => {
            warn!(
                "page {} preprocessing panicked (profile={}), using original",
                page.index, profile.name
            );
            page.clone()
        }
    }
}

fn apply(image: &DynamicImage, p: &PreprocessingProfile) -> Result<DynamicImage> {
    if image.width() == 0 || image.height() == 0 {
        bail!("empty image {}x{}", image.width(), image.height());
    }

    let mut rgb = image.to_rgb8();
    if p.pad_px > 0 {
        rgb = pad(&rgb, p.pad_px, p.background);
    }
    if p.max_dimension > 0 {
        rgb = resize_to_fit(&rgb, p.max_dimension);
    }
    if (p.contrast_factor - 1.0).abs() > f32::EPSILON {
        rgb = enhance_contrast(&rgb, p.contrast_factor);
    }

    let mut gray = imageops::grayscale(&rgb);
    gray = match p.binarization {
        Binarization::None => gray,
        Binarization::Otsu => otsu_binarize(&gray),
        Binarization::Adaptive => adaptive_binarize(&gray, p.adaptive_window, p.adaptive_offset),
    };

    if p.deskew {
        gray = deskew(&gray, p.background);
    }
    if p.denoise {
        gray = median_filter(&gray, 1, 1);
        gray = gaussian_blur_f32(&gray, 0.5);
    }
    if p.sharpen {
        gray = sharpen3x3(&gray);
    }

    if p.invert_policy == InvertPolicy::DarkBackground && is_dark_background(&gray) {
        debug!("dark background detected, inverting");
        imageops::invert(&mut gray);
    }

    Ok(match p.output {
        ColorMode::Gray => DynamicImage::ImageLuma8(gray),
        ColorMode::Rgb => DynamicImage::ImageRgb8(DynamicImage::ImageLuma8(gray).to_rgb8()),
    })
}

fn pad(img: &RgbImage, px: u32, background: u8) -> RgbImage {
    let (w, h) = img.dimensions();
    let mut canvas = RgbImage::from_pixel(w + 2 * px, h + 2 * px, Rgb([background; 3]));
    imageops::replace(&mut canvas, img, px as i64, px as i64);
    canvas
}

/// Scales so the image fits in `max_dim` x `max_dim`, keeping the aspect ratio.
/// Small images are scaled up as well.
pub fn fit_dimensions(width: u32, height: u32, max_dim: u32) -> (u32, u32) {
    let ratio = f64::min(
        max_dim as f64 / width as f64,
        max_dim as f64 / height as f64,
    );
    let w = ((width as f64 * ratio).round() as u32).max(1);
    let h = ((height as f64 * ratio).round() as u32).max(1);
    (w, h)
}

fn resize_to_fit(img: &RgbImage, max_dim: u32) -> RgbImage {
    let (w, h) = img.dimensions();
    let (nw, nh) = fit_dimensions(w, h, max_dim);
    if (nw, nh) == (w, h) {
        return img.clone();
    }
    imageops::resize(img, nw, nh, FilterType::Lanczos3)
}

/// Blend every channel away from the mean luminance by `factor`.
fn enhance_contrast(img: &RgbImage, factor: f32) -> RgbImage {
    let gray = imageops::grayscale(img);
    let count = (gray.width() as f64 * gray.height() as f64).max(1.0);
    let sum: f64 = gray.pixels().map(|p| p[0] as f64).sum();
    let mean = (sum / count + 0.5).floor() as f32;

    let mut out = img.clone();
    for px in out.pixels_mut() {
        for c in px.0.iter_mut() {
            let v = mean + factor * (*c as f32 - mean);
            *c = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

fn otsu_binarize(gray: &GrayImage) -> GrayImage {
    threshold(gray, otsu_level(gray), ThresholdType::Binary)
}

/// Mean-of-window threshold: a pixel is white when it is brighter than
/// `mean(window) - offset`. The window is clipped at the borders.
/// imageproc's `adaptive_threshold` has no offset, so the window sums come
/// from its integral image instead.
fn adaptive_binarize(gray: &GrayImage, window: u32, offset: i32) -> GrayImage {
    let (w, h) = gray.dimensions();
    let radius = window.max(3) / 2;
    let integral = integral_image::<_, u64>(gray);

    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        let (y0, y1) = (y.saturating_sub(radius), (y + radius).min(h - 1));
        for x in 0..w {
            let (x0, x1) = (x.saturating_sub(radius), (x + radius).min(w - 1));
            let area = ((y1 - y0 + 1) * (x1 - x0 + 1)) as f64;
            let mean = sum_image_pixels(&integral, x0, y0, x1, y1)[0] as f64 / area;
            let v = gray.get_pixel(x, y)[0] as f64;
            let white = v > mean - offset as f64;
            out.put_pixel(x, y, Luma([if white { 255 } else { 0 }]));
        }
    }
    out
}

/// Maps the rectangle angle (normalized into [-90, 0)) to the counter-rotation
/// that makes text lines horizontal.
pub fn deskew_correction(rect_angle: f64) -> f64 {
    if rect_angle <= -45.0 {
        -(90.0 + rect_angle)
    } else {
        -rect_angle
    }
}

fn rect_angle(rect: &[Point<i32>; 4]) -> f64 {
    let dx = (rect[1].x - rect[0].x) as f64;
    let dy = (rect[1].y - rect[0].y) as f64;
    let mut angle = dy.atan2(dx).to_degrees();
    while angle >= 0.0 {
        angle -= 90.0;
    }
    while angle < -90.0 {
        angle += 90.0;
    }
    angle
}

fn deskew(gray: &GrayImage, background: u8) -> GrayImage {
    let dark = gray.pixels().filter(|p| p[0] < 128).count();
    if dark < 2 {
        return gray.clone();
    }
    let step = dark.div_ceil(MAX_DESKEW_POINTS).max(1);

    let points: Vec<Point<i32>> = gray
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] < 128)
        .step_by(step)
        .map(|(x, y, _)| Point::new(x as i32, y as i32))
        .collect();
    if points.len() < 3 {
        return gray.clone();
    }

    let rect = min_area_rect(&points);
    let correction = deskew_correction(rect_angle(&rect));
    if correction.abs() < MIN_DESKEW_DEGREES {
        return gray.clone();
    }

    // Angles are measured with y pointing down, the same frame in which
    // imageproc rotates clockwise for a positive theta.
    debug!("deskew by {correction:.2} degrees");
    rotate_about_center(
        gray,
        correction.to_radians() as f32,
        Interpolation::Bilinear,
        Luma([background]),
    )
}

pub fn dark_ratio(gray: &GrayImage) -> f64 {
    let mut hist = [0u64; 256];
    for p in gray.pixels() {
        hist[p[0] as usize] += 1;
    }
    let total: u64 = hist.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let dark: u64 = hist[..DARK_BUCKETS].iter().sum();
    dark as f64 / total as f64
}

fn is_dark_background(gray: &GrayImage) -> bool {
    dark_ratio(gray) > DARK_PIXEL_RATIO
}
