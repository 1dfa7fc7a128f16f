mod common;

use common::{Harness, pdf_blob, png_blob};
use inkbridge::{
    config::Limits,
    document::{ContentKind, FileBlob, classify_mimetype, decode_pages},
    error::{InputError, PipelineError},
    preprocess::ColorMode,
};

#[test]
fn mimetype_classification() {
    assert_eq!(classify_mimetype("image/jpeg"), ContentKind::Image);
    assert_eq!(classify_mimetype("application/pdf"), ContentKind::Pdf);
    assert_eq!(
        classify_mimetype("application/msword"),
        ContentKind::Unsupported("application/msword".into())
    );
    assert_eq!(classify_mimetype("text/plain"), ContentKind::Unknown);
}

#[test]
fn content_kind_is_sniffed_when_not_declared() {
    let png = png_blob();
    let sniffed = FileBlob::new(png.bytes.clone(), None, None);
    assert_eq!(sniffed.content_kind(), ContentKind::Image);

    let octet = FileBlob::new(png.bytes, Some("application/octet-stream".into()), None);
    assert_eq!(octet.content_kind(), ContentKind::Image);

    let by_name = FileBlob::new(b"????".to_vec(), None, Some("report.pdf".into()));
    assert_eq!(by_name.content_kind(), ContentKind::Pdf);

    let pdf = FileBlob::new(pdf_blob().bytes, None, None);
    assert_eq!(pdf.content_kind(), ContentKind::Pdf);
}

#[test]
fn pages_are_rgb_and_capped() {
    let h = Harness::new();
    *h.rasterizer.pages.lock().expect("pages") = 4;
    let limits = Limits {
        max_pages: 3,
        ..Limits::default()
    };
    let pages = decode_pages(&pdf_blob(), h.rasterizer.as_ref(), &limits).expect("decode");
    assert_eq!(pages.len(), 3);
    assert!(pages.iter().all(|p| p.color_mode() == ColorMode::Rgb));
    assert_eq!(pages[2].index, 2);
}

#[test]
fn empty_pdf_is_undecodable() {
    let h = Harness::new();
    *h.rasterizer.pages.lock().expect("pages") = 0;
    let err = decode_pages(&pdf_blob(), h.rasterizer.as_ref(), &Limits::default())
        .expect_err("zero pages");
    assert!(matches!(
        err,
        PipelineError::Input(InputError::Undecodable { .. })
    ));
}

#[test]
fn oversized_input_is_rejected() {
    let h = Harness::new();
    let limits = Limits {
        max_input_file_bytes: 4,
        ..Limits::default()
    };
    let err = decode_pages(&png_blob(), h.rasterizer.as_ref(), &limits).expect_err("too big");
    assert_eq!(err.error_code(), "INPUT_TOO_LARGE");
    assert!(h.calls().is_empty());
}

#[test]
fn from_path_keeps_the_filename() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("scan.png");
    std::fs::write(&path, png_blob().bytes).expect("write");
    let blob = FileBlob::from_path(&path, None).expect("read");
    assert_eq!(blob.filename.as_deref(), Some("scan.png"));
    assert_eq!(blob.content_kind(), ContentKind::Image);
}
