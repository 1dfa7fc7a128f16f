mod common;

use common::{Harness, fast_config, page, pdf_blob, png_blob};
use inkbridge::{
    classify::TextType,
    config::CascadePolicyKind,
    engine::EngineKind,
    pipeline::{CascadeOutcome, Pipeline},
    policy::PlanKind,
};

#[test]
fn printed_page_takes_the_classical_probe() {
    let h = Harness::new();
    h.classical.answer("The quick brown fox");
    let pipeline = Pipeline::new(&fast_config(), h.engines()).expect("pipeline");

    let out = pipeline.run_page(&page(0), "en");
    assert_eq!(out.text, "The quick brown fox");
    assert_eq!(
        out.outcome,
        CascadeOutcome::Validated {
            text: "The quick brown fox".into(),
            engine: EngineKind::Tesseract,
        }
    );
    assert_eq!(out.report.text_type, TextType::Printed);
    assert!(out.report.attempts[0].reused_probe);
    // One classical call serves both the classifier and the first attempt.
    assert_eq!(h.calls(), vec!["tesseract:psm11:eng"]);
}

#[test]
fn short_probe_is_handwritten_and_transformer_runs_next() {
    let h = Harness::new();
    h.classical.answer("ab");
    h.transformer.answer("Dear diary today");
    let pipeline = Pipeline::new(&fast_config(), h.engines()).expect("pipeline");

    let out = pipeline.run_page(&page(0), "en");
    assert_eq!(out.report.text_type, TextType::Handwritten);
    assert_eq!(out.text, "Dear diary today");
    assert_eq!(out.report.chosen_engine, Some(EngineKind::Trocr));
    assert_eq!(h.calls(), vec!["tesseract:psm11:eng", "trocr"]);
}

#[test]
fn failing_engines_are_skipped_without_aborting() {
    let h = Harness::new();
    h.classical.answer("1234567 890");
    h.transformer.fail("model missing");
    h.multilingual.answer("नमस्ते दुनिया");
    let pipeline = Pipeline::new(&fast_config(), h.engines()).expect("pipeline");

    let out = pipeline.run_page(&page(0), "hi");
    assert_eq!(out.report.text_type, TextType::Handwritten);
    assert_eq!(out.report.chosen_engine, Some(EngineKind::Easyocr));
    assert_eq!(out.text, "नमस्ते दुनिया");
    assert_eq!(
        h.calls(),
        vec!["tesseract:psm11:hin", "trocr", "easyocr:hi+en"]
    );
    let trocr = &out.report.attempts[0];
    assert_eq!(trocr.engine, EngineKind::Trocr);
    assert!(trocr.error.as_deref().unwrap_or("").contains("model missing"));
}

#[test]
fn failed_probe_means_printed_and_no_classical_retry() {
    let h = Harness::new();
    h.classical.fail("tesseract not installed");
    h.transformer.answer("Recovered by trocr");
    let pipeline = Pipeline::new(&fast_config(), h.engines()).expect("pipeline");

    let out = pipeline.run_page(&page(0), "en");
    assert_eq!(out.report.text_type, TextType::Printed);
    assert_eq!(out.text, "Recovered by trocr");
    assert_eq!(h.calls(), vec!["tesseract:psm11:eng", "trocr"]);
}

#[test]
fn exhausted_page_yields_the_sentinel() {
    let h = Harness::new();
    h.classical.answer("ab");
    h.transformer.answer("");
    h.multilingual.answer("....");
    let pipeline = Pipeline::new(&fast_config(), h.engines()).expect("pipeline");

    let out = pipeline.run_page(&page(0), "en");
    assert_eq!(out.outcome, CascadeOutcome::Exhausted);
    assert_eq!(out.text, "Unable to extract text");
    assert_eq!(out.report.chosen_engine, None);
    assert_eq!(out.report.attempts.len(), 3);
}

#[test]
fn two_page_pdf_keeps_page_order_and_survives_a_bad_page() {
    let h = Harness::new();
    *h.rasterizer.pages.lock().expect("pages") = 2;
    // page 1
    h.classical.answer("Hello\n");
    h.transformer.answer("Hello  ");
    // page 2
    h.classical.answer("ab");
    h.transformer.answer("");
    h.multilingual.answer("..");
    let pipeline = Pipeline::new(&fast_config(), h.engines()).expect("pipeline");

    let out = pipeline.run_document(&pdf_blob(), "en").expect("run");
    assert_eq!(out.text, "Hello\nUnable to extract text");
    assert!(out.found_text);
    assert_eq!(out.pages.len(), 2);
    assert_eq!(out.pages[0].page_index, 0);
    assert_eq!(out.pages[1].page_index, 1);
    assert_eq!(h.calls()[0], "rasterize");
}

#[test]
fn image_document_decodes_to_one_page() {
    let h = Harness::new();
    h.classical.answer("A printed receipt line");
    let pipeline = Pipeline::new(&fast_config(), h.engines()).expect("pipeline");

    let out = pipeline.run_document(&png_blob(), "en").expect("run");
    assert_eq!(out.pages.len(), 1);
    assert_eq!(out.text, "A printed receipt line");
    assert!(!h.calls().contains(&"rasterize".to_string()));
}

#[test]
fn compare_all_keeps_the_higher_score() {
    let h = Harness::new();
    h.classical.answer("one two three four");
    h.multilingual.answer("one two three four five \"six\"");
    let mut cfg = fast_config();
    cfg.cascade.policy = CascadePolicyKind::CompareAll;
    let pipeline = Pipeline::new(&cfg, h.engines()).expect("pipeline");

    let out = pipeline.run_page(&page(0), "en");
    assert_eq!(out.report.plan, PlanKind::CompareAll);
    assert_eq!(out.report.chosen_engine, Some(EngineKind::Easyocr));
    assert_eq!(out.text, "one two three four five \"six\"");
}

#[test]
fn compare_all_tie_goes_to_the_first_engine() {
    let h = Harness::new();
    h.classical.answer("alpha beta gamma");
    h.multilingual.answer("delta epsilon zeta");
    let mut cfg = fast_config();
    cfg.cascade.policy = CascadePolicyKind::CompareAll;
    let pipeline = Pipeline::new(&cfg, h.engines()).expect("pipeline");

    let out = pipeline.run_page(&page(0), "en");
    assert_eq!(out.report.chosen_engine, Some(EngineKind::Tesseract));
}

#[test]
fn compare_all_handwriting_falls_back_to_transformer() {
    let h = Harness::new();
    h.classical.answer("ab");
    h.multilingual.answer("");
    h.transformer.answer("written by hand");
    let mut cfg = fast_config();
    cfg.cascade.policy = CascadePolicyKind::CompareAll;
    let pipeline = Pipeline::new(&cfg, h.engines()).expect("pipeline");

    let out = pipeline.run_page(&page(0), "en");
    assert_eq!(out.report.chosen_engine, Some(EngineKind::Trocr));
    assert_eq!(
        h.calls(),
        vec!["tesseract:psm11:eng", "easyocr:en", "trocr"]
    );
}

#[test]
fn code_page_uses_block_mode_and_never_falls_back() {
    let h = Harness::new();
    h.classical.answer("def main():\n    return 1");
    h.classical.answer("x");
    let pipeline = Pipeline::new(&fast_config(), h.engines()).expect("pipeline");

    let out = pipeline.run_page(&page(0), "en");
    assert_eq!(out.report.text_type, TextType::Code);
    assert_eq!(out.report.plan, PlanKind::CodeBlock);
    assert_eq!(out.text, "Unable to extract text");
    assert_eq!(h.calls(), vec!["tesseract:psm11:eng", "tesseract:psm6:eng"]);
}

#[test]
fn code_page_keeps_indentation_and_repairs_format_markers() {
    let h = Harness::new();
    h.classical.answer("def f(n):");
    h.classical
        .answer("def f(n):\r\n    print(\u{201C}n=#d\u{201D} % n)\r\n    return n");
    let pipeline = Pipeline::new(&fast_config(), h.engines()).expect("pipeline");

    let out = pipeline.run_page(&page(0), "en");
    assert_eq!(
        out.text,
        "def f(n):\n    print(\"n=%d\" % n)\n    return n"
    );
}

#[test]
fn code_detection_can_be_switched_off() {
    let h = Harness::new();
    h.classical.answer("x = compute(total)");
    let mut cfg = fast_config();
    cfg.classifier.detect_code = false;
    let pipeline = Pipeline::new(&cfg, h.engines()).expect("pipeline");

    let out = pipeline.run_page(&page(0), "en");
    assert_eq!(out.report.text_type, TextType::Printed);
    assert_eq!(h.calls(), vec!["tesseract:psm11:eng"]);
}

#[test]
fn preprocessing_enabled_still_runs_the_cascade() {
    let h = Harness::new();
    h.classical.answer("A fully preprocessed page");
    let pipeline = Pipeline::new(&inkbridge::config::Config::default(), h.engines())
        .expect("pipeline");

    let out = pipeline.run_page(&page(0), "en");
    assert_eq!(out.text, "A fully preprocessed page");
}

#[test]
fn compare_all_does_not_rerun_a_listed_fallback() {
    let h = Harness::new();
    h.classical.answer("ab");
    h.transformer.answer("");
    h.multilingual.answer("");
    let mut cfg = fast_config();
    cfg.cascade.policy = CascadePolicyKind::CompareAll;
    cfg.cascade.compare_engines = vec![
        EngineKind::Tesseract,
        EngineKind::Trocr,
        EngineKind::Easyocr,
    ];
    let pipeline = Pipeline::new(&cfg, h.engines()).expect("pipeline");

    let out = pipeline.run_page(&page(0), "en");
    assert_eq!(out.report.text_type, TextType::Handwritten);
    assert_eq!(out.outcome, CascadeOutcome::Exhausted);
    assert_eq!(
        h.calls(),
        vec!["tesseract:psm11:eng", "trocr", "easyocr:en"]
    );
    assert_eq!(out.report.attempts.len(), 3);
}
