mod common;

use common::{Harness, fast_config, page};
use inkbridge::{
    classify::{TextType, classify, has_code_indicator, printed_or_handwritten},
    config::Config,
    engine::EngineKind,
    quality::TextCandidate,
};

#[test]
fn indicator_list_matches_substrings() {
    let cfg = Config::default();
    let ind = &cfg.classifier.code_indicators;
    assert!(has_code_indicator(ind, "import os"));
    assert!(has_code_indicator(ind, "x = 1"));
    assert!(has_code_indicator(ind, "// comment"));
    assert!(!has_code_indicator(ind, "Plain prose only"));
    assert!(!has_code_indicator(&[String::new()], "anything"));
}

#[test]
fn few_words_or_invalid_probe_means_handwritten() {
    let probe = |t: &str| TextCandidate::new(t, EngineKind::Tesseract);
    assert_eq!(printed_or_handwritten(&probe("ab"), 3), TextType::Handwritten);
    assert_eq!(printed_or_handwritten(&probe("two words"), 3), TextType::Handwritten);
    assert_eq!(printed_or_handwritten(&probe("three whole words"), 3), TextType::Printed);
}

#[test]
fn classification_makes_exactly_one_probe_call() {
    let h = Harness::new();
    h.classical.answer("function add(a, b) { return a + b }");
    let cfg = fast_config();

    let c = classify(&cfg, &h.engines(), &page(0), "ru");
    assert_eq!(c.text_type, TextType::Code);
    assert_eq!(c.probe.map(|p| p.source_engine), Some(EngineKind::Tesseract));
    assert_eq!(h.calls(), vec!["tesseract:psm11:rus"]);
}

#[test]
fn probe_failure_is_printed_without_candidate() {
    let h = Harness::new();
    h.classical.fail("segfault");
    let c = classify(&fast_config(), &h.engines(), &page(0), "en");
    assert_eq!(c.text_type, TextType::Printed);
    assert!(c.probe.is_none());
}
