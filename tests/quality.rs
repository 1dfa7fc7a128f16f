use inkbridge::{
    engine::EngineKind,
    quality::{TextCandidate, is_valid, pick_best, score},
};

#[test]
fn validity_needs_six_chars_and_a_letter() {
    assert!(!is_valid(""));
    assert!(!is_valid("Hello"));
    assert!(is_valid("Hello!"));
    assert!(!is_valid("123456"));
    assert!(!is_valid("...!!!"));
    assert!(is_valid("12345a"));
    assert!(is_valid("नमस्ते दुनिया"));
}

#[test]
fn score_counts_words_and_weights_quotes() {
    assert_eq!(score("one two three"), 3);
    assert_eq!(score("he said \"hi\""), 3 + 4);
    assert_eq!(score("it\u{2019}s"), 1 + 2);
    assert!(score("one two three four") > score("one two three"));
}

#[test]
fn best_candidate_ignores_invalid_and_prefers_first_on_tie() {
    let a = TextCandidate::new("alpha beta gamma", EngineKind::Tesseract);
    let b = TextCandidate::new("delta epsilon zeta", EngineKind::Easyocr);
    let junk = TextCandidate::new("x x x x x x x x 1", EngineKind::Trocr);
    assert!(junk.is_valid);

    let tie = [a.clone(), b.clone()];
    assert_eq!(
        pick_best(&tie).map(|c| c.source_engine),
        Some(EngineKind::Tesseract)
    );

    let invalid = TextCandidate::new("1 2 3 4 5 6 7 8", EngineKind::Tesseract);
    let mixed = [invalid, b.clone()];
    assert_eq!(
        pick_best(&mixed).map(|c| c.source_engine),
        Some(EngineKind::Easyocr)
    );

    assert!(pick_best(&[TextCandidate::new("ab", EngineKind::Trocr)]).is_none());
    assert!(pick_best(&[]).is_none());
}
