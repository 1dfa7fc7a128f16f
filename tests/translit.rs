use inkbridge::{engine::Transliterator, translit::{ItransTransliterator, itrans_to_devanagari}};

#[test]
fn converts_common_words() {
    assert_eq!(itrans_to_devanagari("namaste"), "नमस्ते");
    assert_eq!(itrans_to_devanagari("mujhe chaahiye"), "मुझे चाहिये");
    assert_eq!(itrans_to_devanagari("kii"), "की");
}

#[test]
fn independent_vowels_digits_and_passthrough() {
    assert_eq!(itrans_to_devanagari("a"), "अ");
    assert_eq!(itrans_to_devanagari("2024"), "२०२४");
    assert_eq!(itrans_to_devanagari("OM"), "ॐ");
    assert_eq!(itrans_to_devanagari("?!"), "?!");
}

#[test]
fn dangling_consonant_takes_a_virama() {
    assert_eq!(itrans_to_devanagari("bhaarat"), "भारत्");
    assert_eq!(itrans_to_devanagari("bhaarata"), "भारत");
}

#[test]
fn only_devanagari_scheme_is_supported() {
    let t = ItransTransliterator;
    assert_eq!(t.transliterate("kii", "Devanagari").expect("scheme"), "की");
    assert!(t.transliterate("kii", "tamil").is_err());
}
