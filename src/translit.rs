//! Built-in ITRANS to Devanagari transliteration.
//!
//! Greedy longest-match over the ITRANS token tables. A consonant stays
//! "pending" until the next token decides whether it takes a vowel sign,
//! the inherent vowel (`a`), or a virama.

use crate::engine::Transliterator;
use anyhow::{Result, bail};

const VIRAMA: char = '\u{094D}';
const MAX_TOKEN_CHARS: usize = 3;

#[derive(Debug, Clone, Copy)]
enum Token {
    Consonant(&'static str),
    /// Independent form, dependent sign (`None` for the inherent vowel).
    Vowel(&'static str, Option<&'static str>),
    Mark(&'static str),
    Symbol(&'static str),
}

use Token::{Consonant, Mark, Symbol, Vowel};

const TABLE: &[(&str, Token)] = &[
    ("a", Vowel("अ", None)),
    ("aa", Vowel("आ", Some("\u{093E}"))),
    ("A", Vowel("आ", Some("\u{093E}"))),
    ("i", Vowel("इ", Some("\u{093F}"))),
    ("ii", Vowel("ई", Some("\u{0940}"))),
    ("I", Vowel("ई", Some("\u{0940}"))),
    ("u", Vowel("उ", Some("\u{0941}"))),
    ("uu", Vowel("ऊ", Some("\u{0942}"))),
    ("U", Vowel("ऊ", Some("\u{0942}"))),
    ("RRi", Vowel("ऋ", Some("\u{0943}"))),
    ("R^i", Vowel("ऋ", Some("\u{0943}"))),
    ("e", Vowel("ए", Some("\u{0947}"))),
    ("ai", Vowel("ऐ", Some("\u{0948}"))),
    ("o", Vowel("ओ", Some("\u{094B}"))),
    ("au", Vowel("औ", Some("\u{094C}"))),
    ("k", Consonant("क")),
    ("kh", Consonant("ख")),
    ("g", Consonant("ग")),
    ("gh", Consonant("घ")),
    ("~N", Consonant("ङ")),
    ("ch", Consonant("च")),
    ("Ch", Consonant("छ")),
    ("chh", Consonant("छ")),
    ("j", Consonant("ज")),
    ("jh", Consonant("झ")),
    ("~n", Consonant("ञ")),
    ("T", Consonant("ट")),
    ("Th", Consonant("ठ")),
    ("D", Consonant("ड")),
    ("Dh", Consonant("ढ")),
    ("N", Consonant("ण")),
    ("t", Consonant("त")),
    ("th", Consonant("थ")),
    ("d", Consonant("द")),
    ("dh", Consonant("ध")),
    ("n", Consonant("न")),
    ("p", Consonant("प")),
    ("ph", Consonant("फ")),
    ("b", Consonant("ब")),
    ("bh", Consonant("भ")),
    ("m", Consonant("म")),
    ("y", Consonant("य")),
    ("r", Consonant("र")),
    ("l", Consonant("ल")),
    ("v", Consonant("व")),
    ("w", Consonant("व")),
    ("sh", Consonant("श")),
    ("Sh", Consonant("ष")),
    ("s", Consonant("स")),
    ("h", Consonant("ह")),
    ("x", Consonant("क्ष")),
    ("GY", Consonant("ज्ञ")),
    ("j~n", Consonant("ज्ञ")),
    ("q", Consonant("क़")),
    ("K", Consonant("ख़")),
    ("G", Consonant("ग़")),
    ("z", Consonant("ज़")),
    ("f", Consonant("फ़")),
    (".D", Consonant("ड़")),
    (".Dh", Consonant("ढ़")),
    ("M", Mark("\u{0902}")),
    (".n", Mark("\u{0902}")),
    (".N", Mark("\u{0901}")),
    ("H", Mark("\u{0903}")),
    (".h", Mark("\u{094D}")),
    (".a", Symbol("ऽ")),
    ("OM", Symbol("ॐ")),
    ("|", Symbol("।")),
    ("||", Symbol("॥")),
    ("0", Symbol("०")),
    ("1", Symbol("१")),
    ("2", Symbol("२")),
    ("3", Symbol("३")),
    ("4", Symbol("४")),
    ("5", Symbol("५")),
    ("6", Symbol("६")),
    ("7", Symbol("७")),
    ("8", Symbol("८")),
    ("9", Symbol("९")),
];

fn lookup(s: &str) -> Option<Token> {
    TABLE.iter().find(|(k, _)| *k == s).map(|(_, t)| *t)
}

/// Converts ITRANS (case-sensitive) to Devanagari. Characters outside the
/// tables pass through unchanged.
pub fn itrans_to_devanagari(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() * 3);
    let mut pending = false;
    let mut i = 0;

    while i < chars.len() {
        let matched = (1..=MAX_TOKEN_CHARS.min(chars.len() - i))
            .rev()
            .find_map(|n| {
                let s: String = chars[i..i + n].iter().collect();
                lookup(&s).map(|t| (t, n))
            });

        let Some((token, n)) = matched else {
            if pending {
                out.push(VIRAMA);
                pending = false;
            }
            out.push(chars[i]);
            i += 1;
            continue;
        };

        match token {
            Consonant(c) => {
                if pending {
                    out.push(VIRAMA);
                }
                out.push_str(c);
                pending = true;
            }
            Vowel(independent, sign) => {
                if pending {
                    if let Some(sign) = sign {
                        out.push_str(sign);
                    }
                    pending = false;
                } else {
                    out.push_str(independent);
                }
            }
            // A mark right after a consonant implies the inherent vowel.
            Mark(m) => {
                out.push_str(m);
                pending = false;
            }
            Symbol(s) => {
                if pending {
                    out.push(VIRAMA);
                    pending = false;
                }
                out.push_str(s);
            }
        }
        i += n;
    }

    if pending {
        out.push(VIRAMA);
    }
    out
}

/// Transliterator backed by the ITRANS tables above.
#[derive(Debug, Clone, Copy, Default)]
pub struct ItransTransliterator;

impl Transliterator for ItransTransliterator {
    fn transliterate(&self, text: &str, scheme: &str) -> Result<String> {
        if !scheme.eq_ignore_ascii_case("devanagari") {
            bail!("unsupported transliteration scheme: {scheme}");
        }
        Ok(itrans_to_devanagari(text))
    }
}
