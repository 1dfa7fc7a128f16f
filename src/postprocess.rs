use crate::config::Normalize;
use anyhow::{Context, Result};
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Rule-based repair of OCR output. Both passes are pure functions of their input.
#[derive(Debug, Clone)]
pub struct Normalizer {
    enabled: bool,
    nfkc: bool,
    min_line_chars: usize,
    trailing_stray: Vec<char>,
    rules: Vec<(Regex, String)>,
    comment_marker: char,
    format_marker: char,
    format_spec_chars: Vec<char>,
}

impl Normalizer {
    pub fn from_config(cfg: &Normalize) -> Result<Self> {
        let rules = cfg
            .substitutions
            .iter()
            .map(|s| {
                Regex::new(&s.pattern)
                    .map(|re| (re, s.replacement.clone()))
                    .with_context(|| format!("compiling substitution pattern: {}", s.pattern))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            enabled: cfg.enabled,
            nfkc: cfg.unicode_nfkc,
            min_line_chars: cfg.min_line_chars,
            trailing_stray: cfg.trailing_stray.chars().collect(),
            rules,
            comment_marker: cfg.comment_marker,
            format_marker: cfg.format_marker,
            format_spec_chars: cfg.format_spec_chars.chars().collect(),
        })
    }

    /// Line-oriented repair for prose. Drops short and non-alphanumeric lines.
    pub fn normalize(&self, text: &str) -> String {
        if !self.enabled {
            return text.to_string();
        }

        let text = if self.nfkc {
            text.nfkc().collect::<String>()
        } else {
            text.to_string()
        };

        text.lines()
            .filter_map(|l| self.normalize_line(l))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn normalize_line(&self, line: &str) -> Option<String> {
        let line = collapse_whitespace(&straighten_quotes(line));
        let mut line = self.strip_trailing(&line).to_string();

        for (re, replacement) in &self.rules {
            line = re.replace_all(&line, replacement.as_str()).into_owned();
        }

        let line = collapse_whitespace(&line);
        let line = self.strip_trailing(&line);

        let keep = line.chars().count() >= self.min_line_chars
            && line.chars().any(char::is_alphanumeric);
        keep.then(|| line.to_string())
    }

    fn strip_trailing<'a>(&self, line: &'a str) -> &'a str {
        line.trim_end_matches(|c: char| c.is_whitespace() || self.trailing_stray.contains(&c))
    }

    /// Repair for source code: indentation and every other character are left
    /// alone except line endings, smart quotes and misread format markers.
    pub fn normalize_code(&self, text: &str) -> String {
        if !self.enabled {
            return text.to_string();
        }

        let text = text.replace("\r\n", "\n").replace('\r', "\n");
        text.split('\n')
            .map(|line| {
                let body_start = line.len() - line.trim_start_matches([' ', '\t']).len();
                let (indent, body) = line.split_at(body_start);
                let body = self.repair_format_markers(&straighten_quotes(body));
                format!("{indent}{body}")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Inside a quoted segment a comment marker followed by a format-spec
    /// character (`"#d"`, `"#.2f"`) is a misread format marker.
    fn repair_format_markers(&self, line: &str) -> String {
        let chars: Vec<char> = line.chars().collect();
        let mut out = String::with_capacity(line.len());
        let mut quote: Option<char> = None;
        let mut escaped = false;

        for (i, &ch) in chars.iter().enumerate() {
            if escaped {
                escaped = false;
                out.push(ch);
                continue;
            }
            match (quote, ch) {
                (Some(_), '\\') => escaped = true,
                (Some(q), c) if c == q => quote = None,
                (None, '"' | '\'') => quote = Some(ch),
                (Some(_), c) if c == self.comment_marker => {
                    let next_is_spec = chars
                        .get(i + 1)
                        .is_some_and(|n| self.format_spec_chars.contains(n));
                    if next_is_spec {
                        out.push(self.format_marker);
                        continue;
                    }
                }
                _ => {}
            }
            out.push(ch);
        }
        out
    }
}

pub fn straighten_quotes(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{00AB}' | '\u{00BB}' => '"',
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => '\'',
            other => other,
        })
        .collect()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Results of separate images are joined in order, never re-scored.
pub fn merge_pages(parts: &[String]) -> String {
    parts.join("\n")
}
