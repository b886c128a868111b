//! Text normalization into speakable form.
//!
//! Steps, in order:
//! - line breaks become sentence breaks
//! - emoji and pictographs are stripped
//! - caller replacements, then the built-in symbol table for the language
//! - whitespace runs collapse, ends are trimmed
//! - truncation to `max_chars` with a trailing ellipsis

use tracing::trace;

/// Default truncation limit, in characters.
pub const DEFAULT_MAX_CHARS: usize = 200;

/// Appended when text is truncated.
pub const ELLIPSIS: &str = "...";

const EN_SYMBOLS: &[(&str, &str)] = &[
    ("%", " percent"),
    ("％", " percent"),
    ("&", " and "),
    ("+", " plus "),
    ("@", " at "),
    ("=", " equals "),
    ("#", " number "),
];

const JA_SYMBOLS: &[(&str, &str)] = &[
    ("%", "パーセント"),
    ("％", "パーセント"),
    ("&", "アンド"),
    ("＆", "アンド"),
    ("+", "プラス"),
    ("＋", "プラス"),
    ("@", "アット"),
    ("=", "イコール"),
    ("#", "番"),
    ("℃", "度"),
];

#[derive(Debug, Clone)]
pub struct TextSanitizer {
    max_chars: usize,
    language: String,
    replacements: Vec<(String, String)>,
}

impl Default for TextSanitizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHARS)
    }
}

impl TextSanitizer {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars,
            language: "en".to_string(),
            replacements: Vec::new(),
        }
    }

    /// Caller replacement table, applied in order before the built-in table.
    pub fn with_replacements(mut self, replacements: Vec<(String, String)>) -> Self {
        self.replacements = replacements;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn set_language(&mut self, language: &str) {
        self.language = language.to_string();
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn sanitize(&self, raw: &str) -> String {
        let stripped: String = raw.chars().filter(|c| !is_pictographic(*c)).collect();
        let mut text = collapse_newlines(&stripped);

        for (symbol, phrase) in &self.replacements {
            if !symbol.is_empty() {
                text = text.replace(symbol.as_str(), phrase);
            }
        }
        for (symbol, phrase) in builtin_symbols(&self.language) {
            text = text.replace(symbol, phrase);
        }

        let text = collapse_whitespace(&text);
        let out = truncate(&text, self.max_chars);
        trace!(target: "herald::sanitizer", raw_len = raw.len(), out_len = out.len(), "Sanitized text");
        out
    }
}

/// Built-in symbol table for a language tag; `ja*` selects Japanese words,
/// anything else English.
pub fn builtin_symbols(language: &str) -> &'static [(&'static str, &'static str)] {
    if language.to_ascii_lowercase().starts_with("ja") {
        JA_SYMBOLS
    } else {
        EN_SYMBOLS
    }
}

fn is_terminal_punctuation(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '。' | '！' | '？')
}

fn collapse_newlines(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 8);
    let mut pending_break = false;

    for ch in raw.chars() {
        if ch == '\n' || ch == '\r' {
            pending_break = true;
            continue;
        }
        if pending_break && !ch.is_whitespace() {
            let kept = out.trim_end().len();
            out.truncate(kept);
            match out.chars().last() {
                Some(last) if is_terminal_punctuation(last) => out.push(' '),
                Some(_) => out.push_str(". "),
                None => {}
            }
            pending_break = false;
        }
        out.push(ch);
    }
    out
}

/// Emoji, pictographs, flags and their joiners/modifiers.
fn is_pictographic(c: char) -> bool {
    matches!(
        c as u32,
        0x1F000..=0x1FAFF
            | 0x2600..=0x27BF
            | 0x2B00..=0x2BFF
            | 0xFE00..=0xFE0F
            | 0x200D
            | 0x20E3
            | 0xE0020..=0xE007F
    )
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    let kept = cut.trim_end().len();
    cut.truncate(kept);
    cut.push_str(ELLIPSIS);
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_becomes_word() {
        let s = TextSanitizer::default();
        assert_eq!(s.sanitize("50%"), "50 percent");
        assert_eq!(s.sanitize("50%"), s.sanitize("50%"));
    }

    #[test]
    fn percent_in_japanese() {
        let s = TextSanitizer::default().with_language("ja-JP");
        assert_eq!(s.sanitize("50%"), "50パーセント");
        assert_eq!(s.sanitize("降水確率50％"), "降水確率50パーセント");
    }

    #[test]
    fn newlines_become_sentences() {
        let s = TextSanitizer::default();
        assert_eq!(s.sanitize("Line one\nLine two"), "Line one. Line two");
        assert_eq!(s.sanitize("Done!\r\n\r\nNext"), "Done! Next");
        assert_eq!(s.sanitize("\n\nLeading\n"), "Leading");
        assert_eq!(s.sanitize("a\n   \nb"), "a. b");
    }

    #[test]
    fn emoji_are_stripped() {
        let s = TextSanitizer::default();
        assert_eq!(s.sanitize("Good morning ☀️ 😀"), "Good morning");
        assert_eq!(s.sanitize("🎉🎉"), "");
        assert_eq!(s.sanitize("Go 🇯🇵 team"), "Go team");
        assert_eq!(s.sanitize("🎉\n🎉"), "");
        assert_eq!(s.sanitize("Hi 😀\nthere"), "Hi. there");
    }

    #[test]
    fn caller_table_runs_before_builtin() {
        let s = TextSanitizer::default()
            .with_replacements(vec![("%".into(), " per cent".into()), ("km".into(), "kilometers".into())]);
        assert_eq!(s.sanitize("5km at 20%"), "5kilometers at 20 per cent");
    }

    #[test]
    fn truncates_with_ellipsis() {
        let s = TextSanitizer::new(10);
        assert_eq!(s.sanitize("abcdefghijklmnop"), "abcdefghij...");
        assert_eq!(s.sanitize("abcd efgh ijkl"), "abcd efgh...");
        assert_eq!(s.sanitize("short"), "short");
    }

    #[test]
    fn truncation_counts_chars_not_bytes() {
        let s = TextSanitizer::new(3);
        assert_eq!(s.sanitize("あいうえお"), "あいう...");
    }

    #[test]
    fn whitespace_only_is_empty() {
        let s = TextSanitizer::default();
        assert_eq!(s.sanitize("   \n\t  "), "");
        assert_eq!(s.sanitize(""), "");
    }

    #[test]
    fn default_output_is_bounded() {
        let s = TextSanitizer::default();
        let long = "word ".repeat(100);
        let out = s.sanitize(&long);
        assert!(out.chars().count() <= DEFAULT_MAX_CHARS + ELLIPSIS.len());
        assert!(out.ends_with(ELLIPSIS));
    }
}
