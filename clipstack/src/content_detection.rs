//! Content type classification for captured text
//!
//! Ordered, mutually exclusive heuristics; the first match wins. The
//! classifier is pure and total: every input maps to exactly one tag, and
//! the same input always maps to the same tag. Image and file-URL captures
//! are tagged directly by the capture path and never reach these heuristics.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::interface::ContentType;

/// Hex color: `#` followed by exactly six hex digits.
static HEX_COLOR_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("valid hex color regex"));

/// Keywords that mark a snippet as source code. Checked with word
/// boundaries so prose like "classic" does not trip the detector.
static CODE_KEYWORD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(function|class|import|const|let|var)\b").expect("valid code keyword regex")
});

fn is_url(text: &str) -> bool {
    if text.starts_with("http://") || text.starts_with("https://") {
        // Prefix alone is not enough; reject strings the URL parser chokes on.
        return Url::parse(text).is_ok();
    }
    // Bare domains copied from a browser's location bar.
    (text.contains(".com") || text.contains(".org")) && !text.contains(char::is_whitespace)
}

fn is_file_path(text: &str) -> bool {
    text.starts_with('/') || text.starts_with('~')
}

fn is_json_like(text: &str) -> bool {
    (text.starts_with('{') && text.ends_with('}'))
        || (text.starts_with('[') && text.ends_with(']'))
}

fn is_markdown(text: &str) -> bool {
    // A heading needs `# ` — a bare `#` prefix would shadow hex colors.
    text.contains("```")
        || text.starts_with("# ")
        || text.contains("**")
        || text.contains("- [ ]")
}

fn is_code(text: &str) -> bool {
    CODE_KEYWORD_REGEX.is_match(text)
}

fn is_hex_color(text: &str) -> bool {
    HEX_COLOR_REGEX.is_match(text)
}

/// Classify raw captured text into exactly one [`ContentType`].
pub fn classify(text: &str) -> ContentType {
    let trimmed = text.trim();

    if is_url(trimmed) {
        return ContentType::Url;
    }
    if is_file_path(trimmed) {
        return ContentType::File;
    }
    if is_json_like(trimmed) {
        return ContentType::Json;
    }
    if is_markdown(trimmed) {
        return ContentType::Markdown;
    }
    if is_code(trimmed) {
        return ContentType::Code;
    }
    if is_hex_color(trimmed) {
        return ContentType::Color;
    }
    ContentType::PlainText
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_detection() {
        assert_eq!(classify("https://github.com"), ContentType::Url);
        assert_eq!(classify("http://example.com/path?q=1"), ContentType::Url);
        assert_eq!(classify("rust-lang.org"), ContentType::Url);
        // Whitespace means prose, not a bare domain.
        assert_eq!(
            classify("I bought example.com yesterday"),
            ContentType::PlainText
        );
    }

    #[test]
    fn test_file_path_detection() {
        assert_eq!(classify("/usr/local/bin/rustc"), ContentType::File);
        assert_eq!(classify("~/Documents/notes.txt"), ContentType::File);
    }

    #[test]
    fn test_json_detection() {
        assert_eq!(classify(r#"{"key": "value"}"#), ContentType::Json);
        assert_eq!(classify("[1, 2, 3]"), ContentType::Json);
        assert_eq!(classify("{unbalanced"), ContentType::PlainText);
    }

    #[test]
    fn test_markdown_detection() {
        assert_eq!(classify("# Heading"), ContentType::Markdown);
        assert_eq!(classify("some **bold** text"), ContentType::Markdown);
        assert_eq!(classify("```rust\nfn main() {}\n```"), ContentType::Markdown);
        assert_eq!(classify("- [ ] todo item"), ContentType::Markdown);
    }

    #[test]
    fn test_code_detection() {
        assert_eq!(classify("const x = 42;"), ContentType::Code);
        assert_eq!(classify("function greet() {}"), ContentType::Code);
        assert_eq!(classify("let mut total = 0"), ContentType::Code);
        // Word boundary: "classic" is not "class".
        assert_eq!(classify("a classic mistake"), ContentType::PlainText);
    }

    #[test]
    fn test_hex_color_detection() {
        assert_eq!(classify("#FF5733"), ContentType::Color);
        assert_eq!(classify("#ff5733"), ContentType::Color);
        // Wrong length falls through to plain text.
        assert_eq!(classify("#FF573"), ContentType::PlainText);
        assert_eq!(classify("#FF57331"), ContentType::PlainText);
    }

    #[test]
    fn test_first_match_wins() {
        // A JSON-looking URL is still a URL: heuristics run in order.
        assert_eq!(classify("https://example.com/{id}"), ContentType::Url);
        // Markdown markers inside a code snippet: markdown is checked first.
        assert_eq!(
            classify("**bold** const x = 1"),
            ContentType::Markdown
        );
    }

    #[test]
    fn test_total_and_deterministic() {
        let inputs = ["", " ", "hello", "#", "{", "1234", "日本語", "\n\t"];
        for input in inputs {
            let first = classify(input);
            let second = classify(input);
            assert_eq!(first, second, "classification must be stable for {input:?}");
        }
    }
}
