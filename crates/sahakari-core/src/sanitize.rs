//! Sanitization of untrusted CMS text and URLs.
//!
//! Text is reduced to plain visible characters before it reaches the markup
//! layer, and URLs are only accepted when their scheme is on the allow list.
//! Rejected values are returned as `None`; callers must omit the field rather
//! than fall back to the raw input.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Elements whose content is never visible text and may execute.
static EXECUTABLE_ELEMENT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<\s*(?:script|style|iframe|object|embed|noscript|template)\b[^>]*>.*?<\s*/\s*(?:script|style|iframe|object|embed|noscript|template)\s*>",
    )
    .expect("executable element regex should compile")
});

/// HTML comments, including conditional comments.
static COMMENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?(?:-->|$)").expect("comment regex should compile"));

/// Any complete tag.
static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[a-zA-Z/!?][^>]*>").expect("tag regex should compile"));

/// A tag opened at the end of input that was never closed.
static DANGLING_TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[a-zA-Z/!?][^>]*$").expect("dangling tag regex should compile"));

/// Strip anything capable of carrying markup from `raw`, keeping visible text.
///
/// Executable elements are removed together with their content, every other
/// tag is removed but its inner text is kept. Control characters other than
/// newline and tab are dropped. A lone `<` that does not start a tag (as in
/// `a < b`) is preserved; the markup layer escapes it on output.
///
/// Stripping repeats until nothing changes, so text left around a removed
/// tag can never join into a new one.
pub fn sanitize_text(raw: &str) -> String {
    let mut current = strip_once(raw);
    loop {
        let next = strip_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn strip_once(input: &str) -> String {
    let without_exec = EXECUTABLE_ELEMENT_REGEX.replace_all(input, "");
    let without_comments = COMMENT_REGEX.replace_all(&without_exec, "");
    let without_tags = TAG_REGEX.replace_all(&without_comments, "");
    let without_dangling = DANGLING_TAG_REGEX.replace_all(&without_tags, "");

    without_dangling
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Validate a URL for use as an image source.
///
/// Accepts absolute `https`/`http` URLs with a host, and root-relative paths
/// (`/images/...`) which resolve against the asset host. Everything else,
/// including protocol-relative `//host` URLs, returns `None`.
pub fn validate_image_url(url: &str) -> Option<String> {
    validate_with_schemes(url, &["https", "http"])
}

/// Validate a URL for use as a link `href`.
///
/// Same rules as [`validate_image_url`], plus `mailto:` and `tel:` links and
/// in-page `#fragment` anchors.
pub fn validate_link_url(url: &str) -> Option<String> {
    let trimmed = url.trim();
    if trimmed.starts_with('#') && !has_unsafe_chars(trimmed) {
        return Some(trimmed.to_string());
    }
    validate_with_schemes(trimmed, &["https", "http", "mailto", "tel"])
}

fn validate_with_schemes(url: &str, schemes: &[&str]) -> Option<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() || has_unsafe_chars(trimmed) {
        return None;
    }

    if trimmed.starts_with('/') {
        // Protocol-relative and backslash tricks escape the asset host.
        if trimmed.starts_with("//") || trimmed.starts_with("/\\") {
            return None;
        }
        return Some(trimmed.to_string());
    }

    let parsed = Url::parse(trimmed).ok()?;
    if !schemes.contains(&parsed.scheme()) {
        return None;
    }
    let needs_host = matches!(parsed.scheme(), "https" | "http");
    if needs_host && parsed.host_str().is_none_or(str::is_empty) {
        return None;
    }

    Some(trimmed.to_string())
}

fn has_unsafe_chars(url: &str) -> bool {
    url.chars()
        .any(|c| c.is_whitespace() || c.is_control() || c == '<' || c == '>' || c == '"')
}
