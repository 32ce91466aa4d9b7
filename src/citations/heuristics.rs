//! Rule-based inference of a source's network location and display title.
//!
//! Title inference is a priority chain: each tier is an independent detector
//! returning `Some(candidate)` or `None`, tried in order until one succeeds.

use once_cell::sync::Lazy;
use regex::Regex;

pub const DEFAULT_TITLE_MAX_LENGTH: usize = 200;
pub const UNTITLED: &str = "Untitled";

/// Lines with fewer non-whitespace chars than this never become a title.
const MIN_SUBSTANTIAL_CHARS: usize = 10;

static SCHEME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").unwrap());
static HOST_FALLBACK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:[A-Za-z][A-Za-z0-9+.\-]*://)?([A-Za-z0-9][A-Za-z0-9.:\-]*)").unwrap()
});

static HTML_TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title\s*>").unwrap());
static MD_HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mR)^[ \t]*(#{1,6})[ \t]+(\S[^\r\n]*)$").unwrap());
static TITLE_FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?im)["']?\btitle["']?[ \t]*[:=][ \t]*(?:"([^"\r\n]*)"|'([^'\r\n]*)'|([^,}\]\r\n]+))"#,
    )
    .unwrap()
});
static LIST_ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[-*+]|\d+[.)])(?:\s|$)").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Network-location component of a URL, verbatim (user-info and port kept).
///
/// Falls back to the first host-like token when the URL has no authority
/// section. Returns an empty string when nothing host-like is present.
pub fn extract_domain(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        return String::new();
    }
    match authority(url) {
        Some(netloc) if !netloc.is_empty() => netloc.to_string(),
        _ => HOST_FALLBACK_RE
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default(),
    }
}

/// The `//authority` part of `scheme://authority/path?query#fragment`.
fn authority(url: &str) -> Option<&str> {
    let rest = match SCHEME_RE.find(url) {
        Some(scheme) => &url[scheme.end()..],
        None => url,
    };
    let rest = rest.strip_prefix("//")?;
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Best-effort human title for a raw content blob.
///
/// Tiers, first hit wins: HTML `<title>`, shallowest markdown heading,
/// `title:` field in JSON/YAML-ish text, first substantial plain line.
/// Falls back to `"Untitled"`. The result is cut to `max_length` chars.
pub fn extract_title_from_content(content: Option<&str>, max_length: usize) -> String {
    let content = content.unwrap_or_default();
    if content.trim().is_empty() {
        return truncate_chars(UNTITLED, max_length);
    }

    const DETECTORS: &[fn(&str) -> Option<String>] = &[
        html_title,
        markdown_heading,
        structured_title_field,
        first_substantial_line,
    ];

    let title = DETECTORS
        .iter()
        .find_map(|detect| detect(content))
        .unwrap_or_else(|| UNTITLED.to_string());
    truncate_chars(&title, max_length)
}

fn collapse_whitespace(s: &str) -> String {
    WHITESPACE_RE.replace_all(s.trim(), " ").into_owned()
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn truncate_chars(s: &str, max_length: usize) -> String {
    s.chars().take(max_length).collect()
}

pub(crate) fn html_title(content: &str) -> Option<String> {
    let caps = HTML_TITLE_RE.captures(content)?;
    non_empty(collapse_whitespace(caps.get(1)?.as_str()))
}

/// Shallowest heading wins; among equal levels, the first in the document.
pub(crate) fn markdown_heading(content: &str) -> Option<String> {
    let mut best: Option<(usize, String)> = None;
    for caps in MD_HEADING_RE.captures_iter(content) {
        let level = caps[1].len();
        if best.as_ref().is_some_and(|(l, _)| *l <= level) {
            continue;
        }
        let text = collapse_whitespace(&caps[2]);
        if text.is_empty() {
            continue;
        }
        if level == 1 {
            return Some(text);
        }
        best = Some((level, text));
    }
    best.map(|(_, text)| text)
}

pub(crate) fn structured_title_field(content: &str) -> Option<String> {
    TITLE_FIELD_RE.captures_iter(content).find_map(|caps| {
        let value = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3))?;
        non_empty(collapse_whitespace(value.as_str()))
    })
}

pub(crate) fn first_substantial_line(content: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with("```") && !line.starts_with("~~~"))
        .filter(|line| !LIST_ITEM_RE.is_match(line))
        .filter(|line| !is_separator(line))
        .find(|line| {
            line.chars().filter(|c| !c.is_whitespace()).count() >= MIN_SUBSTANTIAL_CHARS
        })
        .map(str::to_string)
}

/// A run of 3+ copies of the same punctuation char, e.g. `---` or `***`.
fn is_separator(line: &str) -> bool {
    let compact: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
    match compact.first() {
        Some(first) if compact.len() >= 3 && first.is_ascii_punctuation() => {
            compact.iter().all(|c| c == first)
        }
        _ => false,
    }
}
