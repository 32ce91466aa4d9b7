//! Recover citations already written into a finished report.
//!
//! The citations section is located by heading, then four independent
//! notation scanners run over it and their hits are deduplicated by URL.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::types::CitationFormat;

/// Headings that open a citations section, matched case-insensitively.
pub const DEFAULT_SECTION_PATTERNS: &[&str] = &[
    r"^[ \t]*#{1,6}[ \t]*key[ \t]+citations\b",
    r"^[ \t]*#{1,6}[ \t]*references\b",
    r"^[ \t]*#{1,6}[ \t]*sources\b",
    r"^[ \t]*#{1,6}[ \t]*bibliography\b",
];

static DEFAULT_SECTION_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    DEFAULT_SECTION_PATTERNS
        .iter()
        .filter_map(|p| compile_section_pattern(p))
        .collect()
});

static MARKDOWN_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\[\]\r\n]+)\]\(((?:[^()\s]|\([^()\s]*\))+)\)").unwrap());
static NUMBERED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(\d+)\][ \t]+([^\[\]\r\n]+?)[ \t]+-[ \t]+((?i:https?)://[^\s<>]+)").unwrap()
});
static FOOTNOTE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\^(\d+)\]:[ \t]*([^\r\n]+?)[ \t]+-[ \t]+((?i:https?)://[^\s<>]+)").unwrap()
});
static HTML_ANCHOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a\s(?:[^>]*?\s)?href\s*=\s*(?:"([^"]*)"|'([^']*)')[^>]*>(.*?)</a\s*>"#)
        .unwrap()
});

/// One citation candidate found in report text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedCitation {
    pub title: String,
    pub url: String,
    pub format: CitationFormat,
}

impl ExtractedCitation {
    fn new(title: &str, url: &str, format: CitationFormat) -> Self {
        Self {
            title: title.trim().to_string(),
            url: url.trim().to_string(),
            format,
        }
    }
}

/// Deduplicated citations recovered from a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportCitations {
    pub citations: Vec<ExtractedCitation>,
    pub count: usize,
}

/// Pull every citation out of the report's citations section.
///
/// `section_patterns` replaces the default heading patterns; patterns that
/// fail to compile are skipped. A report with no matching section yields an
/// empty result.
pub fn parse_citations_from_report(
    report: &str,
    section_patterns: Option<&[&str]>,
) -> ReportCitations {
    if report.trim().is_empty() {
        return ReportCitations::default();
    }

    let custom: Vec<Regex>;
    let patterns: &[Regex] = match section_patterns {
        Some(raw) => {
            custom = raw.iter().filter_map(|p| compile_section_pattern(p)).collect();
            custom.as_slice()
        }
        None => DEFAULT_SECTION_RES.as_slice(),
    };

    let Some(section) = find_section(report, patterns) else {
        debug!("no citations section found in report");
        return ReportCitations::default();
    };

    let candidates = extract_markdown_links(section)
        .into_iter()
        .chain(extract_numbered_citations(section))
        .chain(extract_footnote_citations(section))
        .chain(extract_html_links(section));

    let citations = dedup_by_url(candidates);
    debug!(count = citations.len(), "citations recovered from report");
    ReportCitations {
        count: citations.len(),
        citations,
    }
}

fn compile_section_pattern(pattern: &str) -> Option<Regex> {
    match RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
    {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(pattern, error = %e, "ignoring invalid section pattern");
            None
        }
    }
}

/// Span from the earliest matching heading to the next heading of the same or
/// a shallower level, or to the end of the report.
fn find_section<'a>(report: &'a str, patterns: &[Regex]) -> Option<&'a str> {
    let start = patterns
        .iter()
        .filter_map(|re| re.find(report).map(|m| m.start()))
        .min()?;

    let line_start = report[..start].rfind('\n').map_or(0, |i| i + 1);
    let line_end = report[start..]
        .find('\n')
        .map_or(report.len(), |i| start + i + 1);
    let level = heading_level(&report[line_start..line_end]).unwrap_or(6);

    let mut offset = line_end;
    for line in report[line_end..].split_inclusive('\n') {
        if heading_level(line).is_some_and(|l| l <= level) {
            return Some(&report[start..offset]);
        }
        offset += line.len();
    }
    Some(&report[start..])
}

/// ATX heading level of a line (`## Title` → 2), ignoring leading indentation.
fn heading_level(line: &str) -> Option<usize> {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&hashes) {
        return None;
    }
    match trimmed[hashes..].chars().next() {
        None => Some(hashes),
        Some(c) if c.is_whitespace() => Some(hashes),
        _ => None,
    }
}

fn is_web_url(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    ["http://", "https://"]
        .iter()
        .any(|scheme| lower.len() > scheme.len() && lower.starts_with(scheme))
}

/// Strip trailing punctuation that's likely prose rather than part of the URL.
fn trim_url(url: &str) -> &str {
    url.trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ')' | ']'))
}

/// `[title](url)`
pub fn extract_markdown_links(text: &str) -> Vec<ExtractedCitation> {
    MARKDOWN_LINK_RE
        .captures_iter(text)
        .filter(|caps| is_web_url(&caps[2]))
        .map(|caps| ExtractedCitation::new(&caps[1], &caps[2], CitationFormat::Markdown))
        .collect()
}

/// `[N] title - url`
pub fn extract_numbered_citations(text: &str) -> Vec<ExtractedCitation> {
    NUMBERED_RE
        .captures_iter(text)
        .map(|caps| {
            ExtractedCitation::new(&caps[2], trim_url(&caps[3]), CitationFormat::Numbered)
        })
        .filter(|c| is_web_url(&c.url))
        .collect()
}

/// `[^N]: title - url`
pub fn extract_footnote_citations(text: &str) -> Vec<ExtractedCitation> {
    FOOTNOTE_RE
        .captures_iter(text)
        .map(|caps| {
            ExtractedCitation::new(&caps[2], trim_url(&caps[3]), CitationFormat::Footnote)
        })
        .filter(|c| is_web_url(&c.url))
        .collect()
}

/// `<a href="url" ...>title</a>`
pub fn extract_html_links(text: &str) -> Vec<ExtractedCitation> {
    HTML_ANCHOR_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let url = caps.get(1).or_else(|| caps.get(2))?.as_str();
            is_web_url(url).then(|| ExtractedCitation::new(&caps[3], url, CitationFormat::Html))
        })
        .collect()
}

/// First occurrence of each URL wins.
fn dedup_by_url(
    candidates: impl IntoIterator<Item = ExtractedCitation>,
) -> Vec<ExtractedCitation> {
    let mut seen: IndexMap<String, ExtractedCitation> = IndexMap::new();
    for candidate in candidates {
        seen.entry(candidate.url.clone()).or_insert(candidate);
    }
    seen.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(result: &ReportCitations) -> Vec<&str> {
        result.citations.iter().map(|c| c.url.as_str()).collect()
    }

    #[test]
    fn test_markdown_links() {
        let found = extract_markdown_links(
            "[Link 1](https://example.com/1) and [Link 2](https://example.com/2)",
        );
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].title, "Link 1");
        assert_eq!(found[1].url, "https://example.com/2");
        assert_eq!(found[0].format, CitationFormat::Markdown);

        let found = extract_markdown_links(
            "[Relative](./relative/path) [Mail](mailto:a@b.com) [HTTP](https://example.com)",
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url, "https://example.com");

        let found = extract_markdown_links("[Search](https://example.com/search?q=test&page=1)");
        assert!(found[0].url.contains("q=test"));
        assert!(extract_markdown_links("Just plain text").is_empty());
    }

    #[test]
    fn test_markdown_links_with_parentheses_in_url() {
        let found = extract_markdown_links(
            "[Rust](https://en.wikipedia.org/wiki/Rust_(programming_language)) and [B](https://b.com)",
        );
        let urls: Vec<_> = found.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://en.wikipedia.org/wiki/Rust_(programming_language)",
                "https://b.com",
            ]
        );

        let report = "## References\n\n- [Rust](https://en.wikipedia.org/wiki/Rust_(programming_language))\n";
        let result = parse_citations_from_report(report, None);
        assert_eq!(result.count, 1);
        assert_eq!(result.citations[0].title, "Rust");
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        assert_eq!(extract_numbered_citations("[1] Shout - HTTPS://example.com").len(), 1);
        assert_eq!(extract_footnote_citations("[^1]: Shout - Http://example.com").len(), 1);
    }

    #[test]
    fn test_numbered_citations() {
        let found = extract_numbered_citations(
            "[1] First - https://example.com/1\n[2] Second - https://example.com/2",
        );
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].title, "First");
        assert_eq!(found[1].url, "https://example.com/2");
        assert_eq!(found[0].format, CitationFormat::Numbered);

        let found = extract_numbered_citations(
            "[5] A Comprehensive Guide to Python Programming - https://example.com",
        );
        assert_eq!(found[0].title, "A Comprehensive Guide to Python Programming");

        assert!(extract_numbered_citations("[1 Title - https://example.com").is_empty());

        let found =
            extract_numbered_citations("[1] Invalid - file://path [2] Valid - https://example.com");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Valid");
    }

    #[test]
    fn test_numbered_citation_trims_trailing_punctuation() {
        let found = extract_numbered_citations("[3] Docs - https://docs.rs/regex.");
        assert_eq!(found[0].url, "https://docs.rs/regex");
    }

    #[test]
    fn test_footnote_citations() {
        let found = extract_footnote_citations("[^123]: Title - https://example.com");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Title");
        assert_eq!(found[0].format, CitationFormat::Footnote);

        let found =
            extract_footnote_citations("[^1]:  Title with spaces  -  https://example.com  ");
        assert_eq!(found[0].title, "Title with spaces");
        assert_eq!(found[0].url, "https://example.com");

        assert!(extract_footnote_citations("[1]: Title - https://example.com").is_empty());
        assert!(extract_footnote_citations("No footnotes here").is_empty());
    }

    #[test]
    fn test_html_links() {
        let found = extract_html_links(r#"<a href="https://example.com">  Example Article  </a>"#);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Example Article");
        assert_eq!(found[0].format, CitationFormat::Html);

        assert_eq!(extract_html_links("<a href='https://example.com'>Title</a>").len(), 1);
        assert_eq!(extract_html_links(r#"<A HREF="https://example.com">Title</A>"#).len(), 1);

        let found = extract_html_links(
            r#"<a class="link" href="https://example.com" target="_blank">Title</a>"#,
        );
        assert_eq!(found[0].url, "https://example.com");

        let found = extract_html_links(
            r#"<a href="mailto:test@example.com">Email</a> <a href="https://example.com">Web</a>"#,
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Web");
    }

    #[test]
    fn test_html_links_ignore_prefixed_href_attributes() {
        let found = extract_html_links(
            r#"<a data-href="https://track.er/x" href="https://real.com">Real</a>"#,
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url, "https://real.com");
        assert_eq!(found[0].title, "Real");

        assert!(extract_html_links(r#"<a data-href="https://track.er/x">No href</a>"#).is_empty());
    }

    #[test]
    fn test_report_dedup_keeps_first() {
        let report = "
        ## Key Citations

        [GitHub 1](https://github.com)
        [GitHub 2](https://github.com)
        [GitHub](https://github.com)
        ";
        let result = parse_citations_from_report(report, None);
        assert_eq!(result.count, 1);
        assert_eq!(result.citations[0].title, "GitHub 1");
        assert_eq!(result.citations[0].url, "https://github.com");
    }

    #[test]
    fn test_report_mixed_formats_in_extractor_order() {
        let report = r#"
        ## Key Citations

        <a href="https://stackoverflow.com">Stack Overflow</a>
        [^1]: Python - https://python.org
        [2] Wikipedia - https://wikipedia.org
        [GitHub](https://github.com)
        "#;
        let result = parse_citations_from_report(report, None);
        assert_eq!(result.count, 4);
        assert_eq!(
            urls(&result),
            vec![
                "https://github.com",
                "https://wikipedia.org",
                "https://python.org",
                "https://stackoverflow.com",
            ]
        );
    }

    #[test]
    fn test_report_section_headings() {
        for heading in [
            "## References",
            "## Sources",
            "## Bibliography",
            "##   Key Citations   ",
            "# SOURCES",
        ] {
            let report = format!("Intro\n{heading}\n[GitHub](https://github.com)\n");
            assert_eq!(parse_citations_from_report(&report, None).count, 1, "{heading}");
        }
    }

    #[test]
    fn test_report_custom_patterns() {
        let report = "
        ## My Custom Sources
        [GitHub](https://github.com)
        ";
        let result =
            parse_citations_from_report(report, Some(&[r"##\s*My Custom Sources"][..]));
        assert_eq!(result.count, 1);

        let result =
            parse_citations_from_report(report, Some(&["(unclosed", r"##\s*my custom"][..]));
        assert_eq!(result.count, 1);
    }

    #[test]
    fn test_report_without_section() {
        assert_eq!(parse_citations_from_report("", None), ReportCitations::default());
        let result = parse_citations_from_report(
            "This is a report with no citations section [x](https://x.com)",
            None,
        );
        assert_eq!(result.count, 0);
        assert!(result.citations.is_empty());
    }

    #[test]
    fn test_section_stops_at_next_heading() {
        let report = r#"
        # Research Report

        ## Key Findings

        Based on research [Early](https://early.com).

        ## Key Citations

        [GitHub](https://github.com) - A collaborative platform
        [^1]: Python - https://python.org

        ### Sub-list
        [2] Wikipedia - https://wikipedia.org

        ## Methodology

        [Additional](https://example.com) details.

        [^1]: Late - https://late.com
        "#;
        let result = parse_citations_from_report(report, None);
        assert_eq!(
            urls(&result),
            vec!["https://github.com", "https://wikipedia.org", "https://python.org"]
        );
    }

    #[test]
    fn test_earliest_heading_wins() {
        let report = "## Sources\n[A](https://a.com)\n## References\n[B](https://b.com)\n";
        let result = parse_citations_from_report(report, None);
        assert_eq!(urls(&result), vec!["https://a.com"]);
    }

    #[test]
    fn test_heading_level() {
        assert_eq!(heading_level("## Title"), Some(2));
        assert_eq!(heading_level("   # Title\n"), Some(1));
        assert_eq!(heading_level("#hashtag"), None);
        assert_eq!(heading_level("####### seven"), None);
        assert_eq!(heading_level("plain"), None);
    }
}
