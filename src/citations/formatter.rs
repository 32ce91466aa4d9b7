use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::types::{Citation, CitationMetadata};

const SUPERSCRIPT_DIGITS: [char; 10] = ['⁰', '¹', '²', '³', '⁴', '⁵', '⁶', '⁷', '⁸', '⁹'];

/// How citation markers and reference lines are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CitationStyle {
    #[default]
    Numbered,
    Superscript,
    Footnote,
    Markdown,
}

impl std::fmt::Display for CitationStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CitationStyle::Numbered => write!(f, "numbered"),
            CitationStyle::Superscript => write!(f, "superscript"),
            CitationStyle::Footnote => write!(f, "footnote"),
            CitationStyle::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for CitationStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "numbered" => Ok(CitationStyle::Numbered),
            "superscript" => Ok(CitationStyle::Superscript),
            "footnote" => Ok(CitationStyle::Footnote),
            "markdown" => Ok(CitationStyle::Markdown),
            other => Err(format!(
                "unknown citation style `{}`. Valid: numbered, superscript, footnote, markdown",
                other
            )),
        }
    }
}

/// Inline marker for citation `number` in the given style.
pub fn format_inline_marker(number: u32, style: CitationStyle) -> String {
    match style {
        CitationStyle::Superscript => number
            .to_string()
            .chars()
            .filter_map(|d| d.to_digit(10))
            .map(|d| SUPERSCRIPT_DIGITS[d as usize])
            .collect(),
        CitationStyle::Footnote => format!("[^{}]", number),
        CitationStyle::Numbered | CitationStyle::Markdown => format!("[{}]", number),
    }
}

/// Renders citations into report text in one fixed style.
#[derive(Debug, Clone, Copy, Default)]
pub struct CitationFormatter {
    pub style: CitationStyle,
}

impl CitationFormatter {
    pub fn new(style: CitationStyle) -> Self {
        Self { style }
    }

    pub fn format_inline_marker(&self, number: u32) -> String {
        format_inline_marker(number, self.style)
    }

    /// One reference-list line for `citation`.
    pub fn format_reference(&self, citation: &Citation) -> String {
        match self.style {
            CitationStyle::Numbered => citation.to_numbered_reference(),
            CitationStyle::Footnote => citation.to_footnote(),
            CitationStyle::Superscript => {
                format!("{}. {} - {}", citation.number, citation.title(), citation.url())
            }
            CitationStyle::Markdown => format!("- {}", citation.to_markdown_reference()),
        }
    }

    /// `## References` followed by one line per citation. Empty input renders
    /// as an empty string.
    pub fn format_reference_list(&self, citations: &[Citation]) -> String {
        if citations.is_empty() {
            return String::new();
        }
        let mut out = String::from("## References\n\n");
        for citation in citations {
            out.push_str(&self.format_reference(citation));
            out.push('\n');
        }
        out
    }
}

/// `## Key Citations` section with one `- [title](url)` bullet per record,
/// followed by `: description` when the record has one.
pub fn citations_to_markdown_references(citations: &[CitationMetadata]) -> String {
    if citations.is_empty() {
        return String::new();
    }
    let mut out = String::from("## Key Citations\n\n");
    for meta in citations {
        out.push_str(&format!("- [{}]({})", meta.title, meta.url()));
        if let Some(desc) = meta.description.as_deref().map(str::trim) {
            if !desc.is_empty() {
                out.push_str(": ");
                out.push_str(desc);
            }
        }
        out.push('\n');
    }
    out
}

/// Merge two citation lists by URL.
///
/// A URL present in both keeps whichever record has the higher
/// `relevance_score` (missing scores count as 0.0; ties keep `existing`).
/// Existing records stay in place; new URLs are appended in incoming order.
pub fn merge_citations(
    existing: &[CitationMetadata],
    new: &[CitationMetadata],
) -> Vec<CitationMetadata> {
    let mut merged: IndexMap<String, CitationMetadata> = IndexMap::new();
    for meta in existing {
        merged
            .entry(meta.url().to_string())
            .or_insert_with(|| meta.clone());
    }
    for meta in new {
        match merged.get_mut(meta.url()) {
            Some(current) => {
                if score(meta) > score(current) {
                    *current = meta.clone();
                }
            }
            None => {
                merged.insert(meta.url().to_string(), meta.clone());
            }
        }
    }
    merged.into_values().collect()
}

fn score(meta: &CitationMetadata) -> f64 {
    meta.relevance_score.unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(url: &str, title: &str, score: Option<f64>) -> CitationMetadata {
        let mut m = CitationMetadata::new(url, title);
        m.relevance_score = score;
        m
    }

    #[test]
    fn test_superscript_markers() {
        assert_eq!(format_inline_marker(1, CitationStyle::Superscript), "¹");
        assert_eq!(format_inline_marker(12, CitationStyle::Superscript), "¹²");
        assert_eq!(format_inline_marker(1090, CitationStyle::Superscript), "¹⁰⁹⁰");
        let formatter = CitationFormatter::new(CitationStyle::Superscript);
        assert_eq!(formatter.format_inline_marker(12), "¹²");
    }

    #[test]
    fn test_bracket_markers() {
        assert_eq!(format_inline_marker(3, CitationStyle::Footnote), "[^3]");
        assert_eq!(format_inline_marker(3, CitationStyle::Numbered), "[3]");
        assert_eq!(CitationFormatter::default().format_inline_marker(7), "[7]");
    }

    #[test]
    fn test_style_parsing() {
        assert_eq!("Superscript".parse::<CitationStyle>(), Ok(CitationStyle::Superscript));
        assert_eq!(" footnote ".parse::<CitationStyle>(), Ok(CitationStyle::Footnote));
        assert!("apa".parse::<CitationStyle>().is_err());
        assert_eq!(CitationStyle::Markdown.to_string(), "markdown");
    }

    #[test]
    fn test_reference_lines_per_style() {
        let citation = Citation::new(2, CitationMetadata::new("https://example.com", "Example"));
        let line = |style| CitationFormatter::new(style).format_reference(&citation);
        assert_eq!(line(CitationStyle::Numbered), "[2] Example - https://example.com");
        assert_eq!(line(CitationStyle::Footnote), "[^2]: Example - https://example.com");
        assert_eq!(line(CitationStyle::Superscript), "2. Example - https://example.com");
        assert_eq!(line(CitationStyle::Markdown), "- [Example](https://example.com)");
    }

    #[test]
    fn test_reference_list() {
        let citations = vec![
            Citation::new(1, CitationMetadata::new("https://a.com", "A")),
            Citation::new(2, CitationMetadata::new("https://b.com", "B")),
        ];
        let list = CitationFormatter::default().format_reference_list(&citations);
        assert_eq!(
            list,
            "## References\n\n[1] A - https://a.com\n[2] B - https://b.com\n"
        );
        assert_eq!(CitationFormatter::default().format_reference_list(&[]), "");
    }

    #[test]
    fn test_markdown_references() {
        let mut a = CitationMetadata::new("https://a.com", "A");
        a.description = Some("Desc A".to_string());
        let b = CitationMetadata::new("https://b.com", "B");
        let md = citations_to_markdown_references(&[a, b]);
        assert!(md.starts_with("## Key Citations\n\n"));
        assert!(md.contains("- [A](https://a.com): Desc A\n"));
        assert!(md.contains("- [B](https://b.com)\n"));
        assert_eq!(citations_to_markdown_references(&[]), "");
    }

    #[test]
    fn test_merge_citations_prefers_higher_score() {
        let existing = vec![meta("https://a.com", "A", Some(0.5))];
        let new = vec![
            meta("https://b.com", "B", Some(0.6)),
            meta("https://a.com", "A New", Some(0.7)),
        ];
        let merged = merge_citations(&existing, &new);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].url(), "https://a.com");
        assert_eq!(merged[0].title, "A New");
        assert_eq!(merged[0].relevance_score, Some(0.7));
        assert_eq!(merged[1].title, "B");
    }

    #[test]
    fn test_merge_citations_ties_keep_existing() {
        let existing = vec![
            meta("https://a.com", "A", Some(0.5)),
            meta("https://c.com", "C", None),
        ];
        let new = vec![
            meta("https://a.com", "A Tie", Some(0.5)),
            meta("https://c.com", "C Unscored", None),
            meta("https://d.com", "D", None),
        ];
        let merged = merge_citations(&existing, &new);
        let titles: Vec<_> = merged.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "C", "D"]);
    }
}
