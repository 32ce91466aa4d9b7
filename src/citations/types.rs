use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::heuristics::{extract_domain, extract_title_from_content, DEFAULT_TITLE_MAX_LENGTH};

/// Short, URL-derived citation ID (first 12 hex chars of the blake3 digest).
pub type CitationId = String;

const ID_LEN: usize = 12;

/// Compute the stable citation ID for a URL.
///
/// Same URL = same ID, across processes and runs.
pub fn citation_id(url: &str) -> CitationId {
    let hex = blake3::hash(url.as_bytes()).to_hex();
    hex.as_str()[..ID_LEN].to_string()
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// One real-world source, deduplicated by URL.
///
/// `id` and `domain` are derived from `url` and recomputed on every
/// construction, including deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MetadataRecord")]
pub struct CitationMetadata {
    url: String,
    pub title: String,
    domain: String,
    id: CitationId,
    pub description: Option<String>,
    pub content_snippet: Option<String>,
    pub raw_content: Option<String>,
    pub author: Option<String>,
    pub published_date: Option<String>,
    pub language: Option<String>,
    pub images: Vec<String>,
    pub favicon: Option<String>,
    pub relevance_score: Option<f64>,
    pub credibility_score: Option<f64>,
    /// RFC 3339 timestamp of the sighting that produced this record.
    pub accessed_at: String,
    /// Provenance, e.g. originating query or result type.
    pub extra: BTreeMap<String, Value>,
}

impl CitationMetadata {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            domain: extract_domain(&url),
            id: citation_id(&url),
            url,
            title: title.into(),
            description: None,
            content_snippet: None,
            raw_content: None,
            author: None,
            published_date: None,
            language: None,
            images: Vec::new(),
            favicon: None,
            relevance_score: None,
            credibility_score: None,
            accessed_at: now_rfc3339(),
            extra: BTreeMap::new(),
        }
    }

    /// Build metadata from a search-engine hit. Returns `None` when the record
    /// carries no usable URL.
    pub fn from_search_result(record: &SearchResult, query: Option<&str>) -> Option<Self> {
        Self::from_search_result_with_limit(record, query, DEFAULT_TITLE_MAX_LENGTH)
    }

    pub(crate) fn from_search_result_with_limit(
        record: &SearchResult,
        query: Option<&str>,
        title_max_length: usize,
    ) -> Option<Self> {
        let url = record.url.as_deref().map(str::trim).unwrap_or_default();
        if url.is_empty() {
            return None;
        }

        let title = match record.title.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => extract_title_from_content(record.content.as_deref(), title_max_length),
        };

        let mut meta = Self::new(url, title);
        meta.description = record.content.clone();
        meta.relevance_score = record.score;
        if let Some(q) = query {
            meta.extra.insert("query".to_string(), Value::from(q));
        }
        if let Some(kind) = &record.result_type {
            meta.extra
                .insert("result_type".to_string(), Value::from(kind.as_str()));
        }
        Some(meta)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Every attribute, derived `id` and `domain` included.
    pub fn to_dict(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Rebuild from a dict record. Any incoming `id` or `domain` is discarded
    /// and recomputed from `url`.
    pub fn from_dict(data: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(data)
    }
}

/// Deserialization shape for [`CitationMetadata`]: no `id`, no `domain`.
#[derive(Deserialize)]
struct MetadataRecord {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    content_snippet: Option<String>,
    #[serde(default)]
    raw_content: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    published_date: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    images: Vec<String>,
    #[serde(default)]
    favicon: Option<String>,
    #[serde(default)]
    relevance_score: Option<f64>,
    #[serde(default)]
    credibility_score: Option<f64>,
    #[serde(default)]
    accessed_at: Option<String>,
    #[serde(default)]
    extra: BTreeMap<String, Value>,
}

impl TryFrom<MetadataRecord> for CitationMetadata {
    type Error = String;

    fn try_from(record: MetadataRecord) -> Result<Self, Self::Error> {
        if record.url.trim().is_empty() {
            return Err("citation record is missing a url".to_string());
        }
        let mut meta = CitationMetadata::new(
            record.url,
            record.title.unwrap_or_else(|| "Untitled".to_string()),
        );
        meta.description = record.description;
        meta.content_snippet = record.content_snippet;
        meta.raw_content = record.raw_content;
        meta.author = record.author;
        meta.published_date = record.published_date;
        meta.language = record.language;
        meta.images = record.images;
        meta.favicon = record.favicon;
        meta.relevance_score = record.relevance_score;
        meta.credibility_score = record.credibility_score;
        if let Some(at) = record.accessed_at {
            meta.accessed_at = at;
        }
        meta.extra = record.extra;
        Ok(meta)
    }
}

/// A numbered, situated use of a [`CitationMetadata`] record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// 1-based display position within one rendering context.
    pub number: u32,
    pub metadata: CitationMetadata,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub cited_text: Option<String>,
}

impl Citation {
    pub fn new(number: u32, metadata: CitationMetadata) -> Self {
        Self {
            number,
            metadata,
            context: None,
            cited_text: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_cited_text(mut self, cited_text: impl Into<String>) -> Self {
        self.cited_text = Some(cited_text.into());
        self
    }

    pub fn id(&self) -> &str {
        self.metadata.id()
    }

    pub fn url(&self) -> &str {
        self.metadata.url()
    }

    pub fn title(&self) -> &str {
        &self.metadata.title
    }

    /// `[title](url)`
    pub fn to_markdown_reference(&self) -> String {
        format!("[{}]({})", self.title(), self.url())
    }

    /// `[n] title - url`
    pub fn to_numbered_reference(&self) -> String {
        format!("[{}] {} - {}", self.number, self.title(), self.url())
    }

    /// `[^n]`
    pub fn to_inline_marker(&self) -> String {
        format!("[^{}]", self.number)
    }

    /// `[^n]: title - url`
    pub fn to_footnote(&self) -> String {
        format!("[^{}]: {} - {}", self.number, self.title(), self.url())
    }
}

/// A search-engine hit as handed over by the search tooling.
///
/// Deserialization is lenient: wrong-typed fields come through as absent
/// instead of failing the whole record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub score: Option<f64>,
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    pub result_type: Option<String>,
}

impl SearchResult {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            title: Some(title.into()),
            ..Self::default()
        }
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        _ => None,
    })
}

/// Output of an agent tool call, as recorded in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolMessage {
    /// Tool name, e.g. `web_search` or `crawl_tool`.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tool_call_id: Option<String>,
    pub content: String,
}

/// The textual notation a recovered citation was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CitationFormat {
    Markdown,
    Numbered,
    Footnote,
    Html,
}

impl std::fmt::Display for CitationFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CitationFormat::Markdown => write!(f, "markdown"),
            CitationFormat::Numbered => write!(f, "numbered"),
            CitationFormat::Footnote => write!(f, "footnote"),
            CitationFormat::Html => write!(f, "html"),
        }
    }
}
