use anyhow::{Context, Result};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::heuristics::extract_title_from_content;
use super::types::{Citation, CitationMetadata, SearchResult};
use crate::config::CitationConfig;

/// Serializable collector state: records in citation order plus used URLs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectorSnapshot {
    #[serde(default)]
    pub citations: Vec<CitationMetadata>,
    #[serde(default)]
    pub used: Vec<String>,
}

/// Deduplicated, ordered registry of every source seen during a session.
///
/// Records are keyed by URL. The index map keeps insertion order and the
/// URL → position lookup in one structure, so a position never moves once
/// assigned. Not internally synchronized; callers sharing a collector must
/// serialize writes themselves.
#[derive(Debug, Clone, Default)]
pub struct CitationCollector {
    citations: IndexMap<String, CitationMetadata>,
    used: IndexSet<String>,
    config: CitationConfig,
}

impl CitationCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CitationConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Insert or update a record. Returns its 0-based position.
    fn upsert(&mut self, metadata: CitationMetadata) -> usize {
        let url = metadata.url().to_string();
        let (position, previous) = self.citations.insert_full(url, metadata);
        if previous.is_some() {
            debug!(position, "citation updated in place");
        } else {
            debug!(position, "citation registered");
        }
        position
    }

    /// Register search-engine hits. New URLs are appended; known URLs have
    /// their fields overwritten but keep their position.
    ///
    /// Returns the records touched by this call, in input order.
    pub fn add_from_search_results(
        &mut self,
        results: &[SearchResult],
        query: Option<&str>,
    ) -> Vec<CitationMetadata> {
        let mut touched = Vec::with_capacity(results.len());
        for record in results {
            let Some(metadata) = CitationMetadata::from_search_result_with_limit(
                record,
                query,
                self.config.title_max_length,
            ) else {
                debug!(title = ?record.title, "skipping search result without url");
                continue;
            };
            let position = self.upsert(metadata);
            touched.push(self.citations[position].clone());
        }
        debug!(
            added = touched.len(),
            total = self.citations.len(),
            "search results collected"
        );
        touched
    }

    /// Register a single crawled page with the same dedup policy as
    /// [`add_from_search_results`](Self::add_from_search_results).
    ///
    /// A blank `title` is inferred from `content`.
    pub fn add_from_crawl_result(
        &mut self,
        url: &str,
        title: Option<&str>,
        content: &str,
    ) -> Option<CitationMetadata> {
        let url = url.trim();
        if url.is_empty() {
            debug!("skipping crawl result without url");
            return None;
        }

        let title = match title.map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => extract_title_from_content(Some(content), self.config.title_max_length),
        };

        let mut metadata = CitationMetadata::new(url, title);
        metadata.content_snippet = Some(snippet(content, self.config.snippet_length))
            .filter(|s| !s.is_empty());
        metadata.raw_content = Some(content.to_string()).filter(|c| !c.is_empty());
        metadata
            .extra
            .insert("result_type".to_string(), Value::from("crawl"));

        let position = self.upsert(metadata);
        Some(self.citations[position].clone())
    }

    /// 1-based citation number for `url`, or `None` if it was never added.
    pub fn get_number(&self, url: &str) -> Option<usize> {
        self.citations.get_index_of(url).map(|i| i + 1)
    }

    /// 0-based position of `url` in citation order.
    pub fn index_of(&self, url: &str) -> Option<usize> {
        self.citations.get_index_of(url)
    }

    pub fn get(&self, url: &str) -> Option<&CitationMetadata> {
        self.citations.get(url)
    }

    /// Numbered view of a single record.
    pub fn citation(&self, url: &str) -> Option<Citation> {
        let (index, _, metadata) = self.citations.get_full(url)?;
        Some(Citation::new(number_for(index), metadata.clone()))
    }

    /// Flag `url` as cited in generated output. Unknown URLs are ignored.
    pub fn mark_used(&mut self, url: &str) -> Option<usize> {
        let number = self.get_number(url)?;
        self.used.insert(url.to_string());
        Some(number)
    }

    pub fn is_used(&self, url: &str) -> bool {
        self.used.contains(url)
    }

    /// Every record, numbered by position.
    pub fn all_citations(&self) -> Vec<Citation> {
        self.citations
            .values()
            .enumerate()
            .map(|(i, metadata)| Citation::new(number_for(i), metadata.clone()))
            .collect()
    }

    /// Records marked used, in citation order, keeping their collector numbers.
    pub fn used_citations(&self) -> Vec<Citation> {
        self.citations
            .iter()
            .enumerate()
            .filter(|(_, (url, _))| self.used.contains(url.as_str()))
            .map(|(i, (_, metadata))| Citation::new(number_for(i), metadata.clone()))
            .collect()
    }

    /// URLs in citation order.
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.citations.keys().map(String::as_str)
    }

    /// Number of unique citations held.
    pub fn count(&self) -> usize {
        self.citations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.citations.is_empty()
    }

    /// Append every URL from `other` that this collector has not seen, in
    /// `other`'s order. Records already present here are left untouched.
    pub fn merge_with(&mut self, other: &CitationCollector) {
        let before = self.citations.len();
        for (url, metadata) in &other.citations {
            if !self.citations.contains_key(url) {
                self.citations.insert(url.clone(), metadata.clone());
            }
        }
        for url in &other.used {
            if self.citations.contains_key(url) {
                self.used.insert(url.clone());
            }
        }
        info!(
            appended = self.citations.len() - before,
            total = self.citations.len(),
            "collectors merged"
        );
    }

    pub fn to_snapshot(&self) -> CollectorSnapshot {
        CollectorSnapshot {
            citations: self.citations.values().cloned().collect(),
            used: self.used.iter().cloned().collect(),
        }
    }

    /// Rebuild a collector from a snapshot. Positions follow the snapshot's
    /// record order; used URLs with no matching record are dropped.
    pub fn from_snapshot(snapshot: CollectorSnapshot) -> Self {
        Self::from_snapshot_with_config(snapshot, CitationConfig::default())
    }

    pub fn from_snapshot_with_config(snapshot: CollectorSnapshot, config: CitationConfig) -> Self {
        let mut collector = Self::with_config(config);
        for metadata in snapshot.citations {
            if collector.citations.contains_key(metadata.url()) {
                warn!(url = metadata.url(), "duplicate url in snapshot, keeping last record");
            }
            collector.upsert(metadata);
        }
        for url in snapshot.used {
            if collector.citations.contains_key(&url) {
                collector.used.insert(url);
            } else {
                warn!(url = %url, "dropping used url with no matching citation");
            }
        }
        info!(
            count = collector.citations.len(),
            used = collector.used.len(),
            "collector restored"
        );
        collector
    }

    pub fn to_dict(&self) -> Value {
        serde_json::to_value(self.to_snapshot()).unwrap_or(Value::Null)
    }

    pub fn from_dict(data: Value) -> Result<Self> {
        let snapshot: CollectorSnapshot =
            serde_json::from_value(data).context("invalid collector snapshot")?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_snapshot()).context("serialize collector snapshot")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: CollectorSnapshot =
            serde_json::from_str(json).context("invalid collector snapshot")?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Drop every record, position and used flag together.
    pub fn clear(&mut self) {
        self.citations.clear();
        self.used.clear();
        debug!("collector cleared");
    }
}

fn number_for(index: usize) -> u32 {
    u32::try_from(index + 1).unwrap_or(u32::MAX)
}

/// Plain-text prefix of crawled content. HTML payloads are rendered to text first.
fn snippet(content: &str, max_chars: usize) -> String {
    let text = if looks_like_html(content) {
        html2text::from_read(content.as_bytes(), 120).unwrap_or_else(|_| content.to_string())
    } else {
        content.to_string()
    };
    text.trim().chars().take(max_chars).collect()
}

fn looks_like_html(content: &str) -> bool {
    let head: String = content
        .trim_start()
        .chars()
        .take(512)
        .collect::<String>()
        .to_lowercase();
    head.starts_with("<!doctype html")
        || head.starts_with("<html")
        || head.contains("<body")
        || head.contains("<head")
}
