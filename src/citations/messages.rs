//! Recover citations from raw tool output recorded in an agent conversation.

use serde_json::Value;
use tracing::debug;

use super::formatter::merge_citations;
use super::heuristics::{extract_title_from_content, DEFAULT_TITLE_MAX_LENGTH};
use super::types::{CitationMetadata, SearchResult, ToolMessage};

/// Collect citation records from tool-call outputs.
///
/// Accepted bodies (JSON): `{"results": [...], "query": ...}`, a bare array
/// of result records, or a crawl payload `{"url": ..., "crawled_content": ...}`.
/// Bodies that are not JSON, or match none of these shapes, are skipped.
/// Records are merged by URL, keeping the higher relevance score.
pub fn extract_citations_from_messages(messages: &[ToolMessage]) -> Vec<CitationMetadata> {
    let mut citations = Vec::new();
    for message in messages {
        let found = citations_from_message(message);
        if !found.is_empty() {
            debug!(
                tool = message.name.as_deref().unwrap_or("unknown"),
                count = found.len(),
                "citations recovered from tool output"
            );
            citations = merge_citations(&citations, &found);
        }
    }
    citations
}

fn citations_from_message(message: &ToolMessage) -> Vec<CitationMetadata> {
    let body: Value = match serde_json::from_str(message.content.trim()) {
        Ok(v) => v,
        Err(e) => {
            debug!(
                tool = message.name.as_deref().unwrap_or("unknown"),
                error = %e,
                "tool output is not json, skipping"
            );
            return Vec::new();
        }
    };

    match &body {
        Value::Array(items) => from_results(items, None),
        Value::Object(obj) => {
            if let Some(Value::Array(items)) = obj.get("results") {
                from_results(items, obj.get("query").and_then(Value::as_str))
            } else if let Some(meta) = from_crawl_payload(&body) {
                vec![meta]
            } else {
                Vec::new()
            }
        }
        _ => Vec::new(),
    }
}

fn from_results(items: &[Value], query: Option<&str>) -> Vec<CitationMetadata> {
    items
        .iter()
        .filter_map(|item| serde_json::from_value::<SearchResult>(item.clone()).ok())
        .filter_map(|record| CitationMetadata::from_search_result(&record, query))
        .collect()
}

fn from_crawl_payload(body: &Value) -> Option<CitationMetadata> {
    let url = body.get("url")?.as_str()?.trim();
    let content = body.get("crawled_content")?.as_str()?;
    if url.is_empty() {
        return None;
    }
    let mut meta = CitationMetadata::new(
        url,
        extract_title_from_content(Some(content), DEFAULT_TITLE_MAX_LENGTH),
    );
    meta.raw_content = Some(content.to_string());
    meta.extra
        .insert("result_type".to_string(), Value::from("crawl"));
    Some(meta)
}
