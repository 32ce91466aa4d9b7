pub mod collector;
pub mod formatter;
pub mod heuristics;
pub mod messages;
pub mod report;
pub mod types;

pub use collector::{CitationCollector, CollectorSnapshot};
pub use formatter::{
    citations_to_markdown_references, format_inline_marker, merge_citations, CitationFormatter,
    CitationStyle,
};
pub use heuristics::{extract_domain, extract_title_from_content, DEFAULT_TITLE_MAX_LENGTH};
pub use messages::extract_citations_from_messages;
pub use report::{parse_citations_from_report, ExtractedCitation, ReportCitations};
pub use types::{citation_id, Citation, CitationFormat, CitationMetadata, SearchResult, ToolMessage};
