//! Citation registry: turns search hits, crawled pages and report text into a
//! deduplicated, numbered set of sources, and renders them back as references.

pub mod citations;
pub mod config;

pub use citations::*;
pub use config::CitationConfig;
