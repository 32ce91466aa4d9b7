use std::str::FromStr;

use tracing::{warn, Level};

use crate::citations::formatter::CitationStyle;
use crate::citations::heuristics::DEFAULT_TITLE_MAX_LENGTH;

/// Tunable citation parameters. Defaults can be overridden from the
/// environment (or a `.env` file) with [`CitationConfig::from_env`].
#[derive(Debug, Clone, PartialEq)]
pub struct CitationConfig {
    pub title_max_length: usize,
    pub snippet_length: usize,
    pub style: CitationStyle,
    pub log_level: Level,
}

impl Default for CitationConfig {
    fn default() -> Self {
        Self {
            title_max_length: DEFAULT_TITLE_MAX_LENGTH,
            snippet_length: 500,
            style: CitationStyle::Numbered,
            log_level: Level::INFO,
        }
    }
}

impl CitationConfig {
    /// Read `CITATION_TITLE_MAX_LEN`, `CITATION_SNIPPET_LEN`, `CITATION_STYLE`
    /// and `CITATION_LOG_LEVEL`. Missing or unparseable values keep the default.
    pub fn from_env() -> Self {
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            title_max_length: parse_or(
                &lookup,
                "CITATION_TITLE_MAX_LEN",
                defaults.title_max_length,
            ),
            snippet_length: parse_or(&lookup, "CITATION_SNIPPET_LEN", defaults.snippet_length),
            style: parse_or(&lookup, "CITATION_STYLE", defaults.style),
            log_level: parse_or(&lookup, "CITATION_LOG_LEVEL", defaults.log_level),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key).filter(|v| !v.trim().is_empty()) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(e) => {
            warn!(key, value = %raw, error = %e, "invalid config value, using default");
            default
        }
    }
}
