use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use citation_registry::{
    parse_citations_from_report, CitationCollector, CitationConfig, CitationFormatter,
    SearchResult,
};

/// Build, inspect and render citation registries.
#[derive(Parser)]
#[command(name = "citations", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Recover citations from a report's citations section
    Extract {
        /// Report file (`-` for stdin)
        report: PathBuf,
        /// Heading pattern(s) that open the citations section
        #[arg(long = "section")]
        sections: Vec<String>,
    },
    /// Collect a JSON array of search results into a registry snapshot
    Collect {
        /// Search results file (`-` for stdin)
        results: PathBuf,
        /// Query that produced the results
        #[arg(long)]
        query: Option<String>,
    },
    /// Render a registry snapshot as a reference list
    Render {
        /// Snapshot file (`-` for stdin)
        snapshot: PathBuf,
        /// Only render citations marked as used
        #[arg(long)]
        used_only: bool,
    },
}

fn main() -> Result<()> {
    let config = CitationConfig::from_env();

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Extract { report, sections } => {
            let text = read_input(&report)?;
            let patterns: Vec<&str> = sections.iter().map(String::as_str).collect();
            let custom = (!patterns.is_empty()).then_some(patterns.as_slice());
            let result = parse_citations_from_report(&text, custom);
            info!(count = result.count, "report citations extracted");
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Collect { results, query } => {
            let text = read_input(&results)?;
            let records: Vec<SearchResult> =
                serde_json::from_str(&text).context("Failed to parse search results JSON")?;
            let mut collector = CitationCollector::with_config(config.clone());
            collector.add_from_search_results(&records, query.as_deref());
            info!(
                input = records.len(),
                unique = collector.count(),
                "search results collected"
            );
            println!("{}", collector.to_json()?);
        }
        Command::Render { snapshot, used_only } => {
            let text = read_input(&snapshot)?;
            let collector = CitationCollector::from_json(&text)?;
            let citations = if used_only {
                collector.used_citations()
            } else {
                collector.all_citations()
            };
            let formatter = CitationFormatter::new(config.style);
            print!("{}", formatter.format_reference_list(&citations));
        }
    }

    Ok(())
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))
    }
}
