use anyhow::{Context, Result, bail};
use console::style;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::config::Config;
use crate::corpus::Corpus;
use crate::models::Citation;
use crate::retrieval::{RetrievalOptions, Retriever};
use crate::routing::{RouteMatch, RoutingIndex};
use crate::similarity::{to_float32, validate_vector};

/// Per-invocation overrides for the configured retrieval defaults
#[derive(Debug, Clone, Default)]
pub struct SearchOverrides {
    pub top_k: Option<usize>,
    pub min_similarity: Option<f32>,
    pub no_dedup: bool,
}

impl SearchOverrides {
    /// Merge onto `base`, validating the result the same way the config file is
    #[inline]
    pub fn apply(&self, base: &Config) -> Result<RetrievalOptions> {
        let mut config = base.clone();
        if let Some(top_k) = self.top_k {
            config.set_top_k(top_k)?;
        }
        if let Some(min_similarity) = self.min_similarity {
            config.set_min_similarity(min_similarity)?;
        }
        if self.no_dedup {
            config.set_deduplicate_pages(false);
        }
        Ok(config.retrieval)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QueryFile {
    Vector(Vec<f64>),
    Embedding { embedding: Vec<f64> },
}

/// Read a query embedding from a JSON file holding either a bare array of
/// numbers or an object with an `embedding` array
#[inline]
pub fn read_query_vector(path: &Path) -> Result<Vec<f32>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read query file: {}", path.display()))?;
    let parsed: QueryFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse query file: {}", path.display()))?;

    let values = match parsed {
        QueryFile::Vector(values) | QueryFile::Embedding { embedding: values } => values,
    };
    let query = to_float32(&values);

    if !validate_vector(&query) {
        bail!(
            "Query vector in {} is empty or contains non-finite values",
            path.display()
        );
    }

    Ok(query)
}

/// Rank a corpus against a query embedding and print the citations
#[inline]
pub async fn search(
    corpus_path: &Path,
    query_path: &Path,
    overrides: &SearchOverrides,
    json: bool,
) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let options = overrides.apply(&config)?;

    let query = read_query_vector(query_path)?;
    let corpus = load_corpus(corpus_path)?;

    if let Some(dimension) = corpus.dimension() {
        if dimension != query.len() {
            warn!(
                "Query has {} dimensions but the corpus uses {}",
                query.len(),
                dimension
            );
        }
    }

    info!(
        "Searching {} chunks (top_k={}, min_similarity={}, dedup={})",
        corpus.len(),
        options.top_k,
        options.min_similarity,
        options.deduplicate_pages
    );

    let citations = Retriever::new(options)
        .retrieve(&query, corpus.chunks())
        .await
        .context("Search failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&citations)?);
        return Ok(());
    }

    print_citations(&citations);
    Ok(())
}

/// Lowest possible cosine; routing reports the best matches whatever they score
const ANY_SIMILARITY: f32 = -1.0;

/// Per-invocation routing settings
#[derive(Debug, Clone)]
pub struct RouteRequest {
    /// Number of documents or sections to return
    pub top_n: usize,
    /// Rank page sections instead of whole documents
    pub sections: bool,
    pub section_pages: Option<u32>,
    pub json: bool,
}

/// Rank the documents (or page sections) of a corpus against a query
/// embedding by their centroids
#[inline]
pub fn route(corpus_path: &Path, query_path: &Path, request: &RouteRequest) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(section_pages) = request.section_pages {
        config.set_section_pages(section_pages)?;
    }

    let query = read_query_vector(query_path)?;
    let corpus = load_corpus(corpus_path)?;
    let index = RoutingIndex::build(corpus.chunks(), config.routing);

    for skipped in index.skipped() {
        warn!(
            "Document {} has no routing centroid: {}",
            skipped.document_id, skipped.reason
        );
    }

    let matches = if request.sections {
        index.route_sections(&query, request.top_n, ANY_SIMILARITY)
    } else {
        index.route_documents(&query, request.top_n, ANY_SIMILARITY)
    }
    .context("Routing failed")?;

    if request.json {
        println!("{}", serde_json::to_string_pretty(&route_summaries(&matches))?);
        return Ok(());
    }

    print_routes(&matches);
    Ok(())
}

#[derive(Debug, Serialize)]
struct RouteSummary<'a> {
    document_id: &'a str,
    title: &'a str,
    section_id: Option<&'a str>,
    pages: Option<(u32, u32)>,
    chunk_count: usize,
    similarity: f32,
}

fn route_summaries<'a>(matches: &[RouteMatch<'a>]) -> Vec<RouteSummary<'a>> {
    matches
        .iter()
        .map(|m| RouteSummary {
            document_id: &m.document.document.id,
            title: &m.document.document.title,
            section_id: m.section.map(|s| s.section_id.as_str()),
            pages: m.section.map(|s| (s.page_start, s.page_end)),
            chunk_count: m.section.map_or(m.document.chunk_count, |s| s.chunk_count),
            similarity: m.similarity,
        })
        .collect()
}

/// Check every chunk in a corpus for invalid or inconsistent embeddings
#[inline]
pub fn validate_corpus(corpus_path: &Path) -> Result<()> {
    let corpus = load_corpus(corpus_path)?;

    let documents = corpus.documents();
    println!(
        "Corpus: {} chunks across {} documents",
        corpus.len(),
        documents.len()
    );
    if let Some(dimension) = corpus.dimension() {
        println!("Embedding dimension: {}", dimension);
    }
    if !corpus.skipped().is_empty() {
        println!(
            "{}",
            style(format!("⚠ {} file(s) skipped:", corpus.skipped().len())).yellow()
        );
        for skipped in corpus.skipped() {
            println!("  - {}: {}", skipped.path.display(), skipped.reason);
        }
    }

    let issues = corpus.validate();
    if issues.is_empty() {
        println!("{}", style("✓ All embeddings are valid").green());
        return Ok(());
    }

    println!(
        "{}",
        style(format!("⚠ {} problem(s) found:", issues.len())).yellow()
    );
    for issue in &issues {
        println!("  - {}", issue);
    }

    bail!("Corpus failed validation with {} issue(s)", issues.len())
}

fn load_corpus(corpus_path: &Path) -> Result<Corpus> {
    Corpus::load(corpus_path)
        .with_context(|| format!("Failed to load corpus: {}", corpus_path.display()))
}

fn print_routes(matches: &[RouteMatch<'_>]) {
    if matches.is_empty() {
        println!("No documents to route to.");
        return;
    }

    for (rank, route) in matches.iter().enumerate() {
        let location = route.section.map_or_else(String::new, |s| format!(" - {}", s.title));
        println!(
            "{}. {}{} - similarity {:.4}",
            rank + 1,
            style(&route.document.document.title).bold(),
            location,
            route.similarity
        );
    }
}

fn print_citations(citations: &[Citation]) {
    if citations.is_empty() {
        println!("No passages matched the query.");
        return;
    }

    println!("Results ({} total):", citations.len());
    println!();

    for (rank, citation) in citations.iter().enumerate() {
        let page = citation
            .page
            .map_or_else(|| "n/a".to_string(), |p| p.to_string());

        println!(
            "{}. {} (page {}) - similarity {:.4}",
            rank + 1,
            style(&citation.document.title).bold(),
            page,
            citation.similarity
        );
        if citation.is_combined() {
            println!(
                "   {}",
                style(format!("merged from {} chunks", citation.merged_count())).dim()
            );
        }
        for line in citation.content.lines() {
            println!("   {}", line);
        }
        println!();
    }
}
