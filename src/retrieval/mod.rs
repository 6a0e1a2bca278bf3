//! Retrieval Pipeline
//!
//! Linear-scan ranking of embedded chunks against a query vector, followed by
//! page-level deduplication into citations. There is no index structure: every
//! candidate is scored on every query, which is fine for the tens to low
//! thousands of chunks a session holds.

pub mod dedup;


use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

use crate::Result;
use crate::corpus::ChunkSource;
use crate::models::{Citation, EmbeddingChunk, SearchResult};
use crate::similarity::{cosine_from_parts, norm_f64};

pub use dedup::deduplicate_by_page;

pub const DEFAULT_TOP_K: usize = 4;
pub const DEFAULT_MIN_SIMILARITY: f32 = 0.1;

/// Number of chunks scored between cooperative yields in [`Retriever`]
const SCORING_BLOCK_SIZE: usize = 256;

/// Per-query retrieval parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalOptions {
    /// Maximum number of results returned
    pub top_k: usize,
    /// Candidates scoring strictly below this are discarded
    pub min_similarity: f32,
    /// Merge results that come from the same document page
    pub deduplicate_pages: bool,
}

impl Default for RetrievalOptions {
    #[inline]
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            min_similarity: DEFAULT_MIN_SIMILARITY,
            deduplicate_pages: true,
        }
    }
}

/// Rank `chunks` against `query` and keep the best `k` scoring at least
/// `min_similarity`.
///
/// The sort is stable, so equally scored chunks keep their input order.
///
/// # Errors
/// Returns [`crate::RetrievalError::LengthMismatch`] if any chunk's embedding
/// differs in dimension from the query.
#[inline]
pub fn find_top_k<'a>(
    query: &[f32],
    chunks: &'a [EmbeddingChunk],
    k: usize,
    min_similarity: f32,
) -> Result<Vec<SearchResult<'a>>> {
    if k == 0 || chunks.is_empty() {
        return Ok(Vec::new());
    }

    let query_norm = norm_f64(query);
    let mut survivors = Vec::new();
    score_block(query, query_norm, chunks, min_similarity, &mut survivors)?;

    debug!(
        "Scored {} candidates, {} at or above {}",
        chunks.len(),
        survivors.len(),
        min_similarity
    );

    Ok(rank(survivors, k))
}

fn score_block<'a>(
    query: &[f32],
    query_norm: f64,
    block: &'a [EmbeddingChunk],
    min_similarity: f32,
    survivors: &mut Vec<SearchResult<'a>>,
) -> Result<()> {
    for chunk in block {
        let similarity = cosine_from_parts(
            query,
            &chunk.embedding,
            Some(query_norm),
            chunk.embedding_norm.map(f64::from),
        )?;

        // NaN never satisfies the floor, so unvalidated vectors drop out here
        if similarity >= min_similarity {
            survivors.push(SearchResult {
                chunk,
                similarity,
                document: chunk.document_summary(),
            });
        }
    }
    Ok(())
}

fn rank(mut results: Vec<SearchResult<'_>>, k: usize) -> Vec<SearchResult<'_>> {
    results.sort_by(|a, b| by_similarity_desc(a.similarity, b.similarity));
    results.truncate(k);
    results
}

pub(crate) fn by_similarity_desc(a: f32, b: f32) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Query front-end for callers running inside an async runtime.
///
/// Scoring is the same single deterministic pass as [`find_top_k`]; it only
/// yields to the runtime between blocks so a large scan does not hold the
/// executor thread. Once started, a pass runs to completion.
#[derive(Debug, Clone, Default)]
pub struct Retriever {
    options: RetrievalOptions,
}

impl Retriever {
    #[inline]
    pub fn new(options: RetrievalOptions) -> Self {
        Self { options }
    }

    #[inline]
    pub fn options(&self) -> &RetrievalOptions {
        &self.options
    }

    /// Ranked results without page deduplication
    ///
    /// # Errors
    /// Returns [`crate::RetrievalError::LengthMismatch`] on a dimension mismatch.
    #[inline]
    pub async fn search<'a>(
        &self,
        query: &[f32],
        chunks: &'a [EmbeddingChunk],
    ) -> Result<Vec<SearchResult<'a>>> {
        let RetrievalOptions {
            top_k,
            min_similarity,
            ..
        } = self.options;

        if top_k == 0 || chunks.is_empty() {
            return Ok(Vec::new());
        }

        let query_norm = norm_f64(query);
        let mut survivors = Vec::new();

        for block in chunks.chunks(SCORING_BLOCK_SIZE) {
            score_block(query, query_norm, block, min_similarity, &mut survivors)?;
            tokio::task::yield_now().await;
        }

        debug!(
            "Scored {} candidates in blocks of {}, {} survivors",
            chunks.len(),
            SCORING_BLOCK_SIZE,
            survivors.len()
        );

        Ok(rank(survivors, top_k))
    }

    /// Ranked citations, merged per page when the options ask for it
    ///
    /// # Errors
    /// Returns [`crate::RetrievalError::LengthMismatch`] on a dimension mismatch.
    #[inline]
    pub async fn retrieve(
        &self,
        query: &[f32],
        chunks: &[EmbeddingChunk],
    ) -> Result<Vec<Citation>> {
        let results = self.search(query, chunks).await?;

        let citations = if self.options.deduplicate_pages {
            deduplicate_by_page(results)
        } else {
            results.into_iter().map(Citation::from).collect()
        };

        Ok(citations)
    }

    /// Load candidates from `source` and retrieve against them
    ///
    /// # Errors
    /// Propagates failures from the source and dimension mismatches.
    #[inline]
    pub async fn retrieve_from(
        &self,
        source: &dyn ChunkSource,
        session_id: Option<&str>,
        query: &[f32],
    ) -> Result<Vec<Citation>> {
        let chunks = source.load_chunks(session_id).await?;
        debug!(
            "Loaded {} chunks for session {:?}",
            chunks.len(),
            session_id
        );
        self.retrieve(query, &chunks).await
    }
}
