//! Coarse routing over documents and page sections.
//!
//! Every document is summarised by a centroid: the L2-normalised mean of its
//! chunks' unit embeddings. Pages are bucketed into fixed-size sections
//! (`section_pages` pages each) and every section gets a centroid the same
//! way. Ranking a query against centroids narrows a large library down to a
//! few documents or sections before the chunk-level pass in
//! [`crate::retrieval`].


use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};

use crate::Result;
use crate::models::{DocumentSummary, EmbeddingChunk};
use crate::retrieval::by_similarity_desc;
use crate::similarity::{cosine_from_parts, norm_f64, normalize};

pub const DEFAULT_SECTION_PAGES: u32 = 20;
pub const DEFAULT_MIN_CHUNKS_PER_SECTION: usize = 1;

/// Page assumed for chunks without a usable page number
const FALLBACK_PAGE: u32 = 1;

/// How chunks are grouped into routing centroids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingOptions {
    /// Pages per section; values below one are treated as one
    pub section_pages: u32,
    /// Sections backed by fewer chunks than this get no centroid
    pub min_chunks_per_section: usize,
}

impl Default for RoutingOptions {
    #[inline]
    fn default() -> Self {
        Self {
            section_pages: DEFAULT_SECTION_PAGES,
            min_chunks_per_section: DEFAULT_MIN_CHUNKS_PER_SECTION,
        }
    }
}

/// Centroid of one run of pages within a document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionRoute {
    /// `<document id>_sec_<zero-padded section index>`
    pub section_id: String,
    pub title: String,
    pub page_start: u32,
    pub page_end: u32,
    pub chunk_count: usize,
    pub chunk_ids: Vec<String>,
    pub vector: Vec<f32>,
}

/// Centroid of a whole document plus its section centroids
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRoute {
    pub document: DocumentSummary,
    pub embedding_dimensions: usize,
    /// Chunks that contributed to the centroid
    pub chunk_count: usize,
    /// Highest page seen among contributing chunks
    pub page_count: u32,
    pub vector: Vec<f32>,
    pub sections: Vec<SectionRoute>,
}

/// A document that produced no centroid, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDocument {
    pub document_id: String,
    pub reason: String,
}

/// One ranked routing candidate. `section` is `None` for a document match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteMatch<'a> {
    pub document: &'a DocumentRoute,
    pub section: Option<&'a SectionRoute>,
    pub similarity: f32,
}

/// Document and section centroids for a corpus
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoutingIndex {
    section_pages: u32,
    documents: Vec<DocumentRoute>,
    skipped: Vec<SkippedDocument>,
}

impl RoutingIndex {
    /// Build centroids for every document in `chunks`, in first-seen order.
    ///
    /// Within a document the first non-empty embedding fixes the dimension;
    /// chunks of another dimension, and zero or non-finite embeddings, do not
    /// contribute. A document left with no contributing chunk is recorded in
    /// [`RoutingIndex::skipped`].
    #[inline]
    pub fn build(chunks: &[EmbeddingChunk], options: RoutingOptions) -> Self {
        let section_pages = options.section_pages.max(1);

        let mut order: Vec<&str> = Vec::new();
        let mut by_document: HashMap<&str, Vec<&EmbeddingChunk>> = HashMap::new();
        for chunk in chunks {
            by_document
                .entry(chunk.document_id.as_str())
                .or_insert_with(|| {
                    order.push(chunk.document_id.as_str());
                    Vec::new()
                })
                .push(chunk);
        }

        let mut index = Self {
            section_pages,
            documents: Vec::new(),
            skipped: Vec::new(),
        };

        for document_id in order {
            let members = by_document.remove(document_id).unwrap_or_default();
            match build_document(&members, section_pages, options.min_chunks_per_section) {
                Ok(route) => index.documents.push(route),
                Err(reason) => {
                    debug!("No routing centroid for {}: {}", document_id, reason);
                    index.skipped.push(SkippedDocument {
                        document_id: document_id.to_string(),
                        reason,
                    });
                }
            }
        }

        info!(
            "Built routing index: {} documents, {} sections, {} skipped",
            index.documents.len(),
            index.section_count(),
            index.skipped.len()
        );
        index
    }

    #[inline]
    pub fn documents(&self) -> &[DocumentRoute] {
        &self.documents
    }

    #[inline]
    pub fn skipped(&self) -> &[SkippedDocument] {
        &self.skipped
    }

    #[inline]
    pub fn section_pages(&self) -> u32 {
        self.section_pages
    }

    #[inline]
    pub fn section_count(&self) -> usize {
        self.documents.iter().map(|d| d.sections.len()).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Best `n` documents scoring at least `min_similarity`, ties in index order
    ///
    /// # Errors
    /// Returns [`crate::RetrievalError::LengthMismatch`] when a centroid's
    /// dimension differs from the query's.
    #[inline]
    pub fn route_documents(
        &self,
        query: &[f32],
        n: usize,
        min_similarity: f32,
    ) -> Result<Vec<RouteMatch<'_>>> {
        let candidates = self.documents.iter().map(|d| (d, None::<&SectionRoute>));
        rank_routes(query, candidates, n, min_similarity)
    }

    /// Best `n` sections across all documents scoring at least `min_similarity`
    ///
    /// # Errors
    /// Returns [`crate::RetrievalError::LengthMismatch`] when a centroid's
    /// dimension differs from the query's.
    #[inline]
    pub fn route_sections(
        &self,
        query: &[f32],
        n: usize,
        min_similarity: f32,
    ) -> Result<Vec<RouteMatch<'_>>> {
        let candidates = self
            .documents
            .iter()
            .flat_map(|d| d.sections.iter().map(move |s| (d, Some(s))));
        rank_routes(query, candidates, n, min_similarity)
    }
}

/// Chunks covered by any of `matches`, in corpus order: every chunk of a
/// matched document, and the member chunks of a matched section
#[inline]
pub fn routed_candidates(
    chunks: &[EmbeddingChunk],
    matches: &[RouteMatch<'_>],
) -> Vec<EmbeddingChunk> {
    let documents: HashSet<&str> = matches
        .iter()
        .filter(|m| m.section.is_none())
        .map(|m| m.document.document.id.as_str())
        .collect();
    let sections: HashSet<&str> = matches
        .iter()
        .filter_map(|m| m.section)
        .flat_map(|s| s.chunk_ids.iter().map(String::as_str))
        .collect();

    chunks
        .iter()
        .filter(|c| {
            documents.contains(c.document_id.as_str()) || sections.contains(c.id.as_str())
        })
        .cloned()
        .collect()
}

fn rank_routes<'a, I>(
    query: &[f32],
    candidates: I,
    n: usize,
    min_similarity: f32,
) -> Result<Vec<RouteMatch<'a>>>
where
    I: Iterator<Item = (&'a DocumentRoute, Option<&'a SectionRoute>)>,
{
    if n == 0 {
        return Ok(Vec::new());
    }

    let query_norm = norm_f64(query);
    let mut matches = Vec::new();
    for (document, section) in candidates {
        let vector = section.map_or(&document.vector, |s| &s.vector);
        let similarity = cosine_from_parts(query, vector, Some(query_norm), None)?;
        if similarity >= min_similarity {
            matches.push(RouteMatch {
                document,
                section,
                similarity,
            });
        }
    }

    matches.sort_by(|a, b| by_similarity_desc(a.similarity, b.similarity));
    matches.truncate(n);
    Ok(matches)
}

/// Running sum of unit vectors
struct Centroid {
    sum: Vec<f64>,
    count: usize,
}

impl Centroid {
    fn new(dimension: usize) -> Self {
        Self {
            sum: vec![0.0; dimension],
            count: 0,
        }
    }

    fn add(&mut self, unit: &[f32]) {
        for (total, &x) in self.sum.iter_mut().zip(unit) {
            *total += f64::from(x);
        }
        self.count += 1;
    }

    /// Normalised mean; `None` when nothing was added or the members cancel out
    fn finish(&self) -> Option<Vec<f32>> {
        if self.count == 0 {
            return None;
        }
        let count = self.count as f64;
        let mean: Vec<f32> = self.sum.iter().map(|s| (s / count) as f32).collect();
        normalize(&mean)
    }
}

struct SectionBucket {
    centroid: Centroid,
    chunk_ids: Vec<String>,
}

fn build_document(
    members: &[&EmbeddingChunk],
    section_pages: u32,
    min_chunks_per_section: usize,
) -> std::result::Result<DocumentRoute, String> {
    let Some(first) = members.first() else {
        return Err("no chunks".to_string());
    };
    let Some(dimension) = members
        .iter()
        .map(|c| c.embedding.len())
        .find(|&len| len > 0)
    else {
        return Err("no embedded chunks".to_string());
    };

    let mut document = Centroid::new(dimension);
    let mut buckets: BTreeMap<u32, SectionBucket> = BTreeMap::new();
    let mut page_count = 0;
    let mut mismatched = 0;

    for chunk in members {
        if chunk.embedding.len() != dimension {
            mismatched += 1;
            continue;
        }
        let Some(unit) = normalize(&chunk.embedding) else {
            continue;
        };

        let page = chunk
            .primary_page()
            .filter(|&p| p > 0)
            .unwrap_or(FALLBACK_PAGE);
        page_count = page_count.max(page);

        document.add(&unit);
        let bucket = buckets
            .entry((page - 1) / section_pages)
            .or_insert_with(|| SectionBucket {
                centroid: Centroid::new(dimension),
                chunk_ids: Vec::new(),
            });
        bucket.centroid.add(&unit);
        bucket.chunk_ids.push(chunk.id.clone());
    }

    if mismatched > 0 {
        debug!(
            "Document {}: {} chunks differ from dimension {}",
            first.document_id, mismatched, dimension
        );
    }

    let vector = document
        .finish()
        .ok_or_else(|| "no usable embeddings".to_string())?;

    let sections = buckets
        .into_iter()
        .filter(|(_, bucket)| bucket.centroid.count >= min_chunks_per_section)
        .filter_map(|(section_index, bucket)| {
            let vector = bucket.centroid.finish()?;
            let page_start = section_index.saturating_mul(section_pages).saturating_add(1);
            let page_end = section_index
                .saturating_add(1)
                .saturating_mul(section_pages);
            Some(SectionRoute {
                section_id: format!("{}_sec_{:04}", first.document_id, section_index),
                title: format!("Pages {}-{}", page_start, page_end),
                page_start,
                page_end,
                chunk_count: bucket.centroid.count,
                chunk_ids: bucket.chunk_ids,
                vector,
            })
        })
        .collect();

    Ok(DocumentRoute {
        document: first.document_summary(),
        embedding_dimensions: dimension,
        chunk_count: document.count,
        page_count,
        vector,
        sections,
    })
}
