//! Chunk, search result and citation records shared by the retrieval pipeline.


use serde::{Deserialize, Serialize};

use crate::similarity::vector_norm;

/// Optional source-document details carried for citation display.
/// Never used for ranking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub title: Option<String>,
    pub file_name: Option<String>,
    pub author: Option<String>,
    pub language: Option<String>,
    pub embedding_model: Option<String>,
}

/// An immutable, embedded span of a source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingChunk {
    pub id: String,
    pub document_id: String,
    pub session_id: String,
    /// The chunk text
    pub content: String,
    pub token_count: usize,
    /// Position of this chunk within its document
    pub chunk_index: usize,
    pub embedding: Vec<f32>,
    /// Cached `vector_norm(embedding)`, when the ingestion path stored one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_norm: Option<f32>,
    /// Page numbers covered by this chunk; more than one when pages were merged
    #[serde(default)]
    pub pages: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

impl EmbeddingChunk {
    #[inline]
    pub fn new(
        id: impl Into<String>,
        document_id: impl Into<String>,
        content: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        let content = content.into();
        Self {
            id: id.into(),
            document_id: document_id.into(),
            session_id: String::new(),
            token_count: estimate_token_count(&content),
            content,
            chunk_index: 0,
            embedding,
            embedding_norm: None,
            pages: Vec::new(),
            provenance: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.pages.push(page);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_chunk_index(mut self, chunk_index: usize) -> Self {
        self.chunk_index = chunk_index;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = Some(provenance);
        self
    }

    /// Store the embedding's norm so scoring can skip recomputing it
    #[inline]
    #[must_use]
    pub fn with_cached_norm(mut self) -> Self {
        self.embedding_norm = Some(vector_norm(&self.embedding));
        self
    }

    /// The page used to group this chunk for citations
    #[inline]
    pub fn primary_page(&self) -> Option<u32> {
        self.pages.first().copied()
    }

    #[inline]
    pub fn document_summary(&self) -> DocumentSummary {
        let provenance = self.provenance.as_ref();
        let file_name = provenance.and_then(|p| p.file_name.clone());
        let title = provenance
            .and_then(|p| p.title.clone())
            .or_else(|| file_name.clone())
            .unwrap_or_else(|| self.document_id.clone());

        DocumentSummary {
            id: self.document_id.clone(),
            title,
            file_name,
        }
    }
}

/// Rough token estimate used when a chunk arrives without a count
#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    text.len().div_ceil(4)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: String,
    pub title: String,
    pub file_name: Option<String>,
}

/// A scored candidate, borrowing the chunk it ranks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult<'a> {
    pub chunk: &'a EmbeddingChunk,
    pub similarity: f32,
    pub document: DocumentSummary,
}

/// Merge provenance for a citation built from several chunks of one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedChunk {
    pub merged_count: usize,
    pub chunk_ids: Vec<String>,
}

/// A user-facing reference to one source page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub chunk_id: String,
    pub document: DocumentSummary,
    pub page: Option<u32>,
    pub similarity: f32,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combined: Option<CombinedChunk>,
}

impl Citation {
    #[inline]
    pub fn is_combined(&self) -> bool {
        self.combined.is_some()
    }

    #[inline]
    pub fn merged_count(&self) -> usize {
        self.combined.as_ref().map_or(1, |c| c.merged_count)
    }

    /// Ids of every chunk this citation stands for
    #[inline]
    pub fn source_chunk_ids(&self) -> Vec<String> {
        self.combined
            .as_ref()
            .map_or_else(|| vec![self.chunk_id.clone()], |c| c.chunk_ids.clone())
    }
}

impl From<SearchResult<'_>> for Citation {
    #[inline]
    fn from(result: SearchResult<'_>) -> Self {
        Self {
            chunk_id: result.chunk.id.clone(),
            page: result.chunk.primary_page(),
            content: result.chunk.content.clone(),
            similarity: result.similarity,
            document: result.document,
            combined: None,
        }
    }
}

impl From<&SearchResult<'_>> for Citation {
    #[inline]
    fn from(result: &SearchResult<'_>) -> Self {
        Self::from(result.clone())
    }
}
