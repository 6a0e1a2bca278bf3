use serde::Deserialize;
use serde_json::Value;

use crate::models::{EmbeddingChunk, Provenance, estimate_token_count};
use crate::similarity::to_float32;

/// A document package as written by the ingestion scripts
#[derive(Debug, Deserialize)]
pub(super) struct DocumentPackage {
    pub format_version: String,
    #[serde(default)]
    pub export_metadata: Option<ExportMetadata>,
    pub document_metadata: DocumentMetadata,
    pub chunks: Vec<PackageChunk>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct ExportMetadata {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct DocumentMetadata {
    pub id: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub embedding_model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PackageChunk {
    pub id: String,
    pub text: String,
    pub embedding: Vec<f64>,
    #[serde(default)]
    pub token_count: Option<usize>,
    #[serde(default)]
    pub metadata: PackageChunkMetadata,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct PackageChunkMetadata {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub pages: Vec<u32>,
    #[serde(default)]
    pub chunk_index: Option<usize>,
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// Cheap shape check so stray JSON files can be skipped instead of failing
pub(super) fn is_package(value: &Value) -> bool {
    value.get("format_version").is_some_and(Value::is_string)
        && value.get("chunks").is_some_and(Value::is_array)
}

impl DocumentPackage {
    pub(super) fn into_chunks(self) -> Vec<EmbeddingChunk> {
        let session_id = self
            .export_metadata
            .and_then(|meta| meta.session_id)
            .unwrap_or_default();
        let document = self.document_metadata;

        let provenance = Provenance {
            title: document.title,
            file_name: document.filename,
            author: document.author,
            language: document.language,
            embedding_model: document.embedding_model,
        };

        self.chunks
            .into_iter()
            .enumerate()
            .map(|(position, chunk)| {
                let metadata = chunk.metadata;

                let mut pages = metadata.pages;
                if let Some(page) = metadata.page {
                    if !pages.contains(&page) {
                        pages.insert(0, page);
                    }
                }

                let mut chunk_provenance = provenance.clone();
                if chunk_provenance.file_name.is_none() {
                    chunk_provenance.file_name = metadata.source;
                }

                EmbeddingChunk {
                    token_count: chunk
                        .token_count
                        .unwrap_or_else(|| estimate_token_count(&chunk.text)),
                    id: chunk.id,
                    document_id: metadata
                        .document_id
                        .unwrap_or_else(|| document.id.clone()),
                    session_id: session_id.clone(),
                    content: chunk.text,
                    chunk_index: metadata.chunk_index.unwrap_or(position),
                    embedding: to_float32(&chunk.embedding),
                    embedding_norm: None,
                    pages,
                    provenance: Some(chunk_provenance),
                }
                .with_cached_norm()
            })
            .collect()
    }
}
