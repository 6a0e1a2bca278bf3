//! Chunk corpora handed to the retrieval pipeline by the ingestion side.
//!
//! The pipeline only ever reads chunks; this module turns document packages
//! on disk into [`EmbeddingChunk`]s and offers an opt-in validation pass over
//! them, since scoring itself never validates.
//!
//! Packages are JSON, either plain (`*.json`) or gzip-compressed (`*.bin`).

mod package;


use async_trait::async_trait;
use flate2::read::GzDecoder;
use serde_json::Value;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{DocumentSummary, EmbeddingChunk};
use crate::similarity::validate_vector;
use crate::{Result, RetrievalError};

use package::{DocumentPackage, is_package};

/// Extension of gzip-compressed packages
const COMPRESSED_EXTENSION: &str = "bin";
const PACKAGE_EXTENSIONS: [&str; 2] = ["json", COMPRESSED_EXTENSION];

/// Anything that can hand the retrieval pipeline a batch of candidate chunks
#[async_trait]
pub trait ChunkSource: Send + Sync {
    /// Chunks for one session, or every chunk when `session_id` is `None`
    async fn load_chunks(&self, session_id: Option<&str>) -> Result<Vec<EmbeddingChunk>>;
}

/// A problem found by [`Corpus::validate`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorpusIssue {
    #[error("chunk {chunk_id}: embedding is empty or contains non-finite values")]
    InvalidVector { chunk_id: String },
    #[error("chunk {chunk_id}: dimension {found} differs from corpus dimension {expected}")]
    DimensionMismatch {
        chunk_id: String,
        expected: usize,
        found: usize,
    },
}

/// A file [`Corpus::load_dir`] passed over, and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// In-memory collection of embedded chunks
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    chunks: Vec<EmbeddingChunk>,
    skipped: Vec<SkippedFile>,
}

impl Corpus {
    #[inline]
    pub fn from_chunks(chunks: Vec<EmbeddingChunk>) -> Self {
        Self {
            chunks,
            skipped: Vec::new(),
        }
    }

    /// Load a single package file, or every package in a directory
    #[inline]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            Self::load_dir(path)
        } else {
            Self::load_package(path)
        }
    }

    /// Load one document package, plain or gzip-compressed
    #[inline]
    pub fn load_package<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let value = read_package_value(path)?;

        if !is_package(&value) {
            return Err(RetrievalError::Corpus(format!(
                "{} is not a document package (missing format_version or chunks)",
                path.display()
            )));
        }

        let chunks = parse_package(path, value)?;
        info!("Loaded {} chunks from {}", chunks.len(), path.display());
        Ok(Self::from_chunks(chunks))
    }

    /// Load every `*.json` and `*.bin` package in `dir`, in file name order.
    ///
    /// A file that cannot be read, is not a package, or fails to parse is
    /// skipped with a warning and recorded in [`Corpus::skipped`].
    #[inline]
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut paths: Vec<_> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && has_package_extension(p))
            .collect();
        paths.sort();

        let mut corpus = Self::default();
        for path in paths {
            let value = match read_package_value(&path) {
                Ok(value) => value,
                Err(e) => {
                    corpus.skip(path, e.to_string());
                    continue;
                }
            };

            if !is_package(&value) {
                corpus.skip(path, "not a document package".to_string());
                continue;
            }

            match parse_package(&path, value) {
                Ok(chunks) => corpus.chunks.extend(chunks),
                Err(e) => corpus.skip(path, e.to_string()),
            }
        }

        info!(
            "Loaded {} chunks from {} ({} files skipped)",
            corpus.chunks.len(),
            dir.display(),
            corpus.skipped.len()
        );
        Ok(corpus)
    }

    fn skip(&mut self, path: PathBuf, reason: String) {
        warn!("Skipping {}: {}", path.display(), reason);
        self.skipped.push(SkippedFile { path, reason });
    }

    #[inline]
    pub fn chunks(&self) -> &[EmbeddingChunk] {
        &self.chunks
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Files passed over by the last directory load
    #[inline]
    pub fn skipped(&self) -> &[SkippedFile] {
        &self.skipped
    }

    /// Embedding dimension of the first chunk
    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        self.chunks.first().map(|c| c.embedding.len())
    }

    /// One summary per distinct document, in first-seen order
    #[inline]
    pub fn documents(&self) -> Vec<DocumentSummary> {
        let mut seen = HashSet::new();
        let mut documents = Vec::new();
        for chunk in &self.chunks {
            if seen.insert(chunk.document_id.as_str()) {
                documents.push(chunk.document_summary());
            }
        }
        documents
    }

    /// Check every embedding for finiteness and a consistent dimension.
    /// An empty list means the corpus is safe to score.
    #[inline]
    pub fn validate(&self) -> Vec<CorpusIssue> {
        let Some(expected) = self.chunks.iter().find_map(|c| {
            validate_vector(&c.embedding).then_some(c.embedding.len())
        }) else {
            return self
                .chunks
                .iter()
                .map(|c| CorpusIssue::InvalidVector {
                    chunk_id: c.id.clone(),
                })
                .collect();
        };

        let mut issues = Vec::new();
        for chunk in &self.chunks {
            if !validate_vector(&chunk.embedding) {
                issues.push(CorpusIssue::InvalidVector {
                    chunk_id: chunk.id.clone(),
                });
            } else if chunk.embedding.len() != expected {
                issues.push(CorpusIssue::DimensionMismatch {
                    chunk_id: chunk.id.clone(),
                    expected,
                    found: chunk.embedding.len(),
                });
            }
        }

        debug!(
            "Validated {} chunks, {} issues",
            self.chunks.len(),
            issues.len()
        );
        issues
    }
}

#[async_trait]
impl ChunkSource for Corpus {
    #[inline]
    async fn load_chunks(&self, session_id: Option<&str>) -> Result<Vec<EmbeddingChunk>> {
        let chunks = match session_id {
            Some(session) => self
                .chunks
                .iter()
                .filter(|c| c.session_id == session)
                .cloned()
                .collect(),
            None => self.chunks.clone(),
        };
        Ok(chunks)
    }
}

fn has_package_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| PACKAGE_EXTENSIONS.contains(&ext))
}

fn read_package_value(path: &Path) -> Result<Value> {
    let file = File::open(path)?;
    let compressed = path
        .extension()
        .is_some_and(|ext| ext == COMPRESSED_EXTENSION);

    let value = if compressed {
        serde_json::from_reader(BufReader::new(GzDecoder::new(file)))?
    } else {
        serde_json::from_reader(BufReader::new(file))?
    };
    Ok(value)
}

fn parse_package(path: &Path, value: Value) -> Result<Vec<EmbeddingChunk>> {
    let package: DocumentPackage = serde_json::from_value(value).map_err(|e| {
        RetrievalError::Corpus(format!("Invalid package {}: {}", path.display(), e))
    })?;
    debug!(
        "Parsed package {} (format {}, document {})",
        path.display(),
        package.format_version,
        package.document_metadata.id
    );
    Ok(package.into_chunks())
}
