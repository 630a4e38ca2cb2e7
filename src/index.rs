//! Persisted similarity index over document chunks.
//!
//! A [`PolicyIndex`] holds every chunk from the last build together with
//! its embedding vector (when an embedding provider was configured). It is
//! written as a single `index.json` inside the index directory:
//!
//! ```json
//! {
//!   "model": "text-embedding-3-small",
//!   "dims": 1536,
//!   "built_at": "2026-03-01T12:00:00Z",
//!   "entries": [{ "chunk": { ... }, "vector": "<base64 LE f32>" }]
//! }
//! ```
//!
//! # Scoring
//!
//! | Index has vectors | Provider enabled | Scoring |
//! |-------------------|------------------|---------|
//! | yes | yes | cosine similarity against the question embedding |
//! | otherwise | | fraction of question terms found in the chunk |
//!
//! Ties keep build order, so results are deterministic.

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

use crate::embedding::{self, blob_to_vec, cosine_similarity, vec_to_blob, EmbeddingProvider};
use crate::models::DocumentChunk;

pub const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: DocumentChunk,
    pub vector: Option<Vec<f32>>,
}

/// A chunk returned by [`PolicyIndex::query`].
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub score: f32,
}

#[derive(Debug)]
pub struct PolicyIndex {
    entries: Vec<IndexEntry>,
    model: Option<String>,
    dims: usize,
    built_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct IndexFile {
    model: Option<String>,
    dims: usize,
    built_at: DateTime<Utc>,
    entries: Vec<StoredEntry>,
}

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    chunk: DocumentChunk,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    vector: Option<String>,
}

impl PolicyIndex {
    /// Build an index, embedding chunk texts when `provider` is enabled.
    pub async fn build(
        chunks: Vec<DocumentChunk>,
        provider: &dyn EmbeddingProvider,
        batch_size: usize,
    ) -> Result<Self> {
        let embed = provider.is_enabled() && !chunks.is_empty();
        let (model, dims, vectors): (Option<String>, usize, Vec<Option<Vec<f32>>>) = if embed {
            let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
            let vectors = embedding::embed_in_batches(provider, &texts, batch_size)
                .await
                .context("Failed to embed chunks")?;
            info!(
                model = provider.model_name(),
                vectors = vectors.len(),
                "embedded chunks"
            );
            (
                Some(provider.model_name().to_string()),
                provider.dims(),
                vectors.into_iter().map(Some).collect(),
            )
        } else {
            (None, 0, vec![None; chunks.len()])
        };

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry { chunk, vector })
            .collect();

        Ok(Self {
            entries,
            model,
            dims,
            built_at: Utc::now(),
        })
    }

    /// Write `index.json` into `dir`, creating the directory if needed.
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create index directory: {}", dir.display()))?;

        let file = IndexFile {
            model: self.model.clone(),
            dims: self.dims,
            built_at: self.built_at,
            entries: self
                .entries
                .iter()
                .map(|e| StoredEntry {
                    chunk: e.chunk.clone(),
                    vector: e.vector.as_ref().map(|v| STANDARD.encode(vec_to_blob(v))),
                })
                .collect(),
        };

        let tmp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer(&mut writer, &file)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        let path = dir.join(INDEX_FILE);
        tmp.persist(&path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to write index: {}", path.display()))?;

        info!(path = %path.display(), chunks = self.entries.len(), "index saved");
        Ok(())
    }

    /// Read the index previously written to `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(INDEX_FILE);
        let raw = std::fs::read(&path).with_context(|| {
            format!(
                "Failed to read index {} (run `policyctx build` first)",
                path.display()
            )
        })?;
        let file: IndexFile = serde_json::from_slice(&raw)
            .with_context(|| format!("Failed to parse index: {}", path.display()))?;

        let mut entries = Vec::with_capacity(file.entries.len());
        for stored in file.entries {
            let vector = match stored.vector {
                Some(encoded) => Some(blob_to_vec(&STANDARD.decode(encoded).with_context(
                    || format!("Corrupt vector for chunk {}", stored.chunk.id),
                )?)),
                None => None,
            };
            entries.push(IndexEntry {
                chunk: stored.chunk,
                vector,
            });
        }

        Ok(Self {
            entries,
            model: file.model,
            dims: file.dims,
            built_at: file.built_at,
        })
    }

    /// Top `k` chunks for `question`, best first.
    pub async fn query(
        &self,
        question: &str,
        k: usize,
        provider: &dyn EmbeddingProvider,
    ) -> Result<Vec<ScoredChunk>> {
        if question.trim().is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        if self.has_vectors() {
            if provider.is_enabled() {
                return self.vector_search(question, k, provider).await;
            }
            warn!("index has embeddings but no provider is configured; using keyword scoring");
        }

        Ok(self.keyword_search(question, k))
    }

    async fn vector_search(
        &self,
        question: &str,
        k: usize,
        provider: &dyn EmbeddingProvider,
    ) -> Result<Vec<ScoredChunk>> {
        if let Some(model) = &self.model {
            if model != provider.model_name() {
                bail!(
                    "Index was built with embedding model '{}' but '{}' is configured. Rebuild the index.",
                    model,
                    provider.model_name()
                );
            }
        }

        let query_vec = provider
            .embed(&[question.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Embedding provider returned no vector"))?;

        let scored = self
            .entries
            .iter()
            .filter_map(|e| {
                e.vector.as_ref().map(|v| ScoredChunk {
                    chunk: e.chunk.clone(),
                    score: cosine_similarity(&query_vec, v),
                })
            })
            .collect();

        Ok(top_k(scored, k))
    }

    fn keyword_search(&self, question: &str, k: usize) -> Vec<ScoredChunk> {
        let terms = query_terms(question);
        if terms.is_empty() {
            return Vec::new();
        }

        let scored = self
            .entries
            .iter()
            .filter_map(|e| {
                let haystack = format!(
                    "{}\n{}",
                    e.chunk.metadata.policy_name, e.chunk.content
                )
                .to_lowercase();
                let matches = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
                (matches > 0).then(|| ScoredChunk {
                    chunk: e.chunk.clone(),
                    score: matches as f32 / terms.len() as f32,
                })
            })
            .collect();

        top_k(scored, k)
    }

    pub fn has_vectors(&self) -> bool {
        self.entries.iter().any(|e| e.vector.is_some())
    }

    pub fn chunks(&self) -> impl Iterator<Item = &DocumentChunk> {
        self.entries.iter().map(|e| &e.chunk)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }
}

/// Lowercased, punctuation-trimmed, deduplicated question terms.
fn query_terms(question: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for raw in question.split_whitespace() {
        let term = raw
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if !term.is_empty() && !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

fn top_k(mut scored: Vec<ScoredChunk>, k: usize) -> Vec<ScoredChunk> {
    // sort_by is stable: equal scores keep build order.
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(k);
    scored
}
