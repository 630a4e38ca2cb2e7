//! Question answering over the persisted index.
//!
//! [`QueryEngine`] is shared by the CLI (`policyctx ask`) and the HTTP
//! server (`POST /ask`). The two callers pass different review-date
//! formats, so each source's review note is evaluated per call.
//!
//! `policyctx ask --remote <url>` skips the local index and posts the
//! question to a running server instead. Transport failures are printed,
//! not returned, so the command still exits successfully.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::answer::{create_answerer, Answerer};
use crate::config::Config;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::index::{PolicyIndex, ScoredChunk};
use crate::models::MetadataRecord;
use crate::review::{evaluate_review_today, ReviewNote};

/// One source document behind an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    #[serde(flatten)]
    pub metadata: MetadataRecord,
    pub review: ReviewNote,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub sources: Vec<SourceDocument>,
}

pub struct QueryEngine {
    index: PolicyIndex,
    provider: Box<dyn EmbeddingProvider>,
    answerer: Box<dyn Answerer>,
    top_k: usize,
}

impl QueryEngine {
    pub fn new(
        index: PolicyIndex,
        provider: Box<dyn EmbeddingProvider>,
        answerer: Box<dyn Answerer>,
        top_k: usize,
    ) -> Self {
        Self {
            index,
            provider,
            answerer,
            top_k,
        }
    }

    /// Load the index and create the configured providers.
    pub fn from_config(config: &Config) -> Result<Self> {
        let index = PolicyIndex::load(&config.index.path)?;
        let provider = create_provider(&config.embedding)?;
        let answerer = create_answerer(&config.answer)?;
        Ok(Self::new(index, provider, answerer, config.index.top_k))
    }

    pub fn index(&self) -> &PolicyIndex {
        &self.index
    }

    /// Answer `question`, evaluating review dates with `review_format`.
    pub async fn ask(
        &self,
        question: &str,
        limit: Option<usize>,
        review_format: &str,
    ) -> Result<AskResponse> {
        let k = limit.unwrap_or(self.top_k);
        let passages = self.index.query(question, k, self.provider.as_ref()).await?;
        debug!(question, passages = passages.len(), "retrieved passages");

        let answer = self.answerer.answer(question, &passages).await?;
        Ok(AskResponse {
            answer,
            sources: sources_for(&passages, review_format),
        })
    }
}

/// One entry per source file, in rank order.
fn sources_for(passages: &[ScoredChunk], review_format: &str) -> Vec<SourceDocument> {
    let mut sources: Vec<SourceDocument> = Vec::new();
    for passage in passages {
        let metadata = &passage.chunk.metadata;
        if sources
            .iter()
            .any(|s| s.metadata.filename == metadata.filename)
        {
            continue;
        }
        sources.push(SourceDocument {
            metadata: metadata.clone(),
            review: evaluate_review_today(&metadata.review_due_date, review_format),
            score: passage.score,
        });
    }
    sources
}

/// Render an answer the way the CLI prints it.
pub fn format_response(response: &AskResponse) -> String {
    let mut out = String::new();
    out.push_str("Answer:\n");
    out.push_str(&response.answer);
    out.push('\n');
    if response.sources.is_empty() {
        return out;
    }
    out.push_str("\nSources:\n");
    for source in &response.sources {
        let meta = &source.metadata;
        out.push_str(&format!(
            "- {} | {} ({})\n  Effective: {}  Review due: {}\n",
            meta.policy_number,
            meta.policy_name,
            meta.filename,
            meta.effective_date,
            source.review
        ));
    }
    out
}

/// `policyctx ask`: answer from the local index.
pub async fn run_ask(config: &Config, question: &str, limit: Option<usize>) -> Result<()> {
    let engine = QueryEngine::from_config(config)?;
    let response = engine
        .ask(question, limit, &config.review.ask_format)
        .await?;
    print!("{}", format_response(&response));
    Ok(())
}

/// Post `question` to a running server and render the reply.
///
/// Never fails: transport errors and non-2xx replies become the returned text.
pub async fn ask_remote(base_url: &str, question: &str, timeout: Duration) -> String {
    let client = match reqwest::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => return format!("Error connecting to backend: {}", e),
    };

    let url = format!("{}/ask", base_url.trim_end_matches('/'));
    let response = match client
        .post(&url)
        .json(&serde_json::json!({ "question": question }))
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => return format!("Error connecting to backend: {}", e),
    };

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return format!("Server returned {}: {}", status.as_u16(), body);
    }

    match serde_json::from_str::<AskResponse>(&body) {
        Ok(parsed) => format_response(&parsed),
        Err(e) => format!("Error connecting to backend: unexpected response ({})", e),
    }
}

/// `policyctx ask --remote`: print whatever the server (or the failure) says.
pub async fn run_ask_remote(config: &Config, base_url: &str, question: &str) -> Result<()> {
    let timeout = Duration::from_secs(config.answer.timeout_secs);
    print!("{}", ask_remote(base_url, question, timeout).await);
    println!();
    Ok(())
}
