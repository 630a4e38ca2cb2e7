//! Answer generation over retrieved chunks.
//!
//! The index only returns passages. An [`Answerer`] turns the question and
//! those passages into the text shown to the user:
//!
//! - **[`ExtractiveAnswerer`]** (default): returns the best passage verbatim.
//!   Needs no network access.
//! - **[`OpenAIAnswerer`]**: sends every passage plus the question to a chat
//!   completion model in a single prompt.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::AnswerConfig;
use crate::embedding::post_json_with_retry;
use crate::index::ScoredChunk;

const OPENAI_URL: &str = "https://api.openai.com";

/// Returned when retrieval finds nothing.
pub const NO_ANSWER: &str = "I could not find anything about that in the indexed policies.";

const SYSTEM_PROMPT: &str = "You answer questions about clinical policy documents. \
Use only the policy excerpts provided. If the excerpts do not contain the answer, say so. \
Cite the policy name when you use it.";

#[async_trait]
pub trait Answerer: Send + Sync {
    async fn answer(&self, question: &str, passages: &[ScoredChunk]) -> Result<String>;
}

pub struct ExtractiveAnswerer;

#[async_trait]
impl Answerer for ExtractiveAnswerer {
    async fn answer(&self, _question: &str, passages: &[ScoredChunk]) -> Result<String> {
        Ok(passages
            .first()
            .map(|p| p.chunk.content.trim().to_string())
            .unwrap_or_else(|| NO_ANSWER.to_string()))
    }
}

/// Chat-completion answerer. Requires `OPENAI_API_KEY`.
pub struct OpenAIAnswerer {
    model: String,
    url: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIAnswerer {
    pub fn new(config: &AnswerConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &AnswerConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            model: config.model.clone(),
            url: config.url.clone().unwrap_or_else(|| OPENAI_URL.to_string()),
            api_key,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl Answerer for OpenAIAnswerer {
    async fn answer(&self, question: &str, passages: &[ScoredChunk]) -> Result<String> {
        if passages.is_empty() {
            return Ok(NO_ANSWER.to_string());
        }

        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": build_prompt(question, passages)},
            ],
        });

        let json = post_json_with_retry(
            &self.client,
            &format!("{}/v1/chat/completions", self.url),
            Some(&self.api_key),
            &body,
            self.max_retries,
            "OpenAI",
        )
        .await?;

        json.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(|c| c.trim().to_string())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))
    }
}

/// All passages, labeled with their policy, followed by the question.
fn build_prompt(question: &str, passages: &[ScoredChunk]) -> String {
    let mut prompt = String::new();
    for (i, passage) in passages.iter().enumerate() {
        let meta = &passage.chunk.metadata;
        prompt.push_str(&format!(
            "[{}] {} | {} ({})\n{}\n\n",
            i + 1,
            meta.policy_number,
            meta.policy_name,
            passage.chunk.source_filename,
            passage.chunk.content.trim()
        ));
    }
    prompt.push_str("Question: ");
    prompt.push_str(question.trim());
    prompt
}

/// | Config Value | Answerer |
/// |-------------|----------|
/// | `"extractive"` | [`ExtractiveAnswerer`] |
/// | `"openai"` | [`OpenAIAnswerer`] |
pub fn create_answerer(config: &AnswerConfig) -> Result<Box<dyn Answerer>> {
    match config.provider.as_str() {
        "extractive" => Ok(Box::new(ExtractiveAnswerer)),
        "openai" => Ok(Box::new(OpenAIAnswerer::new(config)?)),
        other => bail!("Unknown answer provider: {}", other),
    }
}
