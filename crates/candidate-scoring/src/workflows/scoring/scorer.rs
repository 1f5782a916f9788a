use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::context::ScoringContext;
use super::domain::{InvalidScorerOutput, ScorerOutput, TokenUsage};
use super::prompt::{build_user_prompt, SYSTEM_INSTRUCTION};
use crate::config::ScorerConfig;

/// Structured-output generation request handed to the model client.
#[derive(Debug, Clone, PartialEq)]
pub struct ScorerRequest {
    pub model: String,
    pub system_instruction: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub response_schema: serde_json::Value,
}

/// Raw model reply before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScorerResponse {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

/// Generative model backend.
#[async_trait]
pub trait ScorerClient: Send + Sync {
    async fn generate(&self, request: ScorerRequest) -> Result<ScorerResponse, ScorerError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ScorerError {
    #[error("scorer is not configured: {0}")]
    Configuration(String),
    #[error("scorer transport failure: {0}")]
    Transport(String),
    #[error("scorer timed out after {0:?}")]
    Timeout(Duration),
    #[error("scorer rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("scorer returned an invalid response: {0}")]
    InvalidResponse(String),
}

impl From<InvalidScorerOutput> for ScorerError {
    fn from(value: InvalidScorerOutput) -> Self {
        Self::InvalidResponse(value.to_string())
    }
}

/// JSON schema the model must answer with.
pub fn response_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "score": { "type": "INTEGER", "minimum": 0, "maximum": 100 },
            "reasoning": { "type": "STRING" }
        },
        "required": ["score", "reasoning"]
    })
}

#[derive(Debug, Deserialize)]
struct RawScorerOutput {
    score: i64,
    reasoning: String,
}

/// Parse and validate model text; never clamps or defaults.
pub fn parse_scorer_output(text: &str) -> Result<ScorerOutput, ScorerError> {
    let raw: RawScorerOutput = serde_json::from_str(text.trim())
        .map_err(|err| ScorerError::InvalidResponse(format!("malformed JSON: {err}")))?;
    Ok(ScorerOutput::new(raw.score, raw.reasoning)?)
}

/// One validated model verdict with its cost.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreAssessment {
    pub output: ScorerOutput,
    pub usage: TokenUsage,
    pub latency_ms: u64,
    pub model: String,
}

/// Builds the prompt, calls the client, and validates what comes back.
pub struct ScorerAdapter<S> {
    client: Arc<S>,
    config: ScorerConfig,
}

impl<S> ScorerAdapter<S>
where
    S: ScorerClient + 'static,
{
    pub fn new(client: Arc<S>, config: ScorerConfig) -> Self {
        Self { client, config }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn request_for(&self, context: &ScoringContext) -> ScorerRequest {
        ScorerRequest {
            model: self.config.model.clone(),
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            prompt: build_user_prompt(&context.candidate, &context.vacancy),
            temperature: self.config.temperature,
            max_output_tokens: self.config.max_output_tokens,
            response_schema: response_schema(),
        }
    }

    pub async fn assess(&self, context: &ScoringContext) -> Result<ScoreAssessment, ScorerError> {
        let request = self.request_for(context);

        let started = Instant::now();
        let response = self.client.generate(request).await?;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let output = parse_scorer_output(&response.text)?;
        let usage = response.usage.unwrap_or_default();

        info!(
            model = %self.config.model,
            score = output.score.value(),
            latency_ms,
            total_tokens = usage.total_tokens,
            "model scoring complete"
        );

        Ok(ScoreAssessment {
            output,
            usage,
            latency_ms,
            model: self.config.model.clone(),
        })
    }
}
