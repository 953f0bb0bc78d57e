//! Insight Engine: the external collaborator behind both screening stages.
//!
//! `InsightEngine` is the seam: the pipeline only knows the trait, the
//! production implementation (`LlmInsightEngine`) talks to the hosted LLM.

pub mod prompts;
#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::credentials::Credential;
use crate::insight::prompts::{
    PARSE_PROMPT_TEMPLATE, PARSE_SYSTEM, SCORE_PROMPT_TEMPLATE, SCORE_SYSTEM,
};
use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, JSON_ONLY_SYSTEM};
use crate::llm_client::{LlmClient, LlmError};
use crate::models::{InsightResult, JobRequirement, ParsedCandidate};

/// Resume text beyond this many characters is cut before prompting.
const MAX_RESUME_CHARS: usize = 12_000;

/// Failure of a single external call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Fatal failure: {0}")]
    Fatal(String),
}

impl AgentError {
    /// Rate-limit class: rotate the credential and try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AgentError::RateLimited(_) | AgentError::Transient(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::RateLimited(_) => "RateLimited",
            AgentError::Transient(_) => "Transient",
            AgentError::Fatal(_) => "Fatal",
        }
    }
}

impl From<LlmError> for AgentError {
    fn from(e: LlmError) -> Self {
        if e.is_rate_limited() {
            AgentError::RateLimited(e.to_string())
        } else if e.is_transient() {
            AgentError::Transient(e.to_string())
        } else {
            AgentError::Fatal(e.to_string())
        }
    }
}

/// Two pure request/response operations, authenticated with the given credential.
#[async_trait]
pub trait InsightEngine: Send + Sync {
    async fn parse(&self, text: &str, credential: &Credential)
        -> Result<ParsedCandidate, AgentError>;

    async fn score(
        &self,
        candidate: &ParsedCandidate,
        job: &JobRequirement,
        credential: &Credential,
    ) -> Result<InsightResult, AgentError>;
}

/// Production engine backed by the chat-completions API.
pub struct LlmInsightEngine {
    llm: LlmClient,
}

impl LlmInsightEngine {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl InsightEngine for LlmInsightEngine {
    async fn parse(
        &self,
        text: &str,
        credential: &Credential,
    ) -> Result<ParsedCandidate, AgentError> {
        let prompt = PARSE_PROMPT_TEMPLATE.replace("{resume_text}", truncate_chars(text, MAX_RESUME_CHARS));
        let system = format!("{PARSE_SYSTEM} {GROUNDING_INSTRUCTION} {JSON_ONLY_SYSTEM}");

        let wire: ParsedCandidateWire = self
            .llm
            .call_json(&prompt, &system, credential.expose())
            .await?;
        Ok(wire.into())
    }

    async fn score(
        &self,
        candidate: &ParsedCandidate,
        job: &JobRequirement,
        credential: &Credential,
    ) -> Result<InsightResult, AgentError> {
        let candidate_json = serde_json::to_string_pretty(candidate)
            .map_err(|e| AgentError::Fatal(format!("Failed to serialize candidate: {e}")))?;

        let prompt = SCORE_PROMPT_TEMPLATE
            .replace("{job_title}", &job.job_title)
            .replace("{required_skills}", &job.required_skills.join(", "))
            .replace("{experience_range}", &job.experience_range())
            .replace("{mandatory_skills}", &job.mandatory_skills.join(", "))
            .replace("{candidate_json}", &candidate_json);
        let system = format!("{SCORE_SYSTEM} {JSON_ONLY_SYSTEM}");

        let wire: InsightResultWire = self
            .llm
            .call_json(&prompt, &system, credential.expose())
            .await?;
        Ok(wire.into())
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Wire shapes, lenient about what the model actually returns
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ParsedCandidateWire {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    experience_years: f64,
    #[serde(default)]
    skills: Vec<String>,
}

impl From<ParsedCandidateWire> for ParsedCandidate {
    fn from(wire: ParsedCandidateWire) -> Self {
        let name = non_blank(wire.name).unwrap_or_else(|| "Unknown".to_string());
        let phone = non_blank(wire.phone).filter(|p| !p.eq_ignore_ascii_case("n/a"));
        let experience_years = if wire.experience_years.is_finite() {
            wire.experience_years.max(0.0) as f32
        } else {
            0.0
        };

        ParsedCandidate {
            name,
            email: non_blank(wire.email).unwrap_or_default(),
            phone,
            experience_years,
            skills: wire
                .skills
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct InsightResultWire {
    #[serde(default, deserialize_with = "lenient_number")]
    confidence_score: f64,
    #[serde(default)]
    key_strengths: Vec<String>,
    #[serde(default)]
    gaps: Vec<String>,
    #[serde(default)]
    recommendation: Option<String>,
}

impl From<InsightResultWire> for InsightResult {
    fn from(wire: InsightResultWire) -> Self {
        InsightResult {
            confidence_score: clamp_score(wire.confidence_score),
            key_strengths: wire.key_strengths,
            gaps: wire.gaps,
            recommendation: non_blank(wire.recommendation).unwrap_or_else(|| "N/A".to_string()),
        }
    }
}

fn clamp_score(raw: f64) -> u8 {
    if raw.is_finite() {
        raw.round().clamp(0.0, 100.0) as u8
    } else {
        0
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Accepts `4`, `4.5`, `"4.5"`, `"5+"` or `null`.
fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => {
            let numeric: String = s
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            numeric.parse().unwrap_or(0.0)
        }
        _ => 0.0,
    })
}
