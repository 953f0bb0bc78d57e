//! Scripted `InsightEngine` for tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{AgentError, InsightEngine};
use crate::credentials::Credential;
use crate::models::{InsightResult, JobRequirement, ParsedCandidate};

/// Pops scripted outcomes per stage; once a script runs dry, answers with a
/// candidate named after the first line of the text and `default_score`.
/// Records the credential ordinal used for every call.
pub struct ScriptedEngine {
    parse_script: Mutex<VecDeque<Result<ParsedCandidate, AgentError>>>,
    score_script: Mutex<VecDeque<Result<InsightResult, AgentError>>>,
    parse_calls: Mutex<Vec<usize>>,
    score_calls: Mutex<Vec<usize>>,
    default_score: u8,
    parse_delay: Option<Duration>,
}

impl ScriptedEngine {
    pub fn new(default_score: u8) -> Self {
        Self {
            parse_script: Mutex::new(VecDeque::new()),
            score_script: Mutex::new(VecDeque::new()),
            parse_calls: Mutex::new(Vec::new()),
            score_calls: Mutex::new(Vec::new()),
            default_score,
            parse_delay: None,
        }
    }

    pub fn with_parse_results(self, results: Vec<Result<ParsedCandidate, AgentError>>) -> Self {
        *self.parse_script.lock().unwrap() = results.into();
        self
    }

    pub fn with_score_results(self, results: Vec<Result<InsightResult, AgentError>>) -> Self {
        *self.score_script.lock().unwrap() = results.into();
        self
    }

    /// Every parse call sleeps this long before answering.
    pub fn with_parse_delay(mut self, delay: Duration) -> Self {
        self.parse_delay = Some(delay);
        self
    }

    pub fn parse_ordinals(&self) -> Vec<usize> {
        self.parse_calls.lock().unwrap().clone()
    }

    pub fn score_ordinals(&self) -> Vec<usize> {
        self.score_calls.lock().unwrap().clone()
    }
}

pub fn candidate(name: &str) -> ParsedCandidate {
    ParsedCandidate {
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        phone: None,
        experience_years: 3.0,
        skills: vec!["Python".to_string(), "Django".to_string()],
    }
}

pub fn insight(score: u8) -> InsightResult {
    InsightResult {
        confidence_score: score,
        key_strengths: vec!["Solid Python background".to_string()],
        gaps: vec!["No Kubernetes".to_string()],
        recommendation: "Proceed to interview".to_string(),
    }
}

pub fn job() -> JobRequirement {
    JobRequirement {
        job_title: "Senior Python Developer".to_string(),
        required_skills: vec!["Python".to_string(), "Django".to_string(), "AWS".to_string()],
        min_experience: 0,
        max_experience: 3,
        mandatory_skills: vec!["Docker".to_string()],
    }
}

#[async_trait]
impl InsightEngine for ScriptedEngine {
    async fn parse(
        &self,
        text: &str,
        credential: &Credential,
    ) -> Result<ParsedCandidate, AgentError> {
        self.parse_calls.lock().unwrap().push(credential.ordinal());
        if let Some(delay) = self.parse_delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.parse_script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(candidate(text.lines().next().unwrap_or("Unknown").trim())))
    }

    async fn score(
        &self,
        _candidate: &ParsedCandidate,
        _job: &JobRequirement,
        credential: &Credential,
    ) -> Result<InsightResult, AgentError> {
        self.score_calls.lock().unwrap().push(credential.ordinal());
        let scripted = self.score_script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(insight(self.default_score)))
    }
}
