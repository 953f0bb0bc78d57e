use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Structured fields the parse stage pulls out of a resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedCandidate {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    /// Never negative.
    pub experience_years: f32,
    pub skills: Vec<String>,
}

/// Requirement-fit verdict produced by the scoring stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightResult {
    /// 0 – 100 inclusive.
    pub confidence_score: u8,
    pub key_strengths: Vec<String>,
    pub gaps: Vec<String>,
    pub recommendation: String,
}

/// One fully analyzed document. Only built when both stages succeed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateRecord {
    #[serde(flatten)]
    pub candidate: ParsedCandidate,
    #[serde(flatten)]
    pub insight: InsightResult,
    pub shortlisted: bool,
    pub source_name: String,
    pub analyzed_at: DateTime<Utc>,
}

impl CandidateRecord {
    pub fn new(
        candidate: ParsedCandidate,
        insight: InsightResult,
        source_name: impl Into<String>,
        threshold: u8,
    ) -> Self {
        let shortlisted = is_shortlisted(insight.confidence_score, threshold);
        Self {
            candidate,
            insight,
            shortlisted,
            source_name: source_name.into(),
            analyzed_at: Utc::now(),
        }
    }

    /// Re-evaluates the same analysis against another threshold.
    /// Returns a new record; the analysis timestamp is preserved.
    pub fn with_threshold(&self, threshold: u8) -> Self {
        Self {
            shortlisted: is_shortlisted(self.insight.confidence_score, threshold),
            ..self.clone()
        }
    }
}

pub fn is_shortlisted(score: u8, threshold: u8) -> bool {
    score >= threshold
}
