use bytes::Bytes;
use serde::Serialize;

/// One uploaded document awaiting screening.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub filename: String,
    pub media_type: String,
    pub bytes: Bytes,
}

impl SourceDocument {
    pub fn new(
        filename: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            filename: filename.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }
}

/// Why a single document did not yield a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub source_name: String,
    /// Error kind code, e.g. `EmptyContent` or `ParseFailed`.
    pub reason: String,
    pub message: String,
}

/// Outcome counts for one batch run.
/// Invariant: `successful + failed == total`, failures in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub successful: usize,
    pub failed: usize,
    pub total: usize,
    pub shortlisted: usize,
    /// Mean confidence score of successful records, one decimal place.
    /// `None` until the first success.
    pub average_score: Option<f64>,
    pub failures: Vec<BatchFailure>,
    #[serde(skip)]
    score_sum: u64,
}

impl BatchSummary {
    pub fn new(total: usize) -> Self {
        Self {
            successful: 0,
            failed: 0,
            total,
            shortlisted: 0,
            average_score: None,
            failures: Vec::new(),
            score_sum: 0,
        }
    }

    pub fn record_success(&mut self, confidence_score: u8, shortlisted: bool) {
        self.successful += 1;
        if shortlisted {
            self.shortlisted += 1;
        }
        self.score_sum += u64::from(confidence_score);
        let mean = self.score_sum as f64 / self.successful as f64;
        self.average_score = Some((mean * 10.0).round() / 10.0);
    }

    pub fn record_failure(
        &mut self,
        source_name: impl Into<String>,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.failed += 1;
        self.failures.push(BatchFailure {
            source_name: source_name.into(),
            reason: reason.into(),
            message: message.into(),
        });
    }

    pub fn is_complete(&self) -> bool {
        self.successful + self.failed == self.total
    }

    /// `(source_name, reason)` pairs in input order.
    pub fn failure_reasons(&self) -> Vec<(&str, &str)> {
        self.failures
            .iter()
            .map(|f| (f.source_name.as_str(), f.reason.as_str()))
            .collect()
    }
}

/// Emitted after every document, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
    pub source_name: String,
}

impl BatchProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_stay_consistent() {
        let mut summary = BatchSummary::new(3);
        summary.record_success(80, true);
        summary.record_failure("doc2", "EmptyContent", "No extractable text");
        assert!(!summary.is_complete());
        summary.record_success(55, false);

        assert!(summary.is_complete());
        assert_eq!(summary.failure_reasons(), vec![("doc2", "EmptyContent")]);
    }

    #[test]
    fn test_summary_statistics_cover_successes_only() {
        let mut summary = BatchSummary::new(4);
        assert_eq!(summary.average_score, None);

        summary.record_success(90, true);
        summary.record_success(71, true);
        summary.record_success(40, false);
        summary.record_failure("broken.pdf", "CorruptFile", "bad xref");

        assert_eq!(summary.shortlisted, 2);
        // (90 + 71 + 40) / 3 = 67.0
        assert_eq!(summary.average_score, Some(67.0));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["shortlisted"], 2);
        assert_eq!(json["average_score"], 67.0);
        assert!(json.get("score_sum").is_none());
    }

    #[test]
    fn test_average_score_rounds_to_one_decimal() {
        let mut summary = BatchSummary::new(3);
        summary.record_success(70, true);
        summary.record_success(71, true);
        assert_eq!(summary.average_score, Some(70.5));

        summary.record_success(71, true);
        // 212 / 3 = 70.666..
        assert_eq!(summary.average_score, Some(70.7));
    }

    #[test]
    fn test_progress_fraction() {
        let progress = BatchProgress {
            completed: 1,
            total: 4,
            source_name: "a.pdf".to_string(),
        };
        assert!((progress.fraction() - 0.25).abs() < f64::EPSILON);
    }
}
