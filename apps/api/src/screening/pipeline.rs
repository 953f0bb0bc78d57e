//! Analysis pipeline: runs both Insight Engine stages for one document.
//!
//! Flow: Pending -> Parsing -> Parsed -> Scoring -> Scored, with ParseFailed and
//! ScoreFailed as the terminal failure states.
//!
//! Each stage gets its own attempt budget equal to the credential pool size.
//! Rate-limit class failures (including timeouts) rotate the key and retry;
//! anything else ends the stage immediately. Shortlisting is NOT decided here.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::credentials::{ConfigurationError, Credential, CredentialRotator};
use crate::insight::{AgentError, InsightEngine};
use crate::models::{InsightResult, JobRequirement, ParsedCandidate};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("Parse stage failed after {attempts} attempt(s): {last_error}")]
    ParseFailed {
        attempts: usize,
        last_error: AgentError,
    },

    #[error("Insight stage failed after {attempts} attempt(s): {last_error}")]
    InsightFailed {
        attempts: usize,
        last_error: AgentError,
    },

    #[error(transparent)]
    Unconfigured(#[from] ConfigurationError),
}

impl PipelineError {
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::ParseFailed { .. } => "ParseFailed",
            PipelineError::InsightFailed { .. } => "InsightFailed",
            PipelineError::Unconfigured(e) => e.kind(),
        }
    }
}

/// Per-document lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStage {
    Pending,
    Parsing,
    ParseFailed,
    Parsed,
    Scoring,
    ScoreFailed,
    Scored,
}

impl DocumentStage {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DocumentStage::ParseFailed | DocumentStage::ScoreFailed | DocumentStage::Scored
        )
    }

    pub fn can_advance_to(self, next: DocumentStage) -> bool {
        use DocumentStage::*;
        matches!(
            (self, next),
            (Pending, Parsing)
                | (Parsing, ParseFailed)
                | (Parsing, Parsed)
                | (Parsed, Scoring)
                | (Scoring, ScoreFailed)
                | (Scoring, Scored)
        )
    }
}

struct StageTracker<'a> {
    source_name: &'a str,
    stage: DocumentStage,
}

impl<'a> StageTracker<'a> {
    fn new(source_name: &'a str) -> Self {
        Self {
            source_name,
            stage: DocumentStage::Pending,
        }
    }

    fn advance(&mut self, next: DocumentStage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "illegal transition {:?} -> {:?}",
            self.stage,
            next
        );
        debug!(source = self.source_name, from = ?self.stage, to = ?next, "Document stage");
        self.stage = next;
        if next.is_terminal() {
            debug!(source = self.source_name, stage = ?next, "Document analysis finished");
        }
    }
}

/// Why a stage gave up.
struct StageFailure {
    attempts: usize,
    last_error: AgentError,
}

enum AttemptError {
    Stage(StageFailure),
    Unconfigured(ConfigurationError),
}

#[derive(Clone)]
pub struct AnalysisPipeline {
    engine: Arc<dyn InsightEngine>,
    rotator: Arc<CredentialRotator>,
    call_timeout: Duration,
}

impl AnalysisPipeline {
    pub fn new(
        engine: Arc<dyn InsightEngine>,
        rotator: Arc<CredentialRotator>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            rotator,
            call_timeout,
        }
    }

    pub fn rotator(&self) -> &CredentialRotator {
        &self.rotator
    }

    /// Parse then score. Returns the raw analysis for the caller to threshold.
    pub async fn analyze(
        &self,
        source_name: &str,
        text: &str,
        job: &JobRequirement,
    ) -> Result<(ParsedCandidate, InsightResult), PipelineError> {
        let mut tracker = StageTracker::new(source_name);
        let engine = self.engine.as_ref();

        tracker.advance(DocumentStage::Parsing);
        let candidate = match self
            .call_with_rotation("parse", |credential| async move {
                engine.parse(text, &credential).await
            })
            .await
        {
            Ok(candidate) => candidate,
            Err(AttemptError::Stage(failure)) => {
                tracker.advance(DocumentStage::ParseFailed);
                return Err(PipelineError::ParseFailed {
                    attempts: failure.attempts,
                    last_error: failure.last_error,
                });
            }
            Err(AttemptError::Unconfigured(e)) => return Err(e.into()),
        };
        tracker.advance(DocumentStage::Parsed);
        info!(
            "Parsed candidate from {}: {} ({} skills)",
            source_name,
            candidate.name,
            candidate.skills.len()
        );

        tracker.advance(DocumentStage::Scoring);
        let parsed = &candidate;
        let insight = match self
            .call_with_rotation("score", |credential| async move {
                engine.score(parsed, job, &credential).await
            })
            .await
        {
            Ok(insight) => insight,
            Err(AttemptError::Stage(failure)) => {
                tracker.advance(DocumentStage::ScoreFailed);
                warn!(
                    "Discarding parsed candidate {} from {}: scoring failed",
                    candidate.name, source_name
                );
                return Err(PipelineError::InsightFailed {
                    attempts: failure.attempts,
                    last_error: failure.last_error,
                });
            }
            Err(AttemptError::Unconfigured(e)) => return Err(e.into()),
        };
        tracker.advance(DocumentStage::Scored);

        Ok((candidate, insight))
    }

    /// Bounded rotate-and-retry around one external call.
    /// Budget is the pool size, so each credential is tried at most once.
    async fn call_with_rotation<T, F, Fut>(
        &self,
        stage: &'static str,
        mut call: F,
    ) -> Result<T, AttemptError>
    where
        F: FnMut(Credential) -> Fut,
        Fut: Future<Output = Result<T, AgentError>>,
    {
        let budget = self.rotator.total();
        let mut tried = vec![false; budget];
        let mut last_error = None;

        for attempt in 1..=budget {
            let index = self.next_untried(&tried);
            tried[index] = true;
            let credential = self
                .rotator
                .credential_at(index)
                .ok_or(AttemptError::Unconfigured(ConfigurationError::NoCredentials))?;
            let ordinal = credential.ordinal();

            let outcome = match tokio::time::timeout(self.call_timeout, call(credential)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(AgentError::RateLimited(format!(
                    "{stage} call timed out after {}s",
                    self.call_timeout.as_secs_f32()
                ))),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    warn!(
                        "{} call failed with key #{} (attempt {}/{}): {}",
                        stage, ordinal, attempt, budget, e
                    );
                    last_error = Some(e);
                    self.rotator
                        .rotate_from(index)
                        .map_err(AttemptError::Unconfigured)?;
                }
                Err(e) => {
                    warn!("{} call failed with key #{}: {}", stage, ordinal, e);
                    return Err(AttemptError::Stage(StageFailure {
                        attempts: attempt,
                        last_error: e,
                    }));
                }
            }
        }

        match last_error {
            Some(last_error) => Err(AttemptError::Stage(StageFailure {
                attempts: budget,
                last_error,
            })),
            None => Err(AttemptError::Unconfigured(ConfigurationError::NoCredentials)),
        }
    }

    /// First credential this stage has not used yet, starting at the shared
    /// current index. Other documents may have moved that index meanwhile.
    fn next_untried(&self, tried: &[bool]) -> usize {
        let total = tried.len();
        let start = self.rotator.current_index();
        (0..total)
            .map(|offset| (start + offset) % total)
            .find(|&i| !tried[i])
            .unwrap_or(start % total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insight::testing::{candidate, insight, job, ScriptedEngine};

    fn rate_limited() -> AgentError {
        AgentError::RateLimited("429 Too Many Requests".to_string())
    }

    fn setup(
        keys: usize,
        engine: ScriptedEngine,
    ) -> (AnalysisPipeline, Arc<ScriptedEngine>, Arc<CredentialRotator>) {
        let engine = Arc::new(engine);
        let rotator = Arc::new(CredentialRotator::new(
            (1..=keys).map(|i| format!("key-{i}")).collect(),
        ));
        let pipeline = AnalysisPipeline::new(engine.clone(), rotator.clone(), Duration::from_secs(5));
        (pipeline, engine, rotator)
    }

    #[tokio::test]
    async fn test_rotates_past_rate_limited_keys() {
        let engine = ScriptedEngine::new(80).with_parse_results(vec![
            Err(rate_limited()),
            Err(rate_limited()),
            Ok(candidate("Ada")),
        ]);
        let (pipeline, engine, rotator) = setup(3, engine);

        let (parsed, scored) = pipeline.analyze("cv.pdf", "Ada", &job()).await.unwrap();

        assert_eq!(parsed.name, "Ada");
        assert_eq!(scored.confidence_score, 80);
        assert_eq!(engine.parse_ordinals(), vec![1, 2, 3]);
        assert_eq!(rotator.current_index(), 2);
        assert_eq!(engine.score_ordinals(), vec![3]);
    }

    #[tokio::test]
    async fn test_parse_exhausts_budget_once_per_key() {
        let engine = ScriptedEngine::new(80).with_parse_results(vec![
            Err(rate_limited()),
            Err(AgentError::Transient("502".to_string())),
            Err(rate_limited()),
            Ok(candidate("never used")),
        ]);
        let (pipeline, engine, _) = setup(3, engine);

        let err = pipeline.analyze("cv.pdf", "text", &job()).await.unwrap_err();

        assert_eq!(err.kind(), "ParseFailed");
        assert!(matches!(err, PipelineError::ParseFailed { attempts: 3, .. }));
        assert_eq!(engine.parse_ordinals(), vec![1, 2, 3]);
        assert!(engine.score_ordinals().is_empty());
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let engine = ScriptedEngine::new(80)
            .with_parse_results(vec![Err(AgentError::Fatal("invalid JSON".to_string()))]);
        let (pipeline, engine, rotator) = setup(3, engine);

        let err = pipeline.analyze("cv.pdf", "text", &job()).await.unwrap_err();

        assert!(matches!(err, PipelineError::ParseFailed { attempts: 1, .. }));
        assert_eq!(engine.parse_ordinals(), vec![1]);
        assert_eq!(rotator.current_index(), 0);
    }

    #[tokio::test]
    async fn test_scoring_gets_a_fresh_budget() {
        let engine = ScriptedEngine::new(80)
            .with_parse_results(vec![Err(rate_limited()), Ok(candidate("Ada"))])
            .with_score_results(vec![Err(rate_limited()), Err(rate_limited()), Ok(insight(91))]);
        let (pipeline, engine, rotator) = setup(3, engine);

        let (_, scored) = pipeline.analyze("cv.pdf", "Ada", &job()).await.unwrap();

        assert_eq!(scored.confidence_score, 91);
        assert_eq!(engine.parse_ordinals(), vec![1, 2]);
        assert_eq!(engine.score_ordinals(), vec![2, 3, 1]);
        assert_eq!(rotator.current_index(), 0);
    }

    #[tokio::test]
    async fn test_score_failure_is_insight_failed() {
        let engine = ScriptedEngine::new(80)
            .with_score_results(vec![Err(AgentError::Fatal("unparseable".to_string()))]);
        let (pipeline, _, _) = setup(2, engine);

        let err = pipeline.analyze("cv.pdf", "Ada", &job()).await.unwrap_err();
        assert_eq!(err.kind(), "InsightFailed");
    }

    #[tokio::test]
    async fn test_single_key_gets_exactly_one_attempt() {
        let engine = ScriptedEngine::new(80).with_parse_results(vec![Err(rate_limited())]);
        let (pipeline, engine, _) = setup(1, engine);

        let err = pipeline.analyze("cv.pdf", "text", &job()).await.unwrap_err();
        assert!(matches!(err, PipelineError::ParseFailed { attempts: 1, .. }));
        assert_eq!(engine.parse_ordinals(), vec![1]);
    }

    #[tokio::test]
    async fn test_empty_pool_is_unconfigured() {
        let (pipeline, engine, _) = setup(0, ScriptedEngine::new(80));

        let err = pipeline.analyze("cv.pdf", "text", &job()).await.unwrap_err();
        assert_eq!(err, PipelineError::Unconfigured(ConfigurationError::NoCredentials));
        assert!(engine.parse_ordinals().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_rate_limited() {
        let engine = ScriptedEngine::new(80).with_parse_delay(Duration::from_secs(30));
        let (pipeline, engine, rotator) = setup(2, engine);

        let err = pipeline.analyze("cv.pdf", "text", &job()).await.unwrap_err();

        match err {
            PipelineError::ParseFailed { attempts, last_error } => {
                assert_eq!(attempts, 2);
                assert_eq!(last_error.kind(), "RateLimited");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(engine.parse_ordinals(), vec![1, 2]);
        assert_eq!(rotator.current_index(), 0);
    }

    /// Key #1 is rate limited, but only once both documents have reached it.
    struct SharedLimitEngine {
        both_on_first_key: tokio::sync::Barrier,
        parse_calls: std::sync::Mutex<Vec<(String, usize)>>,
    }

    #[async_trait::async_trait]
    impl InsightEngine for SharedLimitEngine {
        async fn parse(
            &self,
            text: &str,
            credential: &Credential,
        ) -> Result<ParsedCandidate, AgentError> {
            self.parse_calls
                .lock()
                .unwrap()
                .push((text.to_string(), credential.ordinal()));
            if credential.ordinal() == 1 {
                self.both_on_first_key.wait().await;
                return Err(rate_limited());
            }
            Ok(candidate(text))
        }

        async fn score(
            &self,
            _candidate: &ParsedCandidate,
            _job: &JobRequirement,
            _credential: &Credential,
        ) -> Result<InsightResult, AgentError> {
            Ok(insight(75))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_failures_on_one_key_rotate_once() {
        let engine = Arc::new(SharedLimitEngine {
            both_on_first_key: tokio::sync::Barrier::new(2),
            parse_calls: std::sync::Mutex::new(Vec::new()),
        });
        let rotator = Arc::new(CredentialRotator::new(vec!["key-1".into(), "key-2".into()]));
        let pipeline = AnalysisPipeline::new(engine.clone(), rotator.clone(), Duration::from_secs(5));
        let job = job();

        let (first, second) = tokio::join!(
            pipeline.analyze("a.pdf", "Ada", &job),
            pipeline.analyze("b.pdf", "Grace", &job),
        );

        assert!(first.is_ok(), "{first:?}");
        assert!(second.is_ok(), "{second:?}");
        let calls = engine.parse_calls.lock().unwrap().clone();
        for name in ["Ada", "Grace"] {
            let ordinals: Vec<usize> = calls
                .iter()
                .filter(|(text, _)| text == name)
                .map(|(_, ordinal)| *ordinal)
                .collect();
            assert_eq!(ordinals, vec![1, 2], "{name}");
        }
        assert_eq!(rotator.current_index(), 1);
    }

    #[test]
    fn test_stage_transitions() {
        use DocumentStage::*;
        assert!(Pending.can_advance_to(Parsing));
        assert!(Parsing.can_advance_to(ParseFailed));
        assert!(Scoring.can_advance_to(Scored));
        assert!(!Pending.can_advance_to(Scoring));
        assert!(!Scored.can_advance_to(Parsing));
        assert!(ParseFailed.is_terminal() && ScoreFailed.is_terminal() && Scored.is_terminal());
        assert!(!Parsed.is_terminal());
    }
}
