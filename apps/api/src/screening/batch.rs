//! Batch runner: screens documents one at a time, in input order.
//!
//! A failing document never aborts the batch: its error becomes a failure
//! entry and the runner moves on. Only a missing credential pool stops the
//! run, and that is checked before the first document is touched.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::credentials::ConfigurationError;
use crate::extraction::{ExtractionError, TextExtractor};
use crate::models::{
    BatchProgress, BatchSummary, CandidateRecord, JobRequirement, SourceDocument,
};
use crate::screening::pipeline::{AnalysisPipeline, PipelineError};

const CANCELLED: &str = "Cancelled";

/// Cooperative cancellation, observed only between documents.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Records in input order plus the run summary.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub batch_id: Uuid,
    pub records: Vec<CandidateRecord>,
    pub summary: BatchSummary,
}

#[derive(Debug, Error)]
enum ItemError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl ItemError {
    fn kind(&self) -> &'static str {
        match self {
            ItemError::Extraction(e) => e.kind(),
            ItemError::Pipeline(e) => e.kind(),
        }
    }
}

pub struct BatchRunner {
    extractor: Arc<TextExtractor>,
    pipeline: AnalysisPipeline,
    cancel: CancelFlag,
}

impl BatchRunner {
    pub fn new(extractor: Arc<TextExtractor>, pipeline: AnalysisPipeline) -> Self {
        Self {
            extractor,
            pipeline,
            cancel: CancelFlag::default(),
        }
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn run(
        &self,
        documents: Vec<SourceDocument>,
        job: &JobRequirement,
        threshold: u8,
    ) -> Result<BatchOutcome, ConfigurationError> {
        self.run_with_progress(documents, job, threshold, |_| {}).await
    }

    /// Screens every document, calling `on_progress` once per document.
    pub async fn run_with_progress<P>(
        &self,
        documents: Vec<SourceDocument>,
        job: &JobRequirement,
        threshold: u8,
        mut on_progress: P,
    ) -> Result<BatchOutcome, ConfigurationError>
    where
        P: FnMut(BatchProgress) + Send,
    {
        self.pipeline.rotator().ensure_configured()?;

        let batch_id = Uuid::new_v4();
        let threshold = threshold.min(100);
        let total = documents.len();
        let mut records = Vec::with_capacity(total);
        let mut summary = BatchSummary::new(total);

        info!(
            %batch_id,
            total,
            threshold,
            job_title = %job.job_title,
            "Starting screening batch"
        );

        for (idx, document) in documents.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                summary.record_failure(
                    &document.filename,
                    CANCELLED,
                    "batch cancelled before this document was processed",
                );
            } else {
                info!("Processing {}/{}: {}", idx + 1, total, document.filename);

                match self.screen_one(&document, job, threshold).await {
                    Ok(record) => {
                        info!(
                            "{} - analysis complete (score {}, shortlisted: {})",
                            document.filename, record.insight.confidence_score, record.shortlisted
                        );
                        summary.record_success(
                            record.insight.confidence_score,
                            record.shortlisted,
                        );
                        records.push(record);
                    }
                    Err(ItemError::Pipeline(PipelineError::Unconfigured(e))) => return Err(e),
                    Err(e) => {
                        warn!("{}: {}", document.filename, e);
                        summary.record_failure(&document.filename, e.kind(), e.to_string());
                    }
                }
            }

            on_progress(BatchProgress {
                completed: idx + 1,
                total,
                source_name: document.filename,
            });
        }

        debug_assert!(summary.is_complete());
        info!(
            %batch_id,
            shortlisted = summary.shortlisted,
            average_score = ?summary.average_score,
            "Screening batch complete: {} successful, {} failed",
            summary.successful,
            summary.failed
        );

        Ok(BatchOutcome {
            batch_id,
            records,
            summary,
        })
    }

    async fn screen_one(
        &self,
        document: &SourceDocument,
        job: &JobRequirement,
        threshold: u8,
    ) -> Result<CandidateRecord, ItemError> {
        let text = self.extract(document).await?;
        info!(
            "Extracted {} characters from {}",
            text.chars().count(),
            document.filename
        );

        let (candidate, insight) = self
            .pipeline
            .analyze(&document.filename, &text, job)
            .await?;

        Ok(CandidateRecord::new(
            candidate,
            insight,
            document.filename.clone(),
            threshold,
        ))
    }

    /// PDF and DOCX decoding is CPU-bound; keep it off the async workers.
    async fn extract(&self, document: &SourceDocument) -> Result<String, ExtractionError> {
        let extractor = self.extractor.clone();
        let bytes = document.bytes.clone();
        let media_type = document.media_type.clone();
        let filename = document.filename.clone();

        tokio::task::spawn_blocking(move || extractor.extract(&bytes, &media_type, &filename))
            .await
            .map_err(|e| ExtractionError::CorruptFile(format!("extraction task failed: {e}")))?
            .into_result()
    }
}
