use std::sync::Arc;

use crate::config::Config;
use crate::credentials::CredentialRotator;
use crate::extraction::TextExtractor;
use crate::insight::InsightEngine;
use crate::screening::{AnalysisPipeline, BatchRunner};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub extractor: Arc<TextExtractor>,
    /// Built once at startup; every batch rotates the same pool.
    pub rotator: Arc<CredentialRotator>,
    /// Pluggable Insight Engine. Default: LlmInsightEngine.
    pub engine: Arc<dyn InsightEngine>,
}

impl AppState {
    /// A fresh runner over the shared extractor, engine and key pool.
    pub fn batch_runner(&self) -> BatchRunner {
        let pipeline = AnalysisPipeline::new(
            self.engine.clone(),
            self.rotator.clone(),
            self.config.llm_timeout,
        );
        BatchRunner::new(self.extractor.clone(), pipeline)
    }
}
