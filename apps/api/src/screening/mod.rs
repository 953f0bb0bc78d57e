// Screening engine: extract, analyze in two stages, then shortlist. One batch at a time.
// All LLM calls go through insight::InsightEngine; nothing here talks HTTP directly.

pub mod batch;
pub mod handlers;
pub mod pipeline;

pub use batch::BatchRunner;
pub use pipeline::AnalysisPipeline;
