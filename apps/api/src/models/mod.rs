pub mod batch;
pub mod candidate;
pub mod job;

pub use batch::{BatchProgress, BatchSummary, SourceDocument};
pub use candidate::{CandidateRecord, InsightResult, ParsedCandidate};
pub use job::JobRequirement;
