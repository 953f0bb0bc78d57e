//! Axum route handlers for the Screening API.

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{BatchSummary, CandidateRecord, JobRequirement, SourceDocument};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ScreeningResponse {
    pub batch_id: Uuid,
    pub records: Vec<CandidateRecord>,
    pub summary: BatchSummary,
}

#[derive(Debug, Serialize)]
pub struct CredentialStatusResponse {
    pub key_ordinal: usize,
    pub total_keys: usize,
}

/// Parsed multipart form before validation.
struct ScreeningForm {
    job: Option<JobRequirement>,
    threshold: Option<u8>,
    documents: Vec<SourceDocument>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/screenings
///
/// Multipart form: `job` (JSON), optional `threshold` (0–100), one or more `file` parts.
/// Runs one batch to completion and returns every record plus the summary.
pub async fn handle_create_screening(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ScreeningResponse>, AppError> {
    let form = read_form(multipart).await?;

    let job = form
        .job
        .ok_or_else(|| AppError::Validation("job field is required".to_string()))?;
    job.validate()?;

    if form.documents.is_empty() {
        return Err(AppError::Validation(
            "at least one file is required".to_string(),
        ));
    }
    if form.documents.len() > state.config.max_batch_documents {
        return Err(AppError::Validation(format!(
            "at most {} files per batch, got {}",
            state.config.max_batch_documents,
            form.documents.len()
        )));
    }

    let threshold = form.threshold.unwrap_or(state.config.shortlist_threshold);

    let outcome = state
        .batch_runner()
        .run_with_progress(form.documents, &job, threshold, |progress| {
            debug!(
                "Screening progress {}/{} ({:.0}%)",
                progress.completed,
                progress.total,
                progress.fraction() * 100.0
            );
        })
        .await?;

    Ok(Json(ScreeningResponse {
        batch_id: outcome.batch_id,
        records: outcome.records,
        summary: outcome.summary,
    }))
}

/// GET /api/v1/credentials/status
///
/// Which key is current, never the key itself.
pub async fn handle_credential_status(State(state): State<AppState>) -> Json<CredentialStatusResponse> {
    Json(CredentialStatusResponse {
        key_ordinal: state.rotator.key_ordinal(),
        total_keys: state.rotator.total(),
    })
}

async fn read_form(mut multipart: Multipart) -> Result<ScreeningForm, AppError> {
    let mut form = ScreeningForm {
        job: None,
        threshold: None,
        documents: Vec::new(),
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidPayload(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "job" => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| AppError::InvalidPayload(e.to_string()))?;
                let job = serde_json::from_str(&raw)
                    .map_err(|e| AppError::Validation(format!("invalid job: {e}")))?;
                form.job = Some(job);
            }
            "threshold" => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| AppError::InvalidPayload(e.to_string()))?;
                form.threshold = Some(parse_threshold(&raw)?);
            }
            "file" | "files" => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("document-{}", form.documents.len() + 1));
                let media_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::InvalidPayload(e.to_string()))?;
                form.documents
                    .push(SourceDocument::new(filename, media_type, bytes));
            }
            other => debug!("Ignoring unknown multipart field '{other}'"),
        }
    }

    Ok(form)
}

fn parse_threshold(raw: &str) -> Result<u8, AppError> {
    raw.trim()
        .parse::<u8>()
        .ok()
        .filter(|t| *t <= 100)
        .ok_or_else(|| {
            AppError::Validation(format!("threshold must be an integer 0-100, got '{raw}'"))
        })
}
