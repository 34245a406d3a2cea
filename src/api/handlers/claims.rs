//! Claim handlers: submit, read model, history, lookup, submission state.

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{ClaimHistoryResponse, SubmitClaimResponse};
use crate::app_state::AppState;
use crate::domain::{AttachmentKind, ClaimEvent, ClaimId};
use crate::error::{ErrorResponse, GatewayError};
use crate::service::{Attachment, Attachments, ClaimInput, ReadModelSnapshot, TrackedSubmission};

/// Claim form as decoded from a multipart body.
#[derive(Debug, Default)]
struct ClaimForm {
    correlation_id: Option<String>,
    input: ClaimInput,
    attachments: Attachments,
}

fn multipart_error(err: &MultipartError) -> GatewayError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        GatewayError::PayloadTooLarge(err.body_text())
    } else {
        GatewayError::InvalidRequest(err.body_text())
    }
}

async fn field_text(field: Field<'_>) -> Result<String, GatewayError> {
    field.text().await.map_err(|e| multipart_error(&e))
}

/// Reads every part of the claim form. Unknown parts are ignored.
async fn read_claim_form(mut multipart: Multipart) -> Result<ClaimForm, GatewayError> {
    let mut form = ClaimForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(&e))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if let Some(kind) = AttachmentKind::from_field_name(&name) {
            let file_name = field.file_name().unwrap_or(kind.field_name()).to_string();
            let bytes = field.bytes().await.map_err(|e| multipart_error(&e))?;
            *form.attachments.slot_mut(kind) = Some(Attachment {
                file_name,
                bytes: bytes.to_vec(),
            });
            continue;
        }
        match name.as_str() {
            "correlationId" => form.correlation_id = Some(field_text(field).await?),
            "claimId" => form.input.claim_id = Some(field_text(field).await?),
            "fullName" => form.input.full_name = field_text(field).await?,
            "policyNumber" => form.input.policy_number = field_text(field).await?,
            "incidentDate" => form.input.incident_date = field_text(field).await?,
            "description" => form.input.description = field_text(field).await?,
            "amount" => form.input.amount = field_text(field).await?,
            other => tracing::debug!(field = other, "ignoring unknown claim form field"),
        }
    }
    Ok(form)
}

/// `POST /api/claims` — Submit a claim with optional attachments.
///
/// # Errors
///
/// Returns [`GatewayError`] on validation, upload or publish failure.
#[utoipa::path(
    post,
    path = "/api/claims",
    tag = "Claims",
    summary = "Submit a claim",
    description = "Multipart form with `fullName`, `policyNumber`, `incidentDate`, `description`, `amount`, optional `claimId` and `correlationId`, and optional `photo`, `video` and `document` files. Attachments are uploaded first; the claim is published only if every upload succeeds.",
    request_body(content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Claim published", body = SubmitClaimResponse),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 413, description = "Attachment too large", body = ErrorResponse),
        (status = 503, description = "Ledger unavailable", body = ErrorResponse),
    )
)]
pub async fn submit_claim(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, GatewayError> {
    let form = read_claim_form(multipart).await?;
    let submission = state
        .claim_service
        .submit_claim(form.correlation_id.as_deref(), form.input, form.attachments)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(SubmitClaimResponse::from(submission)),
    ))
}

/// `GET /api/claims` — Read-model snapshot.
#[utoipa::path(
    get,
    path = "/api/claims",
    tag = "Claims",
    summary = "Recent claims",
    description = "Returns the read model: lifecycle state, per-status counts and the most recent claims. In degraded mode a single placeholder claim is shown and `error` says why.",
    responses(
        (status = 200, description = "Read-model snapshot", body = ReadModelSnapshot),
    )
)]
pub async fn list_claims(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.claim_service.snapshot().await)
}

/// `POST /api/claims/refresh` — Re-seed the read model from history.
#[utoipa::path(
    post,
    path = "/api/claims/refresh",
    tag = "Claims",
    summary = "Refresh recent claims",
    description = "Re-scans history and recomputes counts from scratch. On failure the previous data is kept and `error` is set.",
    responses(
        (status = 200, description = "Read-model snapshot after the refresh", body = ReadModelSnapshot),
    )
)]
pub async fn refresh_claims(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.claim_service.refresh().await)
}

/// `GET /api/claims/history` — Direct history scan.
///
/// # Errors
///
/// Returns [`GatewayError::LedgerUnavailable`] when the scan cannot start.
#[utoipa::path(
    get,
    path = "/api/claims/history",
    tag = "Claims",
    summary = "Claim history",
    description = "Scans the trailing window of the claims channel. Positions that fail to load are listed in `skipped`.",
    responses(
        (status = 200, description = "Claims, newest first", body = ClaimHistoryResponse),
        (status = 503, description = "History unavailable", body = ErrorResponse),
    )
)]
pub async fn claim_history(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, GatewayError> {
    let history = state.claim_service.history().await?;
    Ok(Json(ClaimHistoryResponse::from(history)))
}

/// `GET /api/claims/{claim_id}` — Latest known event for a claim.
///
/// # Errors
///
/// Returns [`GatewayError`] if the id is malformed or unknown.
#[utoipa::path(
    get,
    path = "/api/claims/{claim_id}",
    tag = "Claims",
    summary = "Get claim",
    params(("claim_id" = String, Path, description = "Claim identifier")),
    responses(
        (status = 200, description = "Claim event", body = ClaimEvent),
        (status = 400, description = "Invalid claim id", body = ErrorResponse),
        (status = 404, description = "Claim not found", body = ErrorResponse),
    )
)]
pub async fn get_claim(
    State(state): State<AppState>,
    Path(claim_id): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let claim_id: ClaimId = claim_id
        .parse()
        .map_err(|e| GatewayError::InvalidRequest(format!("claim id: {e}")))?;
    let event = state.claim_service.find_claim(&claim_id).await?;
    Ok(Json(event))
}

/// `GET /api/submissions/{correlation_id}` — Submission state.
///
/// # Errors
///
/// Returns [`GatewayError::SubmissionNotFound`] if the id is not tracked.
#[utoipa::path(
    get,
    path = "/api/submissions/{correlation_id}",
    tag = "Claims",
    summary = "Get submission state",
    params(("correlation_id" = String, Path, description = "Correlation id returned on submit")),
    responses(
        (status = 200, description = "Tracked submission", body = TrackedSubmission),
        (status = 404, description = "Submission not found", body = ErrorResponse),
    )
)]
pub async fn get_submission(
    State(state): State<AppState>,
    Path(correlation_id): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let entry = state.claim_service.submission(&correlation_id).await?;
    Ok(Json(entry))
}

/// Claim routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/claims", post(submit_claim).get(list_claims))
        .route("/claims/refresh", post(refresh_claims))
        .route("/claims/history", get(claim_history))
        .route("/claims/{claim_id}", get(get_claim))
        .route("/submissions/{correlation_id}", get(get_submission))
}
