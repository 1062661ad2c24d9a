use actix_web::{web, HttpResponse};
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::core::handoff::{ensure_can_generate, ensure_can_scan, ensure_party, HandoffError};
use crate::error::{ApiError, ApiResult};
use crate::models::{Checkpoint, CheckpointType, DataResponse, ScanCheckpointRequest};
use crate::routes::AppState;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/negotiations/{id}/qrcode/{kind}", web::post().to(generate))
        .route("/negotiations/{id}/checkpoints", web::get().to(list))
        .route("/qrcode/scan", web::post().to(scan));
}

/// Path segment for each checkpoint type
pub fn parse_kind(segment: &str) -> Option<CheckpointType> {
    match segment {
        "delivery-to-professional" => Some(CheckpointType::DeliveryToProfessional),
        "return-from-professional" => Some(CheckpointType::ReturnFromProfessional),
        "return-to-owner" => Some(CheckpointType::ReturnToOwner),
        _ => None,
    }
}

/// POST /api/negotiations/{id}/qrcode/{kind}
///
/// Returns the existing checkpoint of that type with 200, or a new one with 201.
async fn generate(
    state: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<(i64, String)>,
) -> ApiResult<HttpResponse> {
    let (negotiation_id, segment) = path.into_inner();
    let kind = parse_kind(&segment)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown checkpoint type: {}", segment)))?;

    let (negotiation, party) = state.negotiation_for(negotiation_id, user.id).await?;
    let existing = state.postgres.checkpoints(negotiation_id).await?;
    ensure_can_generate(kind, &negotiation, party, &existing)?;

    if let Some(checkpoint) = existing.into_iter().find(|c| c.kind == kind) {
        return Ok(generated_response(checkpoint, false));
    }

    let (checkpoint, created) = state
        .postgres
        .create_checkpoint(negotiation_id, kind, user.id)
        .await?;

    if created {
        state.touch(negotiation_id).await;
        tracing::info!("Checkpoint {} ({}) generated for negotiation {}", checkpoint.id, kind, negotiation_id);
    }

    Ok(generated_response(checkpoint, created))
}

/// 201 for a fresh checkpoint, 200 when one of that type already existed
fn generated_response(checkpoint: Checkpoint, created: bool) -> HttpResponse {
    if created {
        HttpResponse::Created().json(DataResponse::with_message(checkpoint, "QR code generated"))
    } else {
        HttpResponse::Ok().json(DataResponse::with_message(checkpoint, "QR code already exists"))
    }
}

/// GET /api/negotiations/{id}/checkpoints
async fn list(state: web::Data<AppState>, user: AuthUser, path: web::Path<i64>) -> ApiResult<HttpResponse> {
    let negotiation_id = path.into_inner();

    let (_, party) = state.negotiation_for(negotiation_id, user.id).await?;
    ensure_party(party, user.id)?;

    let checkpoints = state.postgres.checkpoints(negotiation_id).await?;
    Ok(HttpResponse::Ok().json(DataResponse::new(checkpoints)))
}

/// POST /api/qrcode/scan
async fn scan(
    state: web::Data<AppState>,
    user: AuthUser,
    req: web::Json<ScanCheckpointRequest>,
) -> ApiResult<HttpResponse> {
    req.validate()?;

    let not_found = || ApiError::NotFound("Checkpoint not found".to_string());
    let token = Uuid::parse_str(req.qr_code.trim()).map_err(|_| not_found())?;
    let checkpoint = state
        .postgres
        .checkpoint_by_token(token)
        .await?
        .ok_or_else(not_found)?;

    let (_, party) = state.negotiation_for(checkpoint.negotiation_id, user.id).await?;
    ensure_can_scan(&checkpoint, party, user.id)?;

    // None: a concurrent scan got there first
    let scanned = state
        .postgres
        .mark_scanned(checkpoint.id, user.id, req.notes.as_deref())
        .await?
        .ok_or(HandoffError::AlreadyScanned)?;
    state.touch(scanned.negotiation_id).await;

    tracing::info!("Checkpoint {} scanned by user {}", scanned.id, user.id);

    Ok(HttpResponse::Ok().json(DataResponse::with_message(scanned, "QR code scanned")))
}
