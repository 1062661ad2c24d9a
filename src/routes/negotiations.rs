use actix_web::{web, HttpResponse};
use validator::Validate;

use crate::auth::AuthUser;
use crate::core::handoff::{
    ensure_active, ensure_can_assign_professional, ensure_can_confirm_professional,
    ensure_can_respond, ensure_party, mark_read, HandoffError,
};
use crate::core::NegotiationStore;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    AssignProfessionalRequest, DataResponse, NegotiationMessage, NegotiationStatus,
    NegotiationThread, NegotiationsQuery, SendMessageRequest,
};
use crate::routes::AppState;

/// Configure negotiation routes
///
/// Every successful mutation touches the negotiation so update waiters wake.
/// Reading a thread is not a mutation.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/negotiations", web::get().to(list))
        .route("/negotiations/{id}", web::get().to(show))
        .route("/negotiations/{id}/messages", web::post().to(send_message))
        .route("/negotiations/{id}/accept", web::put().to(accept))
        .route("/negotiations/{id}/reject", web::put().to(reject))
        .route("/negotiations/{id}/professional", web::put().to(assign_professional))
        .route(
            "/negotiations/{id}/confirm-professional",
            web::put().to(confirm_professional),
        );
}

/// GET /api/negotiations?page=N
///
/// Threads the caller is part of as renter, owner or assigned professional,
/// with the latest message and an unread count.
async fn list(
    state: web::Data<AppState>,
    user: AuthUser,
    query: web::Query<NegotiationsQuery>,
) -> ApiResult<HttpResponse> {
    query.validate()?;

    let professional_id = state.postgres.professional_id_for_user(user.id).await?;
    let negotiations = state
        .postgres
        .negotiations_for_user(
            user.id,
            professional_id,
            i64::from(NegotiationsQuery::PAGE_SIZE),
            query.offset(),
        )
        .await?;

    Ok(HttpResponse::Ok().json(DataResponse::new(negotiations)))
}

/// GET /api/negotiations/{id}
///
/// The thread with every message. Messages the caller received are marked
/// read, and the response already reflects that.
async fn show(state: web::Data<AppState>, user: AuthUser, path: web::Path<i64>) -> ApiResult<HttpResponse> {
    let negotiation_id = path.into_inner();

    let (negotiation, party) = state.negotiation_for(negotiation_id, user.id).await?;
    ensure_party(party, user.id)?;

    let mut messages = state.postgres.messages(negotiation_id).await?;
    let newly_read = mark_read(&mut messages, user.id);

    if !newly_read.is_empty() {
        let updated = state
            .postgres
            .mark_messages_read(negotiation_id, &newly_read)
            .await?;
        tracing::debug!("User {} read {} messages in negotiation {}", user.id, updated, negotiation_id);
    }

    Ok(HttpResponse::Ok().json(DataResponse::new(NegotiationThread { negotiation, messages })))
}

/// POST /api/negotiations/{id}/messages
async fn send_message(
    state: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<i64>,
    req: web::Json<SendMessageRequest>,
) -> ApiResult<HttpResponse> {
    req.validate()?;
    let negotiation_id = path.into_inner();

    let (negotiation, party) = state.negotiation_for(negotiation_id, user.id).await?;
    ensure_party(party, user.id)?;
    ensure_active(&negotiation)?;

    let message = state
        .postgres
        .add_message(negotiation_id, user.id, &req.message)
        .await?;
    state.touch(negotiation_id).await;

    tracing::debug!("User {} posted to negotiation {}", user.id, negotiation_id);

    Ok(message_posted(message))
}

fn message_posted(message: NegotiationMessage) -> HttpResponse {
    HttpResponse::Ok().json(DataResponse::with_message(message, "Message sent"))
}

/// PUT /api/negotiations/{id}/accept
async fn accept(state: web::Data<AppState>, user: AuthUser, path: web::Path<i64>) -> ApiResult<HttpResponse> {
    respond(&state, user, path.into_inner(), NegotiationStatus::Accepted, "Negotiation accepted").await
}

/// PUT /api/negotiations/{id}/reject
async fn reject(state: web::Data<AppState>, user: AuthUser, path: web::Path<i64>) -> ApiResult<HttpResponse> {
    respond(&state, user, path.into_inner(), NegotiationStatus::Rejected, "Negotiation rejected").await
}

async fn respond(
    state: &AppState,
    user: AuthUser,
    negotiation_id: i64,
    status: NegotiationStatus,
    message: &str,
) -> ApiResult<HttpResponse> {
    let (negotiation, party) = state.negotiation_for(negotiation_id, user.id).await?;
    ensure_can_respond(&negotiation, party)?;

    // None: someone else responded between the read and the update
    let updated = state
        .postgres
        .respond(negotiation_id, status)
        .await?
        .ok_or(HandoffError::NotActive)?;
    state.touch(negotiation_id).await;

    tracing::info!("Negotiation {} moved to {:?} by user {}", negotiation_id, status, user.id);

    Ok(HttpResponse::Ok().json(DataResponse::with_message(updated, message)))
}

/// PUT /api/negotiations/{id}/professional
async fn assign_professional(
    state: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<i64>,
    req: web::Json<AssignProfessionalRequest>,
) -> ApiResult<HttpResponse> {
    req.validate()?;
    let negotiation_id = path.into_inner();

    let (_, party) = state.negotiation_for(negotiation_id, user.id).await?;
    ensure_can_assign_professional(party)?;

    if !state.postgres.professional_exists(req.professional_id).await? {
        return Err(ApiError::Validation(format!(
            "professional_id: professional {} does not exist",
            req.professional_id
        )));
    }

    let updated = state
        .postgres
        .assign_professional(negotiation_id, req.professional_id)
        .await?;
    state.touch(negotiation_id).await;

    Ok(HttpResponse::Ok().json(DataResponse::with_message(updated, "Professional added to negotiation")))
}

/// PUT /api/negotiations/{id}/confirm-professional
async fn confirm_professional(
    state: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let negotiation_id = path.into_inner();

    let (negotiation, party) = state.negotiation_for(negotiation_id, user.id).await?;
    ensure_can_confirm_professional(&negotiation, party)?;

    let updated = state
        .postgres
        .confirm_professional(negotiation_id)
        .await?
        .ok_or(HandoffError::AlreadyConfirmed)?;
    state.touch(negotiation_id).await;

    Ok(HttpResponse::Ok().json(DataResponse::with_message(updated, "Professional confirmed")))
}
