use actix_web::{web, HttpResponse};

use crate::auth::AuthUser;
use crate::core::UpdateReport;
use crate::error::ApiResult;
use crate::models::{UpdatesQuery, UpdatesResponse};
use crate::routes::AppState;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/negotiations/{id}/updates/poll", web::get().to(poll))
        .route("/negotiations/{id}/updates", web::get().to(check));
}

/// Long poll for negotiation updates
///
/// GET /api/negotiations/{id}/updates/poll?last_checkpoint_id=N
///
/// Holds the request until a newer checkpoint or any mutation appears, or
/// until the watcher ceiling passes. A dropped connection drops the wait.
async fn poll(
    state: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<i64>,
    query: web::Query<UpdatesQuery>,
) -> ApiResult<HttpResponse> {
    let negotiation_id = path.into_inner();

    let report = state
        .watcher
        .wait_for_updates(
            state.postgres.as_ref(),
            state.cache.as_ref(),
            negotiation_id,
            user.id,
            query.last_checkpoint_id,
            state.shutdown_signal(),
        )
        .await?;

    Ok(HttpResponse::Ok().json(updates_response(report, false)))
}

/// Single non-blocking check
///
/// GET /api/negotiations/{id}/updates?last_checkpoint_id=N
async fn check(
    state: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<i64>,
    query: web::Query<UpdatesQuery>,
) -> ApiResult<HttpResponse> {
    let report = state
        .watcher
        .check(state.postgres.as_ref(), path.into_inner(), user.id, query.last_checkpoint_id)
        .await?;

    Ok(HttpResponse::Ok().json(updates_response(report, true)))
}

/// Timed-out long polls carry only a message; quick checks always include
/// the negotiation
pub(crate) fn updates_response(report: UpdateReport, always_include_negotiation: bool) -> UpdatesResponse {
    if report.has_updates || always_include_negotiation {
        UpdatesResponse {
            success: true,
            has_updates: report.has_updates,
            checkpoints: report.checkpoints,
            negotiation: Some(report.negotiation),
            message: None,
        }
    } else {
        UpdatesResponse {
            success: true,
            has_updates: false,
            checkpoints: Vec::new(),
            negotiation: None,
            message: Some("No updates".to_string()),
        }
    }
}
