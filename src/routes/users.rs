use actix_web::{web, HttpResponse};
use validator::Validate;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::models::{DataResponse, Measurements, UpdateMeasurementsRequest};
use crate::routes::AppState;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/user/profile", web::get().to(profile))
        .route("/user/measurements", web::put().to(update_measurements));
}

/// GET /api/user/profile
async fn profile(state: web::Data<AppState>, user: AuthUser) -> ApiResult<HttpResponse> {
    let profile = state.requester(user.id).await?;
    Ok(HttpResponse::Ok().json(DataResponse::new(profile)))
}

/// PUT /api/user/measurements
///
/// Merges into the stored set: omitted or null dimensions keep their value.
async fn update_measurements(
    state: web::Data<AppState>,
    user: AuthUser,
    req: web::Json<UpdateMeasurementsRequest>,
) -> ApiResult<HttpResponse> {
    req.validate()?;

    // Unknown users get a 404 rather than a foreign-key failure
    state.requester(user.id).await?;

    let measurements = Measurements::from(&req.into_inner());
    let saved = state.postgres.upsert_measurements(user.id, &measurements).await?;

    tracing::info!("User {} updated measurements", user.id);

    Ok(HttpResponse::Ok().json(DataResponse::with_message(saved, "Measurements updated")))
}
