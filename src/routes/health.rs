use actix_web::{web, HttpResponse, Responder};

use crate::models::HealthResponse;
use crate::routes::AppState;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let pg_healthy = state.postgres.health_check().await.unwrap_or(false);

    if let Err(e) = state.cache.ping().await {
        tracing::warn!("Redis ping failed: {}", e);
    }

    HttpResponse::Ok().json(health_response(pg_healthy))
}

pub(crate) fn health_response(pg_healthy: bool) -> HealthResponse {
    let status = if pg_healthy { "healthy" } else { "degraded" };

    HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    }
}
