use actix_web::{web, HttpResponse};
use std::collections::HashSet;
use validator::Validate;

use crate::auth::AuthUser;
use crate::core::{calculate_bounding_box, filters::RECOMMENDATION_MIN_RATING};
use crate::error::{ApiError, ApiResult};
use crate::models::{DataResponse, NearbyProfessionalsQuery, RecommendationsQuery, SearchRequest};
use crate::routes::AppState;
use crate::services::CacheKey;

/// Configure all matching routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/matching/search", web::post().to(search))
        .route("/matching/recommendations", web::get().to(recommendations))
        .route("/matching/professionals", web::get().to(nearby_professionals));
}

/// Search and rank garments for the caller
///
/// POST /api/matching/search
///
/// Request body:
/// ```json
/// {
///   "category": "dress",
///   "gender": "female",
///   "min_price": 20.0,
///   "max_price": 80.0,
///   "limit": 20
/// }
/// ```
async fn search(
    state: web::Data<AppState>,
    user: AuthUser,
    req: web::Json<SearchRequest>,
) -> ApiResult<HttpResponse> {
    req.validate()?;

    let requester = state.requester(user.id).await?;
    let limit = state.matching.limit(req.limit);
    let filters = req.filters();

    tracing::info!("Searching garments for user: {}, limit: {}", user.id, limit);

    let candidates = state.postgres.search_candidates(&filters).await?;

    let result = state.ranker.search_and_rank(&requester, candidates, &filters, limit);

    tracing::info!(
        "Ranked {} of {} candidates for user {} by {:?}",
        result.garments.len(),
        result.total_candidates,
        user.id,
        result.strategy
    );

    let message = if requester.has_measurements() {
        "Results ordered by compatibility and proximity"
    } else {
        "Register your measurements to get more accurate results"
    };

    Ok(HttpResponse::Ok().json(DataResponse::with_message(result.garments, message)))
}

/// GET /api/matching/recommendations?limit=N
async fn recommendations(
    state: web::Data<AppState>,
    user: AuthUser,
    query: web::Query<RecommendationsQuery>,
) -> ApiResult<HttpResponse> {
    query.validate()?;

    let requester = state.requester(user.id).await?;
    let limit = state.matching.limit(query.limit);
    let categories = preferred_categories(&state, user.id).await?;

    let candidates = state
        .postgres
        .recommendation_candidates(
            user.id,
            &categories,
            RECOMMENDATION_MIN_RATING,
            limit * state.matching.recommendation_over_fetch,
        )
        .await?;

    let preferred: HashSet<String> = categories.into_iter().collect();
    let result = state.ranker.recommend(&requester, candidates, &preferred, limit);

    tracing::debug!(
        "Recommended {} garments to user {} from {} categories",
        result.garments.len(),
        user.id,
        preferred.len()
    );

    Ok(HttpResponse::Ok().json(DataResponse::new(result.garments)))
}

/// Favorited and rented categories, cached per user
///
/// A cache outage only costs a database round trip.
async fn preferred_categories(state: &AppState, user_id: i64) -> ApiResult<Vec<String>> {
    let key = CacheKey::preferred_categories(user_id);

    match state.cache.get::<Vec<String>>(&key).await {
        Ok(categories) => return Ok(categories),
        Err(crate::services::CacheError::CacheMiss(_)) => {}
        Err(e) => tracing::warn!("Cache read failed for {}, querying database: {}", key, e),
    }

    let categories = state.postgres.preferred_categories(user_id).await?;

    if let Err(e) = state.cache.set(&key, &categories).await {
        tracing::warn!("Failed to cache categories for user {}: {}", user_id, e);
    }

    Ok(categories)
}

/// GET /api/matching/professionals?max_distance=KM&limit=N
async fn nearby_professionals(
    state: web::Data<AppState>,
    user: AuthUser,
    query: web::Query<NearbyProfessionalsQuery>,
) -> ApiResult<HttpResponse> {
    query.validate()?;

    let requester = state.requester(user.id).await?;
    let (Some(lat), Some(lon)) = (requester.latitude, requester.longitude) else {
        return Err(ApiError::BadRequest(
            "Set your location to find nearby professionals".to_string(),
        ));
    };

    let max_distance = query.max_distance.unwrap_or(state.matching.professional_radius_km);
    let limit = query
        .limit
        .map(usize::from)
        .unwrap_or(state.matching.professional_limit);

    let bbox = calculate_bounding_box(lat, lon, max_distance);
    let professionals = state.postgres.professionals_in_box(&bbox).await?;

    let nearby = state
        .ranker
        .nearby_professionals(&requester, professionals, max_distance, limit);

    Ok(HttpResponse::Ok().json(DataResponse::new(nearby)))
}
