// Integration tests for Closet Algo

use actix_web::{http::StatusCode, test, web, App, HttpResponse};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use closet_algo::auth::{AuthUser, Claims, JwtVerifier};
use closet_algo::core::{
    MarkerStore, NegotiationStore, Ranker, RankingStrategy, UpdateWatcher, WatchError,
};
use closet_algo::error::{handle_json_payload_error, ApiError};
use closet_algo::models::{
    Checkpoint, CheckpointStatus, CheckpointType, ErrorResponse, Garment, Measurements,
    Negotiation, NegotiationStatus, NegotiationType, Professional, SearchFilters,
    SendMessageRequest, UserProfile,
};
use closet_algo::services::{CacheError, PostgresError};
use jsonwebtoken::{encode, EncodingKey, Header};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

const SAO_PAULO: (f64, f64) = (-23.5505, -46.6333);

fn create_test_garment(id: i64, waist: Option<f64>, owner_at: Option<(f64, f64)>, age_days: i64) -> Garment {
    Garment {
        id,
        owner_id: 100 + id,
        title: format!("Garment {}", id),
        category: "dress".to_string(),
        gender: "female".to_string(),
        price_per_day: 40.0,
        is_available: true,
        in_use: false,
        measurements: Measurements {
            waist,
            ..Default::default()
        },
        rating: None,
        rentals_count: 0,
        views_count: 0,
        owner_latitude: owner_at.map(|(lat, _)| lat),
        owner_longitude: owner_at.map(|(_, lon)| lon),
        created_at: Utc::now() - ChronoDuration::days(age_days),
    }
}

fn create_test_user(waist: Option<f64>, location: Option<(f64, f64)>) -> UserProfile {
    UserProfile {
        id: 1,
        name: "Beatriz".to_string(),
        latitude: location.map(|(lat, _)| lat),
        longitude: location.map(|(_, lon)| lon),
        measurements: waist.map(|w| Measurements {
            waist: Some(w),
            ..Default::default()
        }),
    }
}

#[::core::prelude::v1::test]
fn test_integration_end_to_end_ranking() {
    let ranker = Ranker::with_default_weights();
    let user = create_test_user(Some(75.0), Some(SAO_PAULO));

    let candidates = vec![
        create_test_garment(1, Some(75.0), Some((-23.56, -46.64)), 5), // Perfect fit, close
        create_test_garment(2, Some(85.0), Some((-23.56, -46.64)), 4), // Looser fit, close
        create_test_garment(3, Some(75.0), Some((-22.9068, -43.1729)), 3), // Perfect fit, far
        create_test_garment(4, None, None, 1),                         // No data at all
        {
            let mut g = create_test_garment(5, Some(75.0), Some((-23.56, -46.64)), 0);
            g.in_use = true; // Out on a rental
            g
        },
    ];

    let result = ranker.search_and_rank(&user, candidates, &SearchFilters::default(), 10);

    assert_eq!(result.strategy, RankingStrategy::Compatibility);
    assert_eq!(result.total_candidates, 5);

    let ids: Vec<i64> = result.garments.iter().map(|g| g.garment.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);

    // Highest first
    for pair in result.garments.windows(2) {
        assert!(pair[0].match_score >= pair[1].match_score);
    }

    // Candidate with neither overlap nor location still ranks
    let last = &result.garments[3];
    assert_eq!(last.compatibility, None);
    assert_eq!(last.distance, None);
    assert_eq!(last.match_score, 0.0);
}

#[::core::prelude::v1::test]
fn test_integration_fallback_orderings() {
    let ranker = Ranker::with_default_weights();
    let candidates = vec![
        create_test_garment(1, Some(75.0), Some((-23.70, -46.70)), 3),
        create_test_garment(2, Some(75.0), Some((-23.56, -46.64)), 2),
        create_test_garment(3, Some(75.0), None, 1),
    ];

    let located = create_test_user(None, Some(SAO_PAULO));
    let result = ranker.search_and_rank(&located, candidates.clone(), &SearchFilters::default(), 10);
    assert_eq!(result.strategy, RankingStrategy::Proximity);
    let ids: Vec<i64> = result.garments.iter().map(|g| g.garment.id).collect();
    assert_eq!(ids, vec![2, 1, 3]);

    let nowhere = create_test_user(None, None);
    let result = ranker.search_and_rank(&nowhere, candidates, &SearchFilters::default(), 10);
    assert_eq!(result.strategy, RankingStrategy::Recency);
    let ids: Vec<i64> = result.garments.iter().map(|g| g.garment.id).collect();
    assert_eq!(ids, vec![3, 2, 1]);
}

#[::core::prelude::v1::test]
fn test_integration_recommendations() {
    let ranker = Ranker::with_default_weights();
    let user = create_test_user(Some(75.0), Some(SAO_PAULO));

    let mut own = create_test_garment(1, Some(75.0), None, 1);
    own.owner_id = user.id;
    let mut suit = create_test_garment(2, Some(75.0), None, 1);
    suit.category = "suit".to_string();
    let mut poorly_rated = create_test_garment(3, Some(75.0), None, 1);
    poorly_rated.rating = Some(3.5);
    let liked = create_test_garment(4, Some(80.0), None, 1);

    let preferred: HashSet<String> = ["dress".to_string()].into_iter().collect();
    let result = ranker.recommend(&user, vec![own, suit, poorly_rated, liked], &preferred, 10);

    let ids: Vec<i64> = result.garments.iter().map(|g| g.garment.id).collect();
    assert_eq!(ids, vec![4]);
}

#[::core::prelude::v1::test]
fn test_integration_nearby_professionals() {
    let ranker = Ranker::with_default_weights();
    let user = create_test_user(None, Some(SAO_PAULO));

    let professional = |id: i64, at: Option<(f64, f64)>| Professional {
        id,
        user_id: 200 + id,
        name: format!("Tailor {}", id),
        kind: "tailor".to_string(),
        is_available: true,
        workshop_address: None,
        workshop_latitude: at.map(|(lat, _)| lat),
        workshop_longitude: at.map(|(_, lon)| lon),
        rating: 4.8,
    };

    let nearby = ranker.nearby_professionals(
        &user,
        vec![
            professional(1, Some((-23.70, -46.70))),
            professional(2, Some((-23.56, -46.64))),
            professional(3, Some((-22.9068, -43.1729))),
            professional(4, None),
        ],
        50.0,
        10,
    );

    let ids: Vec<i64> = nearby.iter().map(|p| p.professional.id).collect();
    assert_eq!(ids, vec![2, 1]);
}

// Watcher against in-memory stores

#[derive(Default)]
struct InMemoryStore {
    negotiation: Mutex<Option<Negotiation>>,
    checkpoints: Mutex<Vec<Checkpoint>>,
    professionals: HashMap<i64, i64>,
}

#[async_trait]
impl NegotiationStore for InMemoryStore {
    async fn negotiation(&self, negotiation_id: i64) -> Result<Option<Negotiation>, PostgresError> {
        Ok(self
            .negotiation
            .lock()
            .unwrap()
            .clone()
            .filter(|n| n.id == negotiation_id))
    }

    async fn professional_id_for_user(&self, user_id: i64) -> Result<Option<i64>, PostgresError> {
        Ok(self.professionals.get(&user_id).copied())
    }

    async fn checkpoints_after(&self, negotiation_id: i64, after_id: i64) -> Result<Vec<Checkpoint>, PostgresError> {
        Ok(self
            .checkpoints
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.negotiation_id == negotiation_id && c.id > after_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct InMemoryMarkers(Mutex<HashMap<i64, DateTime<Utc>>>);

#[async_trait]
impl MarkerStore for InMemoryMarkers {
    async fn touched_at(&self, negotiation_id: i64) -> Result<Option<DateTime<Utc>>, CacheError> {
        Ok(self.0.lock().unwrap().get(&negotiation_id).copied())
    }

    async fn mark_touched(&self, negotiation_id: i64, at: DateTime<Utc>) -> Result<(), CacheError> {
        self.0.lock().unwrap().insert(negotiation_id, at);
        Ok(())
    }
}

fn store_with_tailor() -> InMemoryStore {
    let store = InMemoryStore {
        professionals: [(3, 30)].into_iter().collect(),
        ..Default::default()
    };
    *store.negotiation.lock().unwrap() = Some(Negotiation {
        id: 7,
        clothing_item_id: 1,
        initiator_id: 1,
        recipient_id: 2,
        professional_id: Some(30),
        professional_confirmed: true,
        kind: NegotiationType::Adjustment,
        status: NegotiationStatus::Accepted,
        proposed_price: None,
        responded_at: None,
        closed_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    });
    store
}

fn new_checkpoint(id: i64) -> Checkpoint {
    Checkpoint {
        id,
        negotiation_id: 7,
        kind: CheckpointType::DeliveryToProfessional,
        qr_code: Uuid::new_v4(),
        status: CheckpointStatus::Pending,
        generated_by_user_id: 1,
        scanned_by_user_id: None,
        scanned_at: None,
        notes: None,
        created_at: Utc::now(),
    }
}

fn watcher() -> UpdateWatcher {
    UpdateWatcher::new(Duration::from_secs(25), Duration::from_secs(2), Duration::from_secs(60))
}

#[tokio::test(start_paused = true)]
async fn test_integration_professional_sees_new_checkpoint() {
    let store = Arc::new(store_with_tailor());
    let markers = Arc::new(InMemoryMarkers::default());
    let watcher = watcher();

    let waiter = {
        let (store, markers, watcher) = (store.clone(), markers.clone(), watcher.clone());
        tokio::spawn(async move {
            watcher
                .wait_for_updates(store.as_ref(), markers.as_ref(), 7, 3, 0, std::future::pending())
                .await
        })
    };

    // Checkpoint written without a touch: found on the next interval
    tokio::time::sleep(Duration::from_secs(3)).await;
    store.checkpoints.lock().unwrap().push(new_checkpoint(1));
    let begin = tokio::time::Instant::now();

    let report = waiter.await.unwrap().unwrap();
    assert!(report.has_updates);
    assert_eq!(report.checkpoints.len(), 1);
    assert!(begin.elapsed() <= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_integration_unrelated_user_forbidden_immediately() {
    let store = store_with_tailor();
    let markers = InMemoryMarkers::default();

    let begin = tokio::time::Instant::now();
    let result = watcher()
        .wait_for_updates(&store, &markers, 7, 4, 0, std::future::pending())
        .await;

    assert!(matches!(result, Err(WatchError::Forbidden { .. })));
    assert_eq!(begin.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_integration_touch_before_wait_is_not_an_update() {
    let store = store_with_tailor();
    let markers = InMemoryMarkers::default();
    let watcher = watcher();

    // Touched long before the wait started
    markers
        .mark_touched(7, Utc::now() - ChronoDuration::seconds(30))
        .await
        .unwrap();

    let report = watcher
        .wait_for_updates(&store, &markers, 7, 1, 0, std::future::pending())
        .await
        .unwrap();
    assert!(!report.has_updates);
}

// HTTP surface

fn bearer(secret: &str, sub: &str) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        exp: (Utc::now().timestamp() + 600) as usize,
    };
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap();
    format!("Bearer {}", token)
}

async fn whoami(user: AuthUser) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(user.id))
}

async fn echo_message(_user: AuthUser, req: web::Json<SendMessageRequest>) -> Result<HttpResponse, ApiError> {
    validator::Validate::validate(&*req)?;
    Ok(HttpResponse::Created().finish())
}

#[actix_web::test]
async fn test_integration_bearer_auth() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(JwtVerifier::new("secret")))
            .route("/me", web::get().to(whoami)),
    )
    .await;

    let req = test::TestRequest::get().uri("/me").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.status_code, 401);

    let req = test::TestRequest::get()
        .uri("/me")
        .insert_header(("Authorization", bearer("secret", "12")))
        .to_request();
    let id: i64 = test::call_and_read_body_json(&app, req).await;
    assert_eq!(id, 12);
}

#[actix_web::test]
async fn test_integration_validation_is_422() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(JwtVerifier::new("secret")))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .route("/messages", web::post().to(echo_message)),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/messages")
        .insert_header(("Authorization", bearer("secret", "1")))
        .set_json(serde_json::json!({ "message": "x".repeat(1001) }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = test::TestRequest::post()
        .uri("/messages")
        .insert_header(("Authorization", bearer("secret", "1")))
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = test::TestRequest::post()
        .uri("/messages")
        .insert_header(("Authorization", bearer("secret", "1")))
        .set_json(serde_json::json!({ "message": "Can I pick it up Friday?" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
}
