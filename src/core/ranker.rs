use std::cmp::Ordering;
use std::collections::HashSet;

use serde::Serialize;

use crate::core::{
    compatibility::compatibility_score,
    distance::{calculate_bounding_box, distance_between, is_within_bounding_box, round_km},
    filters::{is_eligible, matches_recommendation_pool, matches_search_filters},
    scoring::{composite_score, round_score},
};
use crate::models::{
    Garment, NearbyProfessional, Professional, RankedGarment, RankingWeights, SearchFilters,
    UserProfile,
};

/// How a result list was ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingStrategy {
    /// Composite score: measurements, proximity, rating and popularity
    Compatibility,
    /// Requester has no measurements: nearest first
    Proximity,
    /// Requester has neither measurements nor a location: newest first
    Recency,
}

/// Result of a ranking pass
#[derive(Debug)]
pub struct RankingResult {
    pub garments: Vec<RankedGarment>,
    pub strategy: RankingStrategy,
    pub total_candidates: usize,
}

/// Ranking orchestrator
///
/// # Pipeline Stages
/// 1. Eligibility (available and not in use) and request filters
/// 2. Per-candidate annotation: distance, compatibility, composite score
/// 3. Ordering by the strategy the requester's data allows
/// 4. Truncation to the requested limit
#[derive(Debug, Clone)]
pub struct Ranker {
    weights: RankingWeights,
}

impl Ranker {
    pub fn new(weights: RankingWeights) -> Self {
        Self { weights }
    }

    pub fn with_default_weights() -> Self {
        Self {
            weights: RankingWeights::default(),
        }
    }

    pub fn weights(&self) -> &RankingWeights {
        &self.weights
    }

    /// Search garments and rank them for the requester
    ///
    /// Requesters with measurements get the composite ordering; without
    /// measurements the list is ordered by proximity, and without a location
    /// either, by recency.
    pub fn search_and_rank(
        &self,
        requester: &UserProfile,
        candidates: Vec<Garment>,
        filters: &SearchFilters,
        limit: usize,
    ) -> RankingResult {
        let total_candidates = candidates.len();

        let pool: Vec<Garment> = candidates
            .into_iter()
            .filter(is_eligible)
            .filter(|garment| matches_search_filters(garment, filters))
            .collect();

        let (mut garments, strategy) = if requester.has_measurements() {
            (self.rank_by_compatibility(requester, pool), RankingStrategy::Compatibility)
        } else if requester.location().is_some() {
            (self.rank_by_proximity(requester, pool), RankingStrategy::Proximity)
        } else {
            (self.rank_by_recency(requester, pool), RankingStrategy::Recency)
        };

        garments.truncate(limit);

        RankingResult {
            garments,
            strategy,
            total_candidates,
        }
    }

    /// Personalised recommendations
    ///
    /// `candidates` should be over-fetched by the caller since the pool
    /// narrowing may discard many of them.
    pub fn recommend(
        &self,
        requester: &UserProfile,
        candidates: Vec<Garment>,
        preferred_categories: &HashSet<String>,
        limit: usize,
    ) -> RankingResult {
        let total_candidates = candidates.len();

        let pool: Vec<Garment> = candidates
            .into_iter()
            .filter(|garment| matches_recommendation_pool(garment, requester.id, preferred_categories))
            .collect();

        let mut garments = self.rank_by_compatibility(requester, pool);
        garments.truncate(limit);

        RankingResult {
            garments,
            strategy: RankingStrategy::Compatibility,
            total_candidates,
        }
    }

    /// Professionals within `max_distance_km` of the requester, nearest first
    ///
    /// Requesters without a location get an empty list. Professionals without
    /// a workshop location are never included.
    pub fn nearby_professionals(
        &self,
        requester: &UserProfile,
        professionals: Vec<Professional>,
        max_distance_km: f64,
        limit: usize,
    ) -> Vec<NearbyProfessional> {
        let Some(origin) = requester.location() else {
            return Vec::new();
        };

        let bbox = calculate_bounding_box(origin.y(), origin.x(), max_distance_km);

        let mut nearby: Vec<NearbyProfessional> = professionals
            .into_iter()
            .filter(|professional| professional.is_available)
            .filter_map(|professional| {
                let workshop = professional.workshop_location()?;
                if !is_within_bounding_box(workshop.y(), workshop.x(), &bbox) {
                    return None;
                }
                let distance = round_km(distance_between(workshop, origin));
                (distance <= max_distance_km).then_some(NearbyProfessional {
                    professional,
                    distance,
                })
            })
            .collect();

        nearby.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
        nearby.truncate(limit);
        nearby
    }

    /// Annotate every garment with its composite score, highest first
    pub fn rank_by_compatibility(&self, requester: &UserProfile, garments: Vec<Garment>) -> Vec<RankedGarment> {
        let mut ranked: Vec<RankedGarment> = garments
            .into_iter()
            .map(|garment| self.annotate(requester, garment))
            .collect();

        ranked.sort_by(|a, b| {
            b.match_score
                .partial_cmp(&a.match_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| cmp_distance(a.distance, b.distance))
                .then_with(|| b.garment.created_at.cmp(&a.garment.created_at))
        });

        ranked
    }

    /// Nearest first; garments whose owner has no location go last
    pub fn rank_by_proximity(&self, requester: &UserProfile, garments: Vec<Garment>) -> Vec<RankedGarment> {
        let mut ranked: Vec<RankedGarment> = garments
            .into_iter()
            .map(|garment| self.annotate(requester, garment))
            .collect();

        ranked.sort_by(|a, b| {
            cmp_distance(a.distance, b.distance)
                .then_with(|| b.garment.created_at.cmp(&a.garment.created_at))
        });

        ranked
    }

    /// Newest listing first
    pub fn rank_by_recency(&self, requester: &UserProfile, garments: Vec<Garment>) -> Vec<RankedGarment> {
        let mut ranked: Vec<RankedGarment> = garments
            .into_iter()
            .map(|garment| self.annotate(requester, garment))
            .collect();

        ranked.sort_by(|a, b| b.garment.created_at.cmp(&a.garment.created_at));

        ranked
    }

    fn annotate(&self, requester: &UserProfile, garment: Garment) -> RankedGarment {
        let distance = match (requester.location(), garment.owner_location()) {
            (Some(from), Some(to)) => Some(distance_between(from, to)),
            _ => None,
        };

        let compatibility = requester.measurements.and_then(|measurements| {
            compatibility_score(
                &measurements,
                &garment.measurements,
                &self.weights.penalties,
                self.weights.baseline,
            )
        });

        let score = composite_score(
            compatibility,
            distance,
            garment.rating,
            garment.rentals_count,
            &self.weights,
        );

        RankedGarment {
            garment,
            distance: distance.map(round_km),
            compatibility,
            match_score: round_score(score),
        }
    }
}

impl Default for Ranker {
    fn default() -> Self {
        Self::with_default_weights()
    }
}

/// Ascending distance with unknown distances last
fn cmp_distance(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Measurements;
    use chrono::{Duration, Utc};

    const SAO_PAULO: (f64, f64) = (-23.5505, -46.6333);

    fn requester(location: Option<(f64, f64)>, waist: Option<f64>) -> UserProfile {
        UserProfile {
            id: 1,
            name: "Renter".to_string(),
            latitude: location.map(|l| l.0),
            longitude: location.map(|l| l.1),
            measurements: waist.map(|w| Measurements {
                waist: Some(w),
                ..Default::default()
            }),
        }
    }

    fn garment(id: i64, waist: Option<f64>, owner_location: Option<(f64, f64)>, age_days: i64) -> Garment {
        Garment {
            id,
            owner_id: 100 + id,
            title: format!("Garment {}", id),
            category: "dress".to_string(),
            gender: "female".to_string(),
            price_per_day: 30.0,
            is_available: true,
            in_use: false,
            measurements: Measurements {
                waist,
                ..Default::default()
            },
            rating: None,
            rentals_count: 0,
            views_count: 0,
            owner_latitude: owner_location.map(|l| l.0),
            owner_longitude: owner_location.map(|l| l.1),
            created_at: Utc::now() - Duration::days(age_days),
        }
    }

    #[test]
    fn test_better_fit_ranks_first() {
        let ranker = Ranker::with_default_weights();
        let user = requester(Some(SAO_PAULO), Some(75.0));

        let candidates = vec![
            garment(1, Some(90.0), Some(SAO_PAULO), 1),
            garment(2, Some(75.0), Some(SAO_PAULO), 1),
        ];

        let result = ranker.search_and_rank(&user, candidates, &SearchFilters::default(), 10);

        assert_eq!(result.strategy, RankingStrategy::Compatibility);
        assert_eq!(result.garments[0].garment.id, 2);
        assert_eq!(result.garments[0].match_score, 100.0);
        assert_eq!(result.garments[0].distance, Some(0.0));
    }

    #[test]
    fn test_ineligible_garments_dropped() {
        let ranker = Ranker::with_default_weights();
        let user = requester(None, Some(75.0));

        let mut in_use = garment(1, Some(75.0), None, 1);
        in_use.in_use = true;
        let mut unavailable = garment(2, Some(75.0), None, 1);
        unavailable.is_available = false;

        let result = ranker.search_and_rank(
            &user,
            vec![in_use, unavailable, garment(3, None, None, 1)],
            &SearchFilters::default(),
            10,
        );

        assert_eq!(result.total_candidates, 3);
        assert_eq!(result.garments.len(), 1);
        assert_eq!(result.garments[0].garment.id, 3);
    }

    #[test]
    fn test_proximity_fallback_without_measurements() {
        let ranker = Ranker::with_default_weights();
        let user = requester(Some(SAO_PAULO), None);

        let candidates = vec![
            garment(1, None, None, 0),
            garment(2, None, Some((-23.70, -46.70)), 5),
            garment(3, None, Some((-23.56, -46.64)), 9),
        ];

        let result = ranker.search_and_rank(&user, candidates, &SearchFilters::default(), 10);

        assert_eq!(result.strategy, RankingStrategy::Proximity);
        let ids: Vec<i64> = result.garments.iter().map(|g| g.garment.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert!(result.garments[2].distance.is_none());
    }

    #[test]
    fn test_recency_fallback_without_location() {
        let ranker = Ranker::with_default_weights();
        let user = requester(None, None);

        let candidates = vec![
            garment(1, None, Some(SAO_PAULO), 10),
            garment(2, None, Some(SAO_PAULO), 1),
            garment(3, None, Some(SAO_PAULO), 5),
        ];

        let result = ranker.search_and_rank(&user, candidates, &SearchFilters::default(), 10);

        assert_eq!(result.strategy, RankingStrategy::Recency);
        let ids: Vec<i64> = result.garments.iter().map(|g| g.garment.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_candidate_without_overlap_or_location_still_ranks() {
        let ranker = Ranker::with_default_weights();
        let user = requester(Some(SAO_PAULO), Some(75.0));

        let mut loner = garment(1, None, None, 1);
        loner.rating = Some(5.0);
        loner.rentals_count = 2;

        let result = ranker.search_and_rank(&user, vec![loner], &SearchFilters::default(), 10);

        assert_eq!(result.garments.len(), 1);
        assert_eq!(result.garments[0].compatibility, None);
        assert_eq!(result.garments[0].distance, None);
        assert_eq!(result.garments[0].match_score, 12.0);
    }

    #[test]
    fn test_respects_limit() {
        let ranker = Ranker::with_default_weights();
        let user = requester(Some(SAO_PAULO), Some(75.0));

        let candidates: Vec<Garment> = (0..20)
            .map(|i| garment(i, Some(70.0 + i as f64), Some(SAO_PAULO), i))
            .collect();

        let result = ranker.search_and_rank(&user, candidates, &SearchFilters::default(), 5);
        assert_eq!(result.garments.len(), 5);
    }

    #[test]
    fn test_oldest_perfect_fit_beats_many_newer_listings() {
        let ranker = Ranker::with_default_weights();
        let user = requester(Some(SAO_PAULO), Some(75.0));

        let mut candidates: Vec<Garment> = (1..=600)
            .map(|i| garment(i, Some(85.0), Some(SAO_PAULO), i % 30))
            .collect();
        candidates.push(garment(999, Some(75.0), Some(SAO_PAULO), 3650));

        let result = ranker.search_and_rank(&user, candidates, &SearchFilters::default(), 20);

        assert_eq!(result.total_candidates, 601);
        assert_eq!(result.garments[0].garment.id, 999);
    }

    #[test]
    fn test_recommend_narrows_pool() {
        let ranker = Ranker::with_default_weights();
        let user = requester(Some(SAO_PAULO), Some(75.0));

        let mut own = garment(1, Some(75.0), Some(SAO_PAULO), 1);
        own.owner_id = user.id;
        let mut poorly_rated = garment(2, Some(75.0), Some(SAO_PAULO), 1);
        poorly_rated.rating = Some(2.5);
        let mut suit = garment(3, Some(75.0), Some(SAO_PAULO), 1);
        suit.category = "suit".to_string();
        let dress = garment(4, Some(80.0), Some(SAO_PAULO), 1);

        let preferred: HashSet<String> = ["dress".to_string()].into_iter().collect();
        let result = ranker.recommend(&user, vec![own, poorly_rated, suit, dress], &preferred, 10);

        let ids: Vec<i64> = result.garments.iter().map(|g| g.garment.id).collect();
        assert_eq!(ids, vec![4]);
    }

    #[test]
    fn test_nearby_professionals_cutoff_and_order() {
        let ranker = Ranker::with_default_weights();
        let user = requester(Some(SAO_PAULO), None);

        let professional = |id: i64, location: Option<(f64, f64)>| Professional {
            id,
            user_id: 200 + id,
            name: format!("Tailor {}", id),
            kind: "tailor".to_string(),
            is_available: true,
            workshop_address: None,
            workshop_latitude: location.map(|l| l.0),
            workshop_longitude: location.map(|l| l.1),
            rating: 4.5,
        };

        let professionals = vec![
            professional(1, Some((-22.9068, -43.1729))), // Rio, ~360km
            professional(2, Some((-23.60, -46.70))),
            professional(3, None),
            professional(4, Some((-23.5510, -46.6340))),
        ];

        let nearby = ranker.nearby_professionals(&user, professionals, 50.0, 10);
        let ids: Vec<i64> = nearby.iter().map(|p| p.professional.id).collect();
        assert_eq!(ids, vec![4, 2]);

        let without_location = requester(None, None);
        assert!(ranker
            .nearby_professionals(&without_location, vec![professional(4, Some(SAO_PAULO))], 50.0, 10)
            .is_empty());
    }

    #[test]
    fn test_nearby_professionals_across_antimeridian() {
        let ranker = Ranker::with_default_weights();
        let user = requester(Some((-17.0, 179.95)), None);

        let professional = |id: i64, lon: f64| Professional {
            id,
            user_id: 300 + id,
            name: format!("Seamstress {}", id),
            kind: "seamstress".to_string(),
            is_available: true,
            workshop_address: None,
            workshop_latitude: Some(-17.0),
            workshop_longitude: Some(lon),
            rating: 4.0,
        };

        let nearby = ranker.nearby_professionals(
            &user,
            vec![professional(1, -179.9), professional(2, 170.0)],
            50.0,
            10,
        );

        let ids: Vec<i64> = nearby.iter().map(|p| p.professional.id).collect();
        assert_eq!(ids, vec![1]);
        assert!(nearby[0].distance < 20.0);
    }
}
