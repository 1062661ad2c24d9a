use crate::models::{ProximityBucket, RankingWeights};

/// Composite ranking score for a garment
///
/// Scoring formula:
/// score = (
///     compatibility * 0.6 +        # Only when compatibility is defined
///     proximity_points +           # 40/30/20/10/0 by distance step
///     rating / 5 * 10 +            # Only when the garment has a rating
///     min(5, rentals_count)        # Popularity
/// )
///
/// An undefined compatibility omits its term entirely; it is never
/// substituted with zero.
pub fn composite_score(
    compatibility: Option<f64>,
    distance_km: Option<f64>,
    rating: Option<f64>,
    rentals_count: i32,
    weights: &RankingWeights,
) -> f64 {
    let mut score = 0.0;

    if let Some(compatibility) = compatibility {
        score += compatibility * weights.compatibility;
    }

    if let Some(distance_km) = distance_km {
        score += proximity_points(distance_km, &weights.proximity);
    }

    score += rating_points(rating, weights);
    score += popularity_points(rentals_count, weights.popularity_cap);

    score
}

/// Points for the first bucket whose radius covers the distance
#[inline]
pub fn proximity_points(distance_km: f64, buckets: &[ProximityBucket]) -> f64 {
    buckets
        .iter()
        .find(|bucket| distance_km <= bucket.max_km)
        .map(|bucket| bucket.points)
        .unwrap_or(0.0)
}

/// Rating bonus (0-10); unrated garments earn nothing
#[inline]
pub fn rating_points(rating: Option<f64>, weights: &RankingWeights) -> f64 {
    match rating {
        Some(rating) if rating > 0.0 => rating / weights.rating_scale * weights.rating_points,
        _ => 0.0,
    }
}

/// Popularity bonus, one point per rental up to the cap
#[inline]
pub fn popularity_points(rentals_count: i32, cap: f64) -> f64 {
    if rentals_count <= 0 {
        return 0.0;
    }
    cap.min(rentals_count as f64)
}

/// Round a score to two decimals for display
#[inline]
pub fn round_score(score: f64) -> f64 {
    (score * 100.0).round() / 100.0
}
