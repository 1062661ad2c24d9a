use std::collections::HashSet;

use crate::models::{Garment, SearchFilters};

/// Minimum rating for a rated garment to be recommended
pub const RECOMMENDATION_MIN_RATING: f64 = 4.0;

/// A garment can be ranked only while it is available and not out on a rental
#[inline]
pub fn is_eligible(garment: &Garment) -> bool {
    garment.is_available && !garment.in_use
}

/// Check a garment against the search filters
#[inline]
pub fn matches_search_filters(garment: &Garment, filters: &SearchFilters) -> bool {
    if let Some(category) = &filters.category {
        if &garment.category != category {
            return false;
        }
    }

    if let Some(gender) = &filters.gender {
        if &garment.gender != gender {
            return false;
        }
    }

    if let Some(min) = filters.min_price {
        if garment.price_per_day < min {
            return false;
        }
    }

    if let Some(max) = filters.max_price {
        if garment.price_per_day > max {
            return false;
        }
    }

    true
}

/// Unrated garments or garments rated at least 4.0
#[inline]
pub fn is_well_rated(garment: &Garment) -> bool {
    match garment.rating {
        None => true,
        Some(rating) => rating >= RECOMMENDATION_MIN_RATING,
    }
}

/// Narrow the recommendation pool for a requester
///
/// Excludes the requester's own listings, restricts to the preferred
/// categories when there are any, and keeps only well-rated garments.
#[inline]
pub fn matches_recommendation_pool(
    garment: &Garment,
    requester_id: i64,
    preferred_categories: &HashSet<String>,
) -> bool {
    if !is_eligible(garment) || garment.owner_id == requester_id {
        return false;
    }

    if !preferred_categories.is_empty() && !preferred_categories.contains(&garment.category) {
        return false;
    }

    is_well_rated(garment)
}
