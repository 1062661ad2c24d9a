use crate::models::{domain::usable, DimensionPenalty, Measurements, PenaltyTable};

/// Body-measurement compatibility (0-100) between a user and a garment
///
/// Starts from `baseline` and subtracts a capped penalty for every dimension
/// present on both sides. Returns `None` when no dimension overlaps: an
/// undefined compatibility is not a zero and must be left out of any sum.
pub fn compatibility_score(
    user: &Measurements,
    garment: &Measurements,
    penalties: &PenaltyTable,
    baseline: f64,
) -> Option<f64> {
    let dimensions = [
        (user.shoulder_width, garment.shoulder_width, penalties.shoulder_width),
        (user.chest, garment.chest, penalties.chest),
        (user.waist, garment.waist, penalties.waist),
        (user.hip, garment.hip, penalties.hip),
        (user.inseam, garment.inseam, penalties.inseam),
        (user.shoe_size, garment.shoe_size, penalties.shoe_size),
    ];

    let mut score = baseline;
    let mut compared = 0;

    for (mine, theirs, penalty) in dimensions {
        if let (Some(mine), Some(theirs)) = (usable(mine), usable(theirs)) {
            score -= dimension_penalty(mine, theirs, penalty);
            compared += 1;
        }
    }

    if compared == 0 {
        return None;
    }

    Some(score.max(0.0))
}

/// Penalty for one dimension: `per_unit * |diff|`, capped
#[inline]
pub fn dimension_penalty(a: f64, b: f64, penalty: DimensionPenalty) -> f64 {
    ((a - b).abs() * penalty.per_unit).min(penalty.cap)
}
