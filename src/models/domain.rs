use chrono::{DateTime, Utc};
use geo::Point;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body-measurement set shared by user profiles and garments
///
/// Every dimension is optional. A dimension that is absent (or not a
/// positive number) is left out of compatibility scoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    #[serde(default)]
    pub shoulder_width: Option<f64>,
    #[serde(default)]
    pub chest: Option<f64>,
    #[serde(default)]
    pub waist: Option<f64>,
    #[serde(default)]
    pub hip: Option<f64>,
    #[serde(default)]
    pub inseam: Option<f64>,
    #[serde(default)]
    pub shoe_size: Option<f64>,
}

impl Measurements {
    /// True when no dimension carries a usable value
    pub fn is_empty(&self) -> bool {
        [
            self.shoulder_width,
            self.chest,
            self.waist,
            self.hip,
            self.inseam,
            self.shoe_size,
        ]
        .iter()
        .all(|value| usable(*value).is_none())
    }
}

/// Positive, finite measurement or nothing
#[inline]
pub fn usable(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

fn point(latitude: Option<f64>, longitude: Option<f64>) -> Option<Point<f64>> {
    match (latitude, longitude) {
        (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some(Point::new(lon, lat)),
        _ => None,
    }
}

/// Marketplace user as seen by the ranking engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub measurements: Option<Measurements>,
}

impl UserProfile {
    pub fn location(&self) -> Option<Point<f64>> {
        point(self.latitude, self.longitude)
    }

    pub fn has_measurements(&self) -> bool {
        self.measurements.map(|m| !m.is_empty()).unwrap_or(false)
    }
}

/// Garment listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Garment {
    pub id: i64,
    pub owner_id: i64,
    pub title: String,
    pub category: String,
    pub gender: String,
    pub price_per_day: f64,
    pub is_available: bool,
    pub in_use: bool,
    #[serde(flatten)]
    pub measurements: Measurements,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub rentals_count: i32,
    #[serde(default)]
    pub views_count: i32,
    /// Location of the listing's owner, which is where the garment is picked up
    #[serde(default)]
    pub owner_latitude: Option<f64>,
    #[serde(default)]
    pub owner_longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Garment {
    pub fn owner_location(&self) -> Option<Point<f64>> {
        point(self.owner_latitude, self.owner_longitude)
    }
}

/// Garment with its ranking annotations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedGarment {
    #[serde(flatten)]
    pub garment: Garment,
    /// Distance to the requester in km, one decimal
    pub distance: Option<f64>,
    pub compatibility: Option<f64>,
    pub match_score: f64,
}

/// Tailoring professional
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Professional {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub is_available: bool,
    #[serde(default)]
    pub workshop_address: Option<String>,
    #[serde(default)]
    pub workshop_latitude: Option<f64>,
    #[serde(default)]
    pub workshop_longitude: Option<f64>,
    #[serde(default)]
    pub rating: f64,
}

impl Professional {
    pub fn workshop_location(&self) -> Option<Point<f64>> {
        point(self.workshop_latitude, self.workshop_longitude)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyProfessional {
    #[serde(flatten)]
    pub professional: Professional,
    pub distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "negotiation_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NegotiationType {
    Rental,
    Adjustment,
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "negotiation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NegotiationStatus {
    Active,
    Accepted,
    Rejected,
    Cancelled,
    Completed,
}

/// Negotiation thread between a renter (initiator) and a garment owner (recipient)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Negotiation {
    pub id: i64,
    pub clothing_item_id: i64,
    pub initiator_id: i64,
    pub recipient_id: i64,
    pub professional_id: Option<i64>,
    pub professional_confirmed: bool,
    #[serde(rename = "type")]
    pub kind: NegotiationType,
    pub status: NegotiationStatus,
    pub proposed_price: Option<f64>,
    pub responded_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationMessage {
    pub id: i64,
    pub negotiation_id: i64,
    pub sender_id: i64,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// A negotiation with its whole message thread, oldest message first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationThread {
    #[serde(flatten)]
    pub negotiation: Negotiation,
    pub messages: Vec<NegotiationMessage>,
}

/// Inbox entry: the negotiation, its latest message and what the viewer has not read
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationSummary {
    #[serde(flatten)]
    pub negotiation: Negotiation,
    pub last_message: Option<NegotiationMessage>,
    pub unread_count: i64,
}

/// Physical handoff stage a checkpoint marks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "checkpoint_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CheckpointType {
    DeliveryToProfessional,
    ReturnFromProfessional,
    ReturnToOwner,
}

impl CheckpointType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointType::DeliveryToProfessional => "delivery_to_professional",
            CheckpointType::ReturnFromProfessional => "return_from_professional",
            CheckpointType::ReturnToOwner => "return_to_owner",
        }
    }
}

impl std::fmt::Display for CheckpointType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "checkpoint_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CheckpointStatus {
    Pending,
    Scanned,
}

/// Single-use scan token marking a handoff milestone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: i64,
    pub negotiation_id: i64,
    #[serde(rename = "type")]
    pub kind: CheckpointType,
    pub qr_code: Uuid,
    pub status: CheckpointStatus,
    pub generated_by_user_id: i64,
    pub scanned_by_user_id: Option<i64>,
    pub scanned_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn is_scanned(&self) -> bool {
        self.status == CheckpointStatus::Scanned
    }
}

/// Garment search filters applied before ranking
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    pub category: Option<String>,
    pub gender: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

/// Geospatial bounding box
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Longitude range wraps past ±180°
    pub fn crosses_antimeridian(&self) -> bool {
        self.min_lon > self.max_lon
    }
}

/// Penalty applied for one measurement dimension
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DimensionPenalty {
    pub per_unit: f64,
    pub cap: f64,
}

impl DimensionPenalty {
    pub const fn new(per_unit: f64, cap: f64) -> Self {
        Self { per_unit, cap }
    }
}

/// Per-dimension penalty table for compatibility scoring
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PenaltyTable {
    pub shoulder_width: DimensionPenalty,
    pub chest: DimensionPenalty,
    pub waist: DimensionPenalty,
    pub hip: DimensionPenalty,
    pub inseam: DimensionPenalty,
    pub shoe_size: DimensionPenalty,
}

impl Default for PenaltyTable {
    fn default() -> Self {
        Self {
            shoulder_width: DimensionPenalty::new(2.0, 20.0),
            chest: DimensionPenalty::new(1.5, 20.0),
            waist: DimensionPenalty::new(1.5, 20.0),
            hip: DimensionPenalty::new(1.5, 15.0),
            inseam: DimensionPenalty::new(2.0, 15.0),
            shoe_size: DimensionPenalty::new(10.0, 30.0),
        }
    }
}

/// Distance step: anything within `max_km` earns `points`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityBucket {
    pub max_km: f64,
    pub points: f64,
}

/// Ranking constants
#[derive(Debug, Clone, PartialEq)]
pub struct RankingWeights {
    pub baseline: f64,
    pub penalties: PenaltyTable,
    pub compatibility: f64,
    /// Ordered by ascending `max_km`
    pub proximity: Vec<ProximityBucket>,
    pub rating_points: f64,
    pub rating_scale: f64,
    pub popularity_cap: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            baseline: 100.0,
            penalties: PenaltyTable::default(),
            compatibility: 0.6,
            proximity: vec![
                ProximityBucket { max_km: 5.0, points: 40.0 },
                ProximityBucket { max_km: 10.0, points: 30.0 },
                ProximityBucket { max_km: 20.0, points: 20.0 },
                ProximityBucket { max_km: 50.0, points: 10.0 },
            ],
            rating_points: 10.0,
            rating_scale: 5.0,
            popularity_cap: 5.0,
        }
    }
}
