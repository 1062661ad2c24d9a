use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::domain::{Measurements, SearchFilters};

/// Garment search request
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct SearchRequest {
    #[validate(length(min = 1))]
    pub category: Option<String>,
    #[validate(custom(function = "validate_garment_gender"))]
    pub gender: Option<String>,
    #[validate(range(min = 0.0))]
    pub min_price: Option<f64>,
    #[validate(range(min = 0.0))]
    pub max_price: Option<f64>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u16>,
}

impl SearchRequest {
    pub fn filters(&self) -> SearchFilters {
        SearchFilters {
            category: self.category.clone(),
            gender: self.gender.clone(),
            min_price: self.min_price,
            max_price: self.max_price,
        }
    }
}

fn validate_garment_gender(gender: &str) -> Result<(), ValidationError> {
    match gender {
        "male" | "female" | "unisex" => Ok(()),
        _ => Err(ValidationError::new("gender")),
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct RecommendationsQuery {
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u16>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct NearbyProfessionalsQuery {
    #[validate(range(min = 0.0))]
    pub max_distance: Option<f64>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u16>,
}

/// Inbox page, 1-based
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct NegotiationsQuery {
    #[validate(range(min = 1))]
    pub page: Option<u32>,
}

impl NegotiationsQuery {
    pub const PAGE_SIZE: u32 = 20;

    /// Rows to skip for the requested page
    pub fn offset(&self) -> i64 {
        i64::from(self.page.unwrap_or(1).saturating_sub(1)) * i64::from(Self::PAGE_SIZE)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 1000))]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AssignProfessionalRequest {
    #[validate(range(min = 1))]
    pub professional_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ScanCheckpointRequest {
    #[validate(length(min = 1))]
    pub qr_code: String,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

/// Query for both the long-poll and the quick update check
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatesQuery {
    #[serde(default)]
    pub last_checkpoint_id: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateMeasurementsRequest {
    #[validate(range(min = 0.0))]
    pub shoulder_width: Option<f64>,
    #[validate(range(min = 0.0))]
    pub chest: Option<f64>,
    #[validate(range(min = 0.0))]
    pub waist: Option<f64>,
    #[validate(range(min = 0.0))]
    pub hip: Option<f64>,
    #[validate(range(min = 0.0))]
    pub inseam: Option<f64>,
    #[validate(range(min = 0.0))]
    pub shoe_size: Option<f64>,
}

impl From<&UpdateMeasurementsRequest> for Measurements {
    fn from(req: &UpdateMeasurementsRequest) -> Self {
        Measurements {
            shoulder_width: req.shoulder_width,
            chest: req.chest,
            waist: req.waist,
            hip: req.hip,
            inseam: req.inseam,
            shoe_size: req.shoe_size,
        }
    }
}
