// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    BoundingBox, Checkpoint, CheckpointStatus, CheckpointType, DimensionPenalty, Garment,
    Measurements, NearbyProfessional, Negotiation, NegotiationMessage, NegotiationStatus,
    NegotiationSummary, NegotiationThread, NegotiationType, PenaltyTable, Professional, ProximityBucket, RankedGarment, RankingWeights,
    SearchFilters, UserProfile,
};
pub use requests::{
    AssignProfessionalRequest, NearbyProfessionalsQuery, NegotiationsQuery, RecommendationsQuery,
    ScanCheckpointRequest, SearchRequest, SendMessageRequest, UpdateMeasurementsRequest,
    UpdatesQuery,
};
pub use responses::{DataResponse, ErrorResponse, HealthResponse, UpdatesResponse};
