//! Closet Algo - garment ranking and negotiation updates for the Closet rental marketplace
//!
//! This library provides the measurement-compatibility ranking used by the
//! garment search, and the bounded wait that lets clients follow a
//! negotiation thread without tight re-polling.

pub mod auth;
pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{
    compatibility_score, distance::haversine_distance, Ranker, RankingStrategy, UpdateWatcher,
};
pub use models::{Garment, Measurements, RankedGarment, RankingWeights, UserProfile};
