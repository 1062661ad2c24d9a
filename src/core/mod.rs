// Core algorithm exports
pub mod compatibility;
pub mod distance;
pub mod filters;
pub mod handoff;
pub mod ranker;
pub mod scoring;
pub mod watcher;

pub use compatibility::compatibility_score;
pub use distance::{calculate_bounding_box, haversine_distance, is_within_bounding_box};
pub use handoff::{HandoffError, Party};
pub use ranker::{Ranker, RankingResult, RankingStrategy};
pub use scoring::composite_score;
pub use watcher::{MarkerStore, NegotiationStore, UpdateReport, UpdateWatcher, WatchError};
