// Route exports
pub mod checkpoints;
pub mod health;
pub mod matching;
pub mod negotiations;
pub mod updates;
pub mod users;

use actix_web::web;
use std::sync::Arc;
use tokio::sync::watch;

use crate::config::MatchingSettings;
use crate::core::{handoff::Party, NegotiationStore, Ranker, UpdateWatcher};
use crate::error::{ApiError, ApiResult};
use crate::models::{Negotiation, UserProfile};
use crate::services::{CacheManager, PostgresClient};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub postgres: Arc<PostgresClient>,
    pub cache: Arc<CacheManager>,
    pub ranker: Ranker,
    pub watcher: UpdateWatcher,
    pub matching: MatchingSettings,
    /// Flips to `true` once the server starts shutting down
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    /// Profile of the authenticated caller
    pub(crate) async fn requester(&self, user_id: i64) -> ApiResult<UserProfile> {
        self.postgres
            .user_profile(user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
    }

    /// Load a negotiation and the caller's roles in it
    pub(crate) async fn negotiation_for(&self, negotiation_id: i64, user_id: i64) -> ApiResult<(Negotiation, Party)> {
        let negotiation = self.postgres.require_negotiation(negotiation_id).await?;

        let professional_id = match negotiation.professional_id {
            Some(_) => self.postgres.professional_id_for_user(user_id).await?,
            None => None,
        };

        let party = Party::resolve(&negotiation, user_id, professional_id);
        Ok((negotiation, party))
    }

    /// Wake update waiters after a mutation
    ///
    /// The mutation is already committed, so a marker store failure only
    /// delays waiters on other instances until their next store check.
    pub(crate) async fn touch(&self, negotiation_id: i64) {
        if let Err(e) = self.watcher.touch(self.cache.as_ref(), negotiation_id).await {
            tracing::warn!("Failed to write update marker for negotiation {}: {}", negotiation_id, e);
        }
    }

    /// Resolves once shutdown starts; never resolves otherwise
    pub(crate) fn shutdown_signal(&self) -> impl std::future::Future<Output = ()> + 'static {
        let mut shutdown = self.shutdown.clone();
        async move {
            if shutdown.wait_for(|stopping| *stopping).await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .configure(health::configure)
            .configure(users::configure)
            .configure(matching::configure)
            .configure(negotiations::configure)
            .configure(checkpoints::configure)
            .configure(updates::configure),
    );
}
