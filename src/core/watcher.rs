//! Negotiation update watcher
//!
//! Lets a client wait for new checkpoints or any other change on a
//! negotiation thread. Mutations publish on an in-process channel keyed by
//! negotiation id and write a short-lived marker to the shared key-value
//! store, so a waiter on this instance wakes immediately while waiters on
//! other instances notice within one polling interval.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{sleep, sleep_until, Instant};

use crate::core::handoff::Party;
use crate::models::{Checkpoint, Negotiation};
use crate::services::{CacheError, PostgresError};

/// Read access the watcher needs from the relational store
#[async_trait]
pub trait NegotiationStore: Send + Sync {
    async fn negotiation(&self, negotiation_id: i64) -> Result<Option<Negotiation>, PostgresError>;

    /// Professional profile id of a user, if they registered as one
    async fn professional_id_for_user(&self, user_id: i64) -> Result<Option<i64>, PostgresError>;

    /// Checkpoints of a negotiation with id strictly greater than `after_id`
    async fn checkpoints_after(
        &self,
        negotiation_id: i64,
        after_id: i64,
    ) -> Result<Vec<Checkpoint>, PostgresError>;
}

/// Shared, auto-expiring "thread touched" markers
#[async_trait]
pub trait MarkerStore: Send + Sync {
    async fn touched_at(&self, negotiation_id: i64) -> Result<Option<DateTime<Utc>>, CacheError>;

    async fn mark_touched(&self, negotiation_id: i64, at: DateTime<Utc>) -> Result<(), CacheError>;
}

/// Watcher failures
///
/// A timeout is not an error: it is a report without updates.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("negotiation {0} not found")]
    NotFound(i64),

    #[error("user {user_id} is not a party to negotiation {negotiation_id}")]
    Forbidden { negotiation_id: i64, user_id: i64 },

    #[error("negotiation store unavailable: {0}")]
    Store(#[from] PostgresError),

    #[error("marker store unavailable: {0}")]
    Marker(#[from] CacheError),

    #[error("wait cancelled")]
    Cancelled,
}

/// Outcome of a check or of a completed wait
#[derive(Debug, Clone)]
pub struct UpdateReport {
    pub has_updates: bool,
    pub checkpoints: Vec<Checkpoint>,
    /// Current negotiation state
    pub negotiation: Negotiation,
}

type TouchSender = Arc<watch::Sender<Option<DateTime<Utc>>>>;

/// In-process publish side of the touched markers, one channel per negotiation
///
/// Channels expire after `idle` without use, mirroring the marker TTL.
#[derive(Clone)]
pub struct TouchSignals {
    channels: moka::future::Cache<i64, TouchSender>,
}

impl TouchSignals {
    pub fn new(idle: Duration) -> Self {
        Self {
            channels: moka::future::CacheBuilder::new(100_000)
                .time_to_idle(idle)
                .build(),
        }
    }

    async fn channel(&self, negotiation_id: i64) -> TouchSender {
        self.channels
            .get_with(negotiation_id, async { Arc::new(watch::channel(None).0) })
            .await
    }

    /// Receiver that resolves `changed()` on the next touch
    pub async fn subscribe(&self, negotiation_id: i64) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.channel(negotiation_id).await.subscribe()
    }

    pub async fn notify(&self, negotiation_id: i64, at: DateTime<Utc>) {
        self.channel(negotiation_id).await.send_replace(Some(at));
    }

    pub async fn last_touched(&self, negotiation_id: i64) -> Option<DateTime<Utc>> {
        let sender = self.channels.get(&negotiation_id).await?;
        let last = *sender.borrow();
        last
    }
}

/// Bounded wait for negotiation updates
#[derive(Clone)]
pub struct UpdateWatcher {
    signals: TouchSignals,
    ceiling: Duration,
    interval: Duration,
}

impl UpdateWatcher {
    /// `ceiling` bounds a single wait, `interval` is the store re-check cadence
    pub fn new(ceiling: Duration, interval: Duration, marker_ttl: Duration) -> Self {
        Self {
            signals: TouchSignals::new(marker_ttl),
            ceiling,
            interval,
        }
    }

    /// Record a mutation on a negotiation and wake its waiters
    ///
    /// The local signal always fires; a marker store failure is returned so
    /// the caller can log it, but the mutation itself already happened.
    pub async fn touch<M>(&self, markers: &M, negotiation_id: i64) -> Result<(), CacheError>
    where
        M: MarkerStore + ?Sized,
    {
        let now = Utc::now();
        self.signals.notify(negotiation_id, now).await;
        markers.mark_touched(negotiation_id, now).await
    }

    /// Load the negotiation and check `user_id` may see it
    pub async fn authorize<S>(
        &self,
        store: &S,
        negotiation_id: i64,
        user_id: i64,
    ) -> Result<Negotiation, WatchError>
    where
        S: NegotiationStore + ?Sized,
    {
        let negotiation = store
            .negotiation(negotiation_id)
            .await?
            .ok_or(WatchError::NotFound(negotiation_id))?;

        let professional_id = match negotiation.professional_id {
            Some(_) => store.professional_id_for_user(user_id).await?,
            None => None,
        };

        if !Party::resolve(&negotiation, user_id, professional_id).is_party() {
            return Err(WatchError::Forbidden { negotiation_id, user_id });
        }

        Ok(negotiation)
    }

    /// Non-blocking variant: one check, no waiting
    pub async fn check<S>(
        &self,
        store: &S,
        negotiation_id: i64,
        user_id: i64,
        after_checkpoint_id: i64,
    ) -> Result<UpdateReport, WatchError>
    where
        S: NegotiationStore + ?Sized,
    {
        let negotiation = self.authorize(store, negotiation_id, user_id).await?;
        let checkpoints = store.checkpoints_after(negotiation_id, after_checkpoint_id).await?;

        Ok(UpdateReport {
            has_updates: !checkpoints.is_empty(),
            checkpoints,
            negotiation,
        })
    }

    /// Wait up to the ceiling for checkpoints newer than `after_checkpoint_id`
    /// or for a touch newer than the start of the wait
    ///
    /// Authorization is checked before any waiting. Store failures end the
    /// wait with an error, never with an empty report. `cancelled` resolving
    /// aborts the wait with [`WatchError::Cancelled`].
    pub async fn wait_for_updates<S, M, C>(
        &self,
        store: &S,
        markers: &M,
        negotiation_id: i64,
        user_id: i64,
        after_checkpoint_id: i64,
        cancelled: C,
    ) -> Result<UpdateReport, WatchError>
    where
        S: NegotiationStore + ?Sized,
        M: MarkerStore + ?Sized,
        C: Future<Output = ()>,
    {
        let negotiation = self.authorize(store, negotiation_id, user_id).await?;

        let started_at = Utc::now();
        let deadline = Instant::now() + self.ceiling;

        // Subscribe before the first check so a touch in between is not lost
        let mut touches = self.signals.subscribe(negotiation_id).await;
        tokio::pin!(cancelled);

        loop {
            let checkpoints = store.checkpoints_after(negotiation_id, after_checkpoint_id).await?;
            if !checkpoints.is_empty() {
                return self.updated(store, negotiation_id, checkpoints).await;
            }

            if self.touched_since(markers, negotiation_id, started_at).await? {
                return self.updated(store, negotiation_id, Vec::new()).await;
            }

            tokio::select! {
                biased;
                _ = &mut cancelled => return Err(WatchError::Cancelled),
                _ = sleep_until(deadline) => break,
                changed = touches.changed() => {
                    if changed.is_err() {
                        // Channel expired; later touches go to a fresh one
                        touches = self.signals.subscribe(negotiation_id).await;
                    }
                }
                _ = sleep(self.interval) => {}
            }
        }

        tracing::debug!(negotiation_id, user_id, "update wait reached its ceiling");

        Ok(UpdateReport {
            has_updates: false,
            checkpoints: Vec::new(),
            negotiation,
        })
    }

    async fn touched_since<M>(
        &self,
        markers: &M,
        negotiation_id: i64,
        since: DateTime<Utc>,
    ) -> Result<bool, CacheError>
    where
        M: MarkerStore + ?Sized,
    {
        if let Some(at) = self.signals.last_touched(negotiation_id).await {
            if at > since {
                return Ok(true);
            }
        }

        Ok(markers
            .touched_at(negotiation_id)
            .await?
            .map(|at| at > since)
            .unwrap_or(false))
    }

    async fn updated<S>(
        &self,
        store: &S,
        negotiation_id: i64,
        checkpoints: Vec<Checkpoint>,
    ) -> Result<UpdateReport, WatchError>
    where
        S: NegotiationStore + ?Sized,
    {
        let negotiation = store
            .negotiation(negotiation_id)
            .await?
            .ok_or(WatchError::NotFound(negotiation_id))?;

        Ok(UpdateReport {
            has_updates: true,
            checkpoints,
            negotiation,
        })
    }
}
