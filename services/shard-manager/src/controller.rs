//! Shard manager controller.
//!
//! The controller is the single writer to the store. It runs two kinds of
//! pass, never concurrently:
//! - **Reconciliation**: once per change notification (and after a resumed
//!   subscription), recompute the full shard mapping and write the changes.
//! - **Registration**: on a fixed interval, create predefined shards that are
//!   missing from the store.
//!
//! Every pass reads a fresh snapshot. A failed read aborts the pass before
//! any write; the next trigger retries.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn, Level};
use upsf_reconcile::{ensure_predefined, reconcile, Policy, ShardDefaults};

use crate::store::{Notification, ShardStore, StoreError};

#[derive(Debug, Error)]
pub enum PassError {
    #[error("failed to read snapshot: {0}")]
    SnapshotFetch(#[source] StoreError),
}

/// What woke the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// An object changed in the store.
    Notification(Notification),

    /// The subscription was re-established; earlier changes may have been missed.
    Resync,
}

/// Controller configuration.
#[derive(Debug, Clone, Default)]
pub struct ControllerConfig {
    /// Interval between periodic registrar passes; `None` leaves only the
    /// startup pass.
    pub registrar_interval: Option<Duration>,

    /// Attributes for created shards.
    pub defaults: ShardDefaults,
}

/// Statistics from a reconciliation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassStats {
    pub shards: usize,
    pub updated: usize,
    pub failed: usize,
    pub unplaced: usize,
}

/// Statistics from a registrar pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegistrarStats {
    pub templates: usize,
    pub created: usize,
    pub failed: usize,
}

pub struct Controller<S> {
    store: Arc<S>,
    policy: Arc<Policy>,
    config: ControllerConfig,

    /// Held for the whole of every pass.
    pass_lock: Mutex<()>,
}

impl<S: ShardStore> Controller<S> {
    pub fn new(store: Arc<S>, policy: Arc<Policy>, config: ControllerConfig) -> Self {
        Self {
            store,
            policy,
            config,
            pass_lock: Mutex::new(()),
        }
    }

    /// Run one reconciliation pass.
    #[instrument(skip(self))]
    pub async fn reconcile_once(&self) -> Result<PassStats, PassError> {
        let _pass = self.pass_lock.lock().await;

        let snapshot = self
            .store
            .read_snapshot()
            .await
            .map_err(PassError::SnapshotFetch)?;

        let plan = reconcile(&snapshot, &self.policy);

        if plan.no_user_planes && !plan.changes.is_empty() {
            warn!(
                shards = plan.changes.len(),
                "No user planes available, resetting all mapped shards"
            );
        }
        for (shard, user_plane) in &plan.unavailable_bindings {
            warn!(
                shard = %shard,
                user_plane = %user_plane,
                "Statically bound user plane is not available, unmapping shard"
            );
        }
        if !plan.unplaced.is_empty() {
            info!(
                shards = ?plan.unplaced,
                "No admissible user plane for unbound shards"
            );
        }

        let mut stats = PassStats {
            shards: plan.shards,
            unplaced: plan.unplaced.len(),
            ..Default::default()
        };

        for change in &plan.changes {
            match self.store.update_shard(change).await {
                Ok(()) => {
                    info!(
                        shard = %change.shard,
                        from = %change.previous_user_plane,
                        to = %change.assignment.user_plane,
                        network_connections = ?change.assignment.network_connections,
                        "Updated shard assignment"
                    );
                    stats.updated += 1;
                }
                Err(e) => {
                    warn!(
                        shard = %change.shard,
                        error = %e,
                        "Failed to update shard, skipping"
                    );
                    stats.failed += 1;
                }
            }
        }

        if plan.changes.is_empty() {
            debug!(shards = stats.shards, "Shard mapping converged, no update needed");
        } else {
            info!(
                shards = stats.shards,
                updated = stats.updated,
                failed = stats.failed,
                unplaced = stats.unplaced,
                "Reconciliation pass complete"
            );
            if stats.updated > 0 && tracing::enabled!(Level::DEBUG) {
                self.dump_shards().await;
            }
        }

        Ok(stats)
    }

    /// Run one registrar pass.
    #[instrument(skip(self))]
    pub async fn register_once(&self) -> Result<RegistrarStats, PassError> {
        let _pass = self.pass_lock.lock().await;

        let snapshot = self
            .store
            .read_snapshot()
            .await
            .map_err(PassError::SnapshotFetch)?;

        let missing = ensure_predefined(&snapshot, &self.policy, &self.config.defaults);
        let mut stats = RegistrarStats {
            templates: self.policy.templates().len(),
            ..Default::default()
        };

        for shard in &missing {
            match self.store.create_shard(shard).await {
                Ok(()) => {
                    info!(
                        shard = %shard.name,
                        max_session_count = shard.max_session_count,
                        prefixes = ?shard.prefixes,
                        user_plane = %shard.desired_user_plane,
                        "Created predefined shard"
                    );
                    stats.created += 1;
                }
                Err(e) => {
                    warn!(shard = %shard.name, error = %e, "Failed to create shard");
                    stats.failed += 1;
                }
            }
        }

        if !missing.is_empty() {
            info!(
                templates = stats.templates,
                created = stats.created,
                failed = stats.failed,
                "Registrar pass complete"
            );
        }

        Ok(stats)
    }

    /// Log every shard's assignment. Read errors are ignored.
    async fn dump_shards(&self) {
        let Ok(snapshot) = self.store.read_snapshot().await else {
            return;
        };
        for shard in &snapshot.shards {
            debug!(
                shard = %shard.name,
                desired_user_plane = %shard.desired_user_plane,
                current_user_plane = %shard.current_user_plane,
                "Shard dump"
            );
        }
    }

    /// Run the controller until shutdown is signaled or the trigger queue closes.
    ///
    /// Starts with a registrar pass (when the policy defines predefined
    /// shards) and a reconciliation pass. Later registrar passes run on the
    /// configured interval and take precedence over queued triggers. Shutdown
    /// is only observed between passes.
    pub async fn run(&self, mut triggers: mpsc::Receiver<Trigger>, mut shutdown: watch::Receiver<bool>) {
        info!(
            registrar_interval_secs = self.config.registrar_interval.map(|i| i.as_secs()),
            bindings = self.policy.bindings().count(),
            templates = self.policy.templates().len(),
            "Starting shard manager controller"
        );

        if !self.policy.templates().is_empty() {
            self.run_registrar().await;
        }
        self.run_reconcile().await;

        let mut registrar = self.config.registrar_interval.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Controller shutting down");
                        break;
                    }
                }
                _ = next_tick(&mut registrar) => {
                    self.run_registrar().await;
                }
                trigger = triggers.recv() => match trigger {
                    Some(trigger) => {
                        debug!(trigger = ?trigger, "Reconciliation triggered");
                        self.run_reconcile().await;
                    }
                    None => {
                        info!("Trigger queue closed, controller stopping");
                        break;
                    }
                },
            }
        }
    }

    async fn run_reconcile(&self) {
        if let Err(e) = self.reconcile_once().await {
            warn!(error = %e, "Reconciliation pass aborted, will retry on next trigger");
        }
    }

    async fn run_registrar(&self) {
        if let Err(e) = self.register_once().await {
            warn!(error = %e, "Registrar pass aborted, will retry on next tick");
        }
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
