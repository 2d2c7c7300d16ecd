//! Notification subscription pump.
//!
//! Holds a watch subscription open against the store and forwards every
//! change notification to the controller's trigger queue. When the
//! subscription fails or ends it reconnects with backoff; a subscription
//! resumed after an interruption is announced with a [`Trigger::Resync`] so
//! that changes missed in the gap are picked up by a full pass.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::backoff::BackoffPolicy;
use crate::controller::Trigger;
use crate::store::{NotificationStream, StoreError, Subscribe, WATCHED_KINDS};

pub struct SubscriptionPump<S> {
    source: Arc<S>,
    triggers: mpsc::Sender<Trigger>,
    backoff: BackoffPolicy,
}

/// Why a single subscription ended.
enum Ended {
    Shutdown,
    QueueClosed,
    Interrupted(StoreError),
}

impl<S: Subscribe> SubscriptionPump<S> {
    pub fn new(source: Arc<S>, triggers: mpsc::Sender<Trigger>, backoff: BackoffPolicy) -> Self {
        Self {
            source,
            triggers,
            backoff,
        }
    }

    /// Run until shutdown is signaled or the trigger queue is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut attempt: u32 = 0;
        let mut resync_needed = false;

        loop {
            let result = tokio::select! {
                biased;
                _ = stopped(&mut shutdown) => break,
                result = self.source.subscribe(&WATCHED_KINDS) => result,
            };

            let error = match result {
                Ok(stream) => {
                    info!(kinds = WATCHED_KINDS.len(), "Subscribed to store notifications");
                    attempt = 0;

                    if resync_needed {
                        if self.triggers.send(Trigger::Resync).await.is_err() {
                            break;
                        }
                        resync_needed = false;
                    }

                    match self.forward(stream, &mut shutdown).await {
                        Ended::Shutdown | Ended::QueueClosed => break,
                        Ended::Interrupted(e) => e,
                    }
                }
                Err(e) => e,
            };

            resync_needed = true;
            let delay = self.backoff.delay(attempt);
            attempt = attempt.saturating_add(1);
            warn!(
                error = %error,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Subscription interrupted, reconnecting"
            );

            tokio::select! {
                biased;
                _ = stopped(&mut shutdown) => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("Subscription pump stopped");
    }

    async fn forward(
        &self,
        mut stream: NotificationStream,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Ended {
        loop {
            let next = tokio::select! {
                biased;
                _ = stopped(shutdown) => return Ended::Shutdown,
                next = stream.next() => next,
            };

            match next {
                Some(Ok(notification)) => {
                    debug!(
                        kind = %notification.kind,
                        name = %notification.name,
                        "Store notification received"
                    );
                    if self
                        .triggers
                        .send(Trigger::Notification(notification))
                        .await
                        .is_err()
                    {
                        return Ended::QueueClosed;
                    }
                }
                Some(Err(e)) => return Ended::Interrupted(e),
                None => return Ended::Interrupted(StoreError::StreamClosed),
            }
        }
    }
}

/// Resolves once shutdown is signaled or the sender is dropped.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
