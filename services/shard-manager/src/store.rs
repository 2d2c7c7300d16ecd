//! Ports to the control-plane store.
//!
//! The controller only talks to the store through these traits, so passes can
//! be driven against the gRPC client in production and an in-memory store in
//! tests.

use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_core::Stream;
use thiserror::Error;
use upsf_reconcile::{NewShard, ShardChange, Snapshot};

/// Errors talking to the store. A timeout is treated like any remote error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("rpc failed: {0}")]
    Status(#[from] tonic::Status),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed item: {0}")]
    Decode(String),

    #[error("notification stream closed")]
    StreamClosed,
}

/// Object kinds held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    ServiceGateway,
    UserPlane,
    SteeringFunction,
    NetworkConnection,
    Shard,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::ServiceGateway => write!(f, "service_gateway"),
            ItemKind::UserPlane => write!(f, "service_gateway_user_plane"),
            ItemKind::SteeringFunction => write!(f, "traffic_steering_function"),
            ItemKind::NetworkConnection => write!(f, "network_connection"),
            ItemKind::Shard => write!(f, "shard"),
        }
    }
}

/// Every kind a snapshot is built from.
pub const SNAPSHOT_KINDS: [ItemKind; 5] = [
    ItemKind::ServiceGateway,
    ItemKind::UserPlane,
    ItemKind::SteeringFunction,
    ItemKind::NetworkConnection,
    ItemKind::Shard,
];

/// Kinds whose changes trigger a reconciliation pass.
pub const WATCHED_KINDS: [ItemKind; 4] = [
    ItemKind::UserPlane,
    ItemKind::SteeringFunction,
    ItemKind::NetworkConnection,
    ItemKind::Shard,
];

/// A change reported by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: ItemKind,
    pub name: String,
}

pub type NotificationStream =
    Pin<Box<dyn Stream<Item = Result<Notification, StoreError>> + Send + 'static>>;

/// Reads and writes against the store.
#[async_trait]
pub trait ShardStore: Send + Sync + 'static {
    /// Read every object kind in one logical fetch. Any failure fails the
    /// whole read; a partial snapshot is never returned.
    async fn read_snapshot(&self) -> Result<Snapshot, StoreError>;

    /// Replace the desired state of an existing shard.
    async fn update_shard(&self, change: &ShardChange) -> Result<(), StoreError>;

    async fn create_shard(&self, shard: &NewShard) -> Result<(), StoreError>;
}

/// Change notifications from the store.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Open a stream of changes to the given kinds. The stream ends or fails
    /// when the subscription is lost.
    async fn subscribe(&self, kinds: &[ItemKind]) -> Result<NotificationStream, StoreError>;
}
