//! UPSF shard manager.
//!
//! This crate primarily ships a `shard-manager` binary, but we expose a
//! library surface to enable integration testing against in-memory stores.

pub mod backoff;
pub mod config;
pub mod controller;
pub mod grpc_client;
pub mod policy;
pub mod store;
pub mod subscription;

pub use controller::{Controller, ControllerConfig, PassError, PassStats, RegistrarStats, Trigger};
pub use store::{ItemKind, Notification, NotificationStream, ShardStore, StoreError, Subscribe};
pub use subscription::SubscriptionPump;
