//! Shard placement for the user plane selection function.
//!
//! This library holds the pure core of the shard manager. Given a snapshot of
//! the control-plane store and a static policy it computes:
//!
//! - **Mapping**: the desired user plane (and serving network connections) of
//!   every shard, as the set of shards whose stored state must change.
//! - **Registration**: the predefined shards missing from the store.
//!
//! # Invariants
//!
//! - Every computation is a function of its inputs; nothing carries over
//!   between passes.
//! - Decisions are deterministic given the same inputs.
//! - Shards are never removed; an unmapped shard has an empty desired user plane.

pub mod connections;
pub mod load;
pub mod mapping;
pub mod model;
pub mod policy;
pub mod prefix;
pub mod registrar;

pub use load::{is_admissible, Load, LoadModel};
pub use mapping::{reconcile, MappingPlan};
pub use model::{
    Assignment, ConnectionSpec, NetworkConnection, NewShard, ServiceGateway, Shard, ShardChange,
    Snapshot, TrafficSteeringFunction, UserPlane,
};
pub use policy::{Policy, ShardTemplate};
pub use prefix::{IpPrefix, PrefixError};
pub use registrar::{ensure_predefined, ShardDefaults, DEFAULT_VIRTUAL_MAC};
