//! Control-plane objects as seen by one reconciliation pass.

use std::collections::{BTreeMap, BTreeSet};

/// Controlling entity of one or more user planes. Only its existence matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceGateway {
    pub name: String,
}

/// A serving resource with finite session capacity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserPlane {
    pub name: String,

    /// Controlling service gateway, if the store carries a reference.
    pub service_gateway: Option<String>,

    pub max_session_count: u32,

    pub allocated_session_count: u32,

    pub supported_service_groups: Vec<String>,

    /// Name of the endpoint network connections attach to.
    pub default_endpoint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrafficSteeringFunction {
    pub name: String,
    pub default_endpoint: Option<String>,
}

/// Endpoint layout of a network connection, by endpoint name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSpec {
    /// Single-session point-to-point: one TSF endpoint, several user plane endpoints.
    SingleSessionPtp {
        sgup_endpoints: Vec<String>,
        tsf_endpoint: String,
    },

    /// Single-session multipoint.
    SingleSessionMptp {
        sgup_endpoints: Vec<String>,
        tsf_endpoints: Vec<String>,
    },

    /// Multi-session point-to-point.
    MultiSessionPtp {
        sgup_endpoint: String,
        tsf_endpoint: String,
    },

    /// Multi-session multipoint: one user plane endpoint, several TSF endpoints.
    MultiSessionMptp {
        sgup_endpoint: String,
        tsf_endpoints: Vec<String>,
    },
}

impl ConnectionSpec {
    /// Returns true if this connection joins the two named endpoints.
    pub fn joins(&self, sgup_endpoint: &str, tsf_endpoint: &str) -> bool {
        match self {
            Self::SingleSessionPtp {
                sgup_endpoints,
                tsf_endpoint: tsf,
            } => tsf == tsf_endpoint && sgup_endpoints.iter().any(|ep| ep == sgup_endpoint),
            Self::SingleSessionMptp {
                sgup_endpoints,
                tsf_endpoints,
            } => {
                sgup_endpoints.iter().any(|ep| ep == sgup_endpoint)
                    && tsf_endpoints.iter().any(|ep| ep == tsf_endpoint)
            }
            Self::MultiSessionPtp {
                sgup_endpoint: sgup,
                tsf_endpoint: tsf,
            } => sgup == sgup_endpoint && tsf == tsf_endpoint,
            Self::MultiSessionMptp {
                sgup_endpoint: sgup,
                tsf_endpoints,
            } => sgup == sgup_endpoint && tsf_endpoints.iter().any(|ep| ep == tsf_endpoint),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConnection {
    pub name: String,

    /// `None` when the store holds a connection without a recognised layout.
    pub spec: Option<ConnectionSpec>,
}

/// A subscriber group, the unit being placed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Shard {
    pub name: String,

    /// Desired user plane; empty means unassigned.
    pub desired_user_plane: String,

    pub desired_network_connections: Vec<String>,

    /// User plane currently serving the shard, as reported by the store.
    pub current_user_plane: String,

    pub prefixes: Vec<String>,
}

impl Shard {
    pub fn is_mapped(&self) -> bool {
        !self.desired_user_plane.is_empty()
    }
}

/// Everything read from the store in a single fetch.
///
/// A snapshot is built fresh for each pass and never reused.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub service_gateways: Vec<ServiceGateway>,
    pub user_planes: Vec<UserPlane>,
    pub steering_functions: Vec<TrafficSteeringFunction>,
    pub network_connections: Vec<NetworkConnection>,
    pub shards: Vec<Shard>,
}

impl Snapshot {
    pub fn has_service_gateway(&self, name: &str) -> bool {
        self.service_gateways.iter().any(|sg| sg.name == name)
    }

    pub fn user_plane(&self, name: &str) -> Option<&UserPlane> {
        self.user_planes.iter().find(|up| up.name == name)
    }

    pub fn shard(&self, name: &str) -> Option<&Shard> {
        self.shards.iter().find(|shard| shard.name == name)
    }
}

/// Desired placement of one shard.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Assignment {
    /// Target user plane; empty means unmapped.
    pub user_plane: String,

    /// Network connections joining every steering function to the user plane.
    pub network_connections: BTreeSet<String>,

    /// Steering function name to the connection that serves it.
    pub tsf_network_connections: BTreeMap<String, String>,

    /// Non-empty service groups the target user plane supports.
    pub service_groups: Vec<String>,
}

impl Assignment {
    pub fn unmapped() -> Self {
        Self::default()
    }

    pub fn is_unmapped(&self) -> bool {
        self.user_plane.is_empty()
    }

    /// Returns true if writing this assignment would change the shard.
    pub fn differs_from(&self, shard: &Shard) -> bool {
        if self.user_plane != shard.desired_user_plane {
            return true;
        }
        let stored: BTreeSet<&str> = shard
            .desired_network_connections
            .iter()
            .map(String::as_str)
            .collect();
        let desired: BTreeSet<&str> = self.network_connections.iter().map(String::as_str).collect();
        stored != desired
    }
}

/// A shard whose desired state must be rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardChange {
    pub shard: String,

    /// Desired user plane stored before this change.
    pub previous_user_plane: String,

    pub assignment: Assignment,

    /// Prefixes of the shard, written back unchanged.
    pub prefixes: Vec<String>,
}

/// A predefined shard to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewShard {
    pub name: String,
    pub virtual_mac: String,
    pub max_session_count: u32,
    pub prefixes: Vec<String>,

    /// Initial desired user plane; empty leaves placement to the reconciler.
    pub desired_user_plane: String,
}
