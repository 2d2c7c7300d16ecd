//! Network connections serving a shard on its chosen user plane.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{Assignment, NetworkConnection, Snapshot, UserPlane};

/// Build the full assignment of a shard to `user_plane`.
///
/// Every network connection joining some steering function's default
/// endpoint to the user plane's default endpoint is selected. When several
/// connections serve one steering function, the greatest name is recorded
/// for it.
pub fn assign_to(snapshot: &Snapshot, user_plane: &UserPlane) -> Assignment {
    let mut network_connections = BTreeSet::new();
    let mut tsf_network_connections = BTreeMap::new();

    if let Some(up_endpoint) = user_plane.default_endpoint.as_deref() {
        let mut connections: Vec<&NetworkConnection> = snapshot.network_connections.iter().collect();
        connections.sort_by(|a, b| a.name.cmp(&b.name));

        for tsf in &snapshot.steering_functions {
            let Some(tsf_endpoint) = tsf.default_endpoint.as_deref() else {
                continue;
            };

            for connection in &connections {
                let joins = connection
                    .spec
                    .as_ref()
                    .is_some_and(|spec| spec.joins(up_endpoint, tsf_endpoint));
                if joins {
                    network_connections.insert(connection.name.clone());
                    tsf_network_connections.insert(tsf.name.clone(), connection.name.clone());
                }
            }
        }
    }

    Assignment {
        user_plane: user_plane.name.clone(),
        network_connections,
        tsf_network_connections,
        service_groups: user_plane
            .supported_service_groups
            .iter()
            .filter(|sg| !sg.is_empty())
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConnectionSpec, TrafficSteeringFunction};

    fn tsf(name: &str, endpoint: &str) -> TrafficSteeringFunction {
        TrafficSteeringFunction {
            name: name.to_string(),
            default_endpoint: Some(endpoint.to_string()),
        }
    }

    fn connection(name: &str, spec: ConnectionSpec) -> NetworkConnection {
        NetworkConnection {
            name: name.to_string(),
            spec: Some(spec),
        }
    }

    fn up(name: &str, endpoint: Option<&str>) -> UserPlane {
        UserPlane {
            name: name.to_string(),
            default_endpoint: endpoint.map(String::from),
            supported_service_groups: vec!["".to_string(), "residential".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_selects_connections_for_every_tsf() {
        let snapshot = Snapshot {
            steering_functions: vec![tsf("tsf-1", "tsf-ep-1"), tsf("tsf-2", "tsf-ep-2")],
            network_connections: vec![
                connection(
                    "nc-ptp",
                    ConnectionSpec::SingleSessionPtp {
                        sgup_endpoints: vec!["up-ep-a".to_string()],
                        tsf_endpoint: "tsf-ep-1".to_string(),
                    },
                ),
                connection(
                    "nc-mptp",
                    ConnectionSpec::MultiSessionMptp {
                        sgup_endpoint: "up-ep-a".to_string(),
                        tsf_endpoints: vec!["tsf-ep-2".to_string()],
                    },
                ),
                connection(
                    "nc-other",
                    ConnectionSpec::MultiSessionPtp {
                        sgup_endpoint: "up-ep-b".to_string(),
                        tsf_endpoint: "tsf-ep-1".to_string(),
                    },
                ),
                NetworkConnection {
                    name: "nc-unknown".to_string(),
                    spec: None,
                },
            ],
            ..Default::default()
        };

        let assignment = assign_to(&snapshot, &up("up-a", Some("up-ep-a")));

        assert_eq!(assignment.user_plane, "up-a");
        assert_eq!(
            assignment.network_connections.iter().collect::<Vec<_>>(),
            vec!["nc-mptp", "nc-ptp"]
        );
        assert_eq!(assignment.tsf_network_connections["tsf-1"], "nc-ptp");
        assert_eq!(assignment.tsf_network_connections["tsf-2"], "nc-mptp");
        assert_eq!(assignment.service_groups, vec!["residential".to_string()]);
    }

    #[test]
    fn test_greatest_connection_wins_per_tsf() {
        let spec = ConnectionSpec::SingleSessionMptp {
            sgup_endpoints: vec!["up-ep-a".to_string()],
            tsf_endpoints: vec!["tsf-ep-1".to_string()],
        };
        let snapshot = Snapshot {
            steering_functions: vec![tsf("tsf-1", "tsf-ep-1")],
            network_connections: vec![
                connection("nc-b", spec.clone()),
                connection("nc-a", spec),
            ],
            ..Default::default()
        };

        let assignment = assign_to(&snapshot, &up("up-a", Some("up-ep-a")));
        assert_eq!(assignment.network_connections.len(), 2);
        assert_eq!(assignment.tsf_network_connections["tsf-1"], "nc-b");
    }

    #[test]
    fn test_user_plane_without_endpoint_has_no_connections() {
        let snapshot = Snapshot {
            steering_functions: vec![tsf("tsf-1", "tsf-ep-1")],
            network_connections: vec![connection(
                "nc-1",
                ConnectionSpec::MultiSessionPtp {
                    sgup_endpoint: "up-ep-a".to_string(),
                    tsf_endpoint: "tsf-ep-1".to_string(),
                },
            )],
            ..Default::default()
        };

        let assignment = assign_to(&snapshot, &up("up-a", None));
        assert_eq!(assignment.user_plane, "up-a");
        assert!(assignment.network_connections.is_empty());
        assert!(assignment.tsf_network_connections.is_empty());
    }
}
