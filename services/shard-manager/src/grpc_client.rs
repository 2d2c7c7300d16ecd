//! gRPC client for the control-plane store.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio_stream::StreamExt;
use tonic::transport::Channel;
use tracing::debug;
use upsf_proto::upsf::v1::{
    self as proto, item::Kind, network_connection::NcSpec, CreateShardRequest, ItemType,
    ListMergeStrategy, ReadRequest, UpdateShardRequest, UpsfClient,
};
use upsf_reconcile::{
    ConnectionSpec, NetworkConnection, NewShard, ServiceGateway, Shard, ShardChange, Snapshot,
    TrafficSteeringFunction, UserPlane,
};

use crate::store::{
    ItemKind, Notification, NotificationStream, ShardStore, StoreError, Subscribe, SNAPSHOT_KINDS,
};

/// Store client over a lazily connected channel.
///
/// Every request is bounded by the configured timeout, except the open
/// notification stream, which only bounds its initial response.
#[derive(Clone)]
pub struct UpsfGrpcClient {
    client: UpsfClient<Channel>,
    timeout: Duration,
}

impl UpsfGrpcClient {
    pub fn connect_lazy(endpoint: &str, timeout: Duration) -> Result<Self> {
        let channel = Channel::from_shared(endpoint.to_string())?
            .connect_timeout(timeout)
            .connect_lazy();

        Ok(Self {
            client: UpsfClient::new(channel),
            timeout,
        })
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: std::future::Future<Output = Result<T, StoreError>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
    }
}

#[async_trait]
impl ShardStore for UpsfGrpcClient {
    async fn read_snapshot(&self) -> Result<Snapshot, StoreError> {
        let request = read_request(&SNAPSHOT_KINDS, false);
        let mut client = self.client.clone();

        let snapshot = self
            .bounded(async move {
                let mut stream = client.read(request).await?.into_inner();
                let mut snapshot = Snapshot::default();
                while let Some(item) = stream.message().await? {
                    merge_item(&mut snapshot, item)?;
                }
                Ok::<_, StoreError>(snapshot)
            })
            .await?;

        debug!(
            user_planes = snapshot.user_planes.len(),
            service_gateways = snapshot.service_gateways.len(),
            steering_functions = snapshot.steering_functions.len(),
            network_connections = snapshot.network_connections.len(),
            shards = snapshot.shards.len(),
            "Read snapshot via gRPC"
        );
        Ok(snapshot)
    }

    async fn update_shard(&self, change: &ShardChange) -> Result<(), StoreError> {
        let request = update_request(change);
        let mut client = self.client.clone();
        self.bounded(async move {
            client.update_shard(request).await?;
            Ok::<_, StoreError>(())
        })
        .await
    }

    async fn create_shard(&self, shard: &NewShard) -> Result<(), StoreError> {
        let request = create_request(shard);
        let mut client = self.client.clone();
        self.bounded(async move {
            client.create_shard(request).await?;
            Ok::<_, StoreError>(())
        })
        .await
    }
}

#[async_trait]
impl Subscribe for UpsfGrpcClient {
    async fn subscribe(&self, kinds: &[ItemKind]) -> Result<NotificationStream, StoreError> {
        let request = read_request(kinds, true);
        let mut client = self.client.clone();
        let response = self
            .bounded(async move { Ok::<_, StoreError>(client.read(request).await?) })
            .await?;

        let stream = response
            .into_inner()
            .map(|item| item.map_err(StoreError::from).and_then(notification_of));
        Ok(Box::pin(stream))
    }
}

fn item_type(kind: ItemKind) -> ItemType {
    match kind {
        ItemKind::ServiceGateway => ItemType::ServiceGateway,
        ItemKind::UserPlane => ItemType::ServiceGatewayUserPlane,
        ItemKind::SteeringFunction => ItemType::TrafficSteeringFunction,
        ItemKind::NetworkConnection => ItemType::NetworkConnection,
        ItemKind::Shard => ItemType::Shard,
    }
}

fn read_request(kinds: &[ItemKind], watch: bool) -> ReadRequest {
    ReadRequest {
        itemtype: kinds.iter().map(|k| item_type(*k).into()).collect(),
        watch,
    }
}

fn update_request(change: &ShardChange) -> UpdateShardRequest {
    let assignment = &change.assignment;
    UpdateShardRequest {
        shard: Some(proto::Shard {
            name: change.shard.clone(),
            prefix: change.prefixes.clone(),
            desired_service_gateway_user_plane: assignment.user_plane.clone(),
            desired_network_connection: assignment.network_connections.iter().cloned().collect(),
            current_tsf_network_connection: assignment
                .tsf_network_connections
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<HashMap<_, _>>(),
            service_groups_supported: assignment.service_groups.clone(),
            ..Default::default()
        }),
        list_merge_strategy: ListMergeStrategy::Replace.into(),
    }
}

fn create_request(shard: &NewShard) -> CreateShardRequest {
    CreateShardRequest {
        shard: Some(proto::Shard {
            name: shard.name.clone(),
            virtual_mac: shard.virtual_mac.clone(),
            max_session_count: shard.max_session_count,
            allocated_session_count: 0,
            prefix: shard.prefixes.clone(),
            desired_service_gateway_user_plane: shard.desired_user_plane.clone(),
            ..Default::default()
        }),
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

fn endpoint_name(endpoint: Option<proto::Endpoint>) -> Option<String> {
    endpoint.and_then(|ep| non_empty(ep.endpoint_name))
}

fn endpoint_names(endpoints: Vec<proto::Endpoint>) -> Vec<String> {
    endpoints
        .into_iter()
        .filter_map(|ep| non_empty(ep.endpoint_name))
        .collect()
}

fn connection_spec(spec: NcSpec) -> ConnectionSpec {
    match spec {
        NcSpec::SsPtp(s) => ConnectionSpec::SingleSessionPtp {
            sgup_endpoints: endpoint_names(s.sgup_endpoint),
            tsf_endpoint: endpoint_name(s.tsf_endpoint).unwrap_or_default(),
        },
        NcSpec::SsMptp(s) => ConnectionSpec::SingleSessionMptp {
            sgup_endpoints: endpoint_names(s.sgup_endpoint),
            tsf_endpoints: endpoint_names(s.tsf_endpoint),
        },
        NcSpec::MsPtp(s) => ConnectionSpec::MultiSessionPtp {
            sgup_endpoint: endpoint_name(s.sgup_endpoint).unwrap_or_default(),
            tsf_endpoint: endpoint_name(s.tsf_endpoint).unwrap_or_default(),
        },
        NcSpec::MsMptp(s) => ConnectionSpec::MultiSessionMptp {
            sgup_endpoint: endpoint_name(s.sgup_endpoint).unwrap_or_default(),
            tsf_endpoints: endpoint_names(s.tsf_endpoint),
        },
    }
}

/// Add one streamed item to a snapshot under construction.
fn merge_item(snapshot: &mut Snapshot, item: proto::Item) -> Result<(), StoreError> {
    match item.kind {
        Some(Kind::ServiceGateway(sg)) => snapshot
            .service_gateways
            .push(ServiceGateway { name: sg.name }),
        Some(Kind::ServiceGatewayUserPlane(up)) => snapshot.user_planes.push(UserPlane {
            name: up.name,
            service_gateway: non_empty(up.service_gateway_name),
            max_session_count: up.max_session_count,
            allocated_session_count: up.allocated_session_count,
            supported_service_groups: up.supported_service_group,
            default_endpoint: endpoint_name(up.default_endpoint),
        }),
        Some(Kind::TrafficSteeringFunction(tsf)) => {
            snapshot.steering_functions.push(TrafficSteeringFunction {
                name: tsf.name,
                default_endpoint: endpoint_name(tsf.default_endpoint),
            })
        }
        Some(Kind::NetworkConnection(nc)) => snapshot.network_connections.push(NetworkConnection {
            name: nc.name,
            spec: nc.nc_spec.map(connection_spec),
        }),
        Some(Kind::Shard(shard)) => snapshot.shards.push(Shard {
            name: shard.name,
            desired_user_plane: shard.desired_service_gateway_user_plane,
            desired_network_connections: shard.desired_network_connection,
            current_user_plane: shard.current_service_gateway_user_plane,
            prefixes: shard.prefix,
        }),
        None => return Err(StoreError::Decode("item without kind".to_string())),
    }
    Ok(())
}

/// Identify the object a streamed item refers to.
fn notification_of(item: proto::Item) -> Result<Notification, StoreError> {
    let (kind, name) = match item.kind {
        Some(Kind::ServiceGateway(sg)) => (ItemKind::ServiceGateway, sg.name),
        Some(Kind::ServiceGatewayUserPlane(up)) => (ItemKind::UserPlane, up.name),
        Some(Kind::TrafficSteeringFunction(tsf)) => (ItemKind::SteeringFunction, tsf.name),
        Some(Kind::NetworkConnection(nc)) => (ItemKind::NetworkConnection, nc.name),
        Some(Kind::Shard(shard)) => (ItemKind::Shard, shard.name),
        None => return Err(StoreError::Decode("item without kind".to_string())),
    };
    Ok(Notification { kind, name })
}
