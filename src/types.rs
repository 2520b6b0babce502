//! Snapshots and requests exchanged with the Aiven API.
//!
//! Only the fields the provider reasons about are modelled; everything is
//! lenient on input (`#[serde(default)]`) because the API adds fields freely.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::status::{PrivatelinkState, ServiceState, StaticIpState, TopicState};

/// IP filter value meaning "reachable from anywhere".
pub const OPEN_IP_FILTER: &str = "0.0.0.0/0";

/// The service kinds the provider knows how to manage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    /// PostgreSQL.
    Pg,
    /// Apache Cassandra.
    Cassandra,
    /// Elasticsearch.
    Elasticsearch,
    /// OpenSearch.
    Opensearch,
    /// Grafana.
    Grafana,
    /// InfluxDB.
    Influxdb,
    /// Redis.
    Redis,
    /// MySQL.
    Mysql,
    /// Apache Kafka.
    Kafka,
    /// Kafka Connect.
    KafkaConnect,
    /// Kafka MirrorMaker 2.
    KafkaMirrormaker,
    /// M3DB.
    M3db,
    /// M3 Aggregator.
    M3aggregator,
    /// Apache Flink.
    Flink,
    /// ClickHouse.
    Clickhouse,
}

impl ServiceType {
    /// Every supported kind.
    pub const ALL: [ServiceType; 15] = [
        Self::Pg,
        Self::Cassandra,
        Self::Elasticsearch,
        Self::Opensearch,
        Self::Grafana,
        Self::Influxdb,
        Self::Redis,
        Self::Mysql,
        Self::Kafka,
        Self::KafkaConnect,
        Self::KafkaMirrormaker,
        Self::M3db,
        Self::M3aggregator,
        Self::Flink,
        Self::Clickhouse,
    ];

    /// The API name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pg => "pg",
            Self::Cassandra => "cassandra",
            Self::Elasticsearch => "elasticsearch",
            Self::Opensearch => "opensearch",
            Self::Grafana => "grafana",
            Self::Influxdb => "influxdb",
            Self::Redis => "redis",
            Self::Mysql => "mysql",
            Self::Kafka => "kafka",
            Self::KafkaConnect => "kafka_connect",
            Self::KafkaMirrormaker => "kafka_mirrormaker",
            Self::M3db => "m3db",
            Self::M3aggregator => "m3aggregator",
            Self::Flink => "flink",
            Self::Clickhouse => "clickhouse",
        }
    }

    /// Whether a freshly created service of this kind is only usable once its
    /// first backup exists.
    pub fn requires_backups(&self) -> bool {
        matches!(
            self,
            Self::Pg | Self::Elasticsearch | Self::Redis | Self::Influxdb
        )
    }

    /// Extract the kind specific connection properties.
    pub fn connection_info(&self, info: &ConnectionInfo) -> Map<String, Value> {
        let mut props = Map::new();
        match self {
            Self::Opensearch => {
                put(&mut props, "opensearch_dashboards_uri", &info.opensearch_dashboards_uri);
            },
            Self::Elasticsearch => {
                put(&mut props, "kibana_uri", &info.kibana_uri);
            },
            Self::Influxdb => {
                put(&mut props, "database_name", &info.influxdb_dbname);
            },
            Self::Kafka => {
                put(&mut props, "access_cert", &info.kafka_access_cert);
                put(&mut props, "access_key", &info.kafka_access_key);
                put(&mut props, "connect_uri", &info.kafka_connect_uri);
                put(&mut props, "rest_uri", &info.kafka_rest_uri);
                put(&mut props, "schema_registry_uri", &info.schema_registry_uri);
            },
            Self::Pg => pg_connection_info(info, &mut props),
            Self::Flink => {
                props.insert("host_ports".to_string(), Value::from(info.flink.clone()));
            },
            Self::Cassandra
            | Self::Grafana
            | Self::Redis
            | Self::Mysql
            | Self::KafkaConnect
            | Self::KafkaMirrormaker
            | Self::M3db
            | Self::M3aggregator
            | Self::Clickhouse => {},
        }
        props
    }
}

fn put(props: &mut Map<String, Value>, key: &str, value: &Option<String>) {
    props.insert(
        key.to_string(),
        Value::String(value.clone().unwrap_or_default()),
    );
}

fn pg_connection_info(info: &ConnectionInfo, props: &mut Map<String, Value>) {
    if let Some(uri) = info.pg.first() {
        props.insert("uri".to_string(), Value::String(uri.clone()));
    }
    if let Some(params) = info.pg_params.first() {
        props.insert("dbname".to_string(), Value::String(params.dbname.clone()));
        props.insert("host".to_string(), Value::String(params.host.clone()));
        props.insert("password".to_string(), Value::String(params.password.clone()));
        if let Ok(port) = params.port.parse::<u16>() {
            props.insert("port".to_string(), Value::from(port));
        }
        props.insert("sslmode".to_string(), Value::String(params.sslmode.clone()));
        props.insert("user".to_string(), Value::String(params.user.clone()));
    }
    put(props, "replica_uri", &info.pg_replica_uri);
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ProviderError::Validation(format!("unsupported service type '{s}'")))
    }
}

/// A service as returned by `GET /project/{project}/service/{service}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    /// Service name, unique within the project.
    pub service_name: String,
    /// API name of the service kind, see [`ServiceType`].
    pub service_type: String,
    /// Lifecycle state.
    pub state: ServiceState,
    #[serde(default)]
    pub plan: String,
    #[serde(default)]
    pub cloud_name: String,
    #[serde(default)]
    pub backups: Vec<Backup>,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub service_integrations: Vec<ServiceIntegration>,
    #[serde(default)]
    pub user_config: Map<String, Value>,
    #[serde(default)]
    pub connection_info: ConnectionInfo,
    #[serde(default)]
    pub service_uri: String,
    #[serde(default)]
    pub service_uri_params: HashMap<String, String>,
    #[serde(default)]
    pub termination_protection: bool,
    #[serde(default)]
    pub disk_space_mb: u64,
    #[serde(default)]
    pub project_vpc_id: Option<String>,
}

impl Service {
    /// The service kind, if it is one the provider supports.
    pub fn kind(&self) -> Result<ServiceType, ProviderError> {
        self.service_type.parse()
    }

    /// The `ip_filter` entries of the user config.
    ///
    /// Entries are either plain CIDR strings or objects with a `network` key.
    pub fn ip_filters(&self) -> Option<Vec<String>> {
        let filters = self.user_config.get("ip_filter")?.as_array()?;
        Some(
            filters
                .iter()
                .filter_map(|f| match f {
                    Value::String(cidr) => Some(cidr.clone()),
                    Value::Object(obj) => obj.get("network")?.as_str().map(str::to_string),
                    _ => None,
                })
                .collect(),
        )
    }

    /// `host:port` of the public primary component, if the service has one.
    pub fn public_primary_address(&self) -> Option<String> {
        self.components
            .iter()
            .find(|c| c.route == "public" && c.usage == "primary")
            .map(|c| format!("{}:{}", c.host, c.port))
    }

    /// Whether this service receives data as the destination of a read replica
    /// integration.
    pub fn is_read_replica(&self) -> bool {
        self.service_integrations.iter().any(|i| {
            i.integration_type == "read_replica"
                && i.dest_service.as_deref() == Some(self.service_name.as_str())
        })
    }
}

/// A service backup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Backup {
    pub backup_name: String,
    pub backup_time: String,
    pub data_size: u64,
}

/// A network endpoint of a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Component {
    pub component: String,
    pub host: String,
    pub port: u16,
    pub route: String,
    pub usage: String,
}

/// An integration between two services.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceIntegration {
    pub integration_type: String,
    pub source_service: Option<String>,
    pub dest_service: Option<String>,
}

/// Kind specific connection details of a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionInfo {
    pub pg: Vec<String>,
    pub pg_params: Vec<PgParams>,
    pub pg_replica_uri: Option<String>,
    pub kafka_access_cert: Option<String>,
    pub kafka_access_key: Option<String>,
    pub kafka_connect_uri: Option<String>,
    pub kafka_rest_uri: Option<String>,
    pub schema_registry_uri: Option<String>,
    pub kibana_uri: Option<String>,
    pub opensearch_dashboards_uri: Option<String>,
    pub influxdb_dbname: Option<String>,
    pub flink: Vec<String>,
}

/// PostgreSQL connection parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PgParams {
    pub dbname: String,
    pub host: String,
    pub password: String,
    pub port: String,
    pub sslmode: String,
    pub user: String,
}

/// Body of `POST /project/{project}/service`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateServiceRequest {
    pub service_name: String,
    pub service_type: String,
    pub plan: String,
    #[serde(rename = "cloud", skip_serializing_if = "Option::is_none")]
    pub cloud_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_vpc_id: Option<String>,
    pub termination_protection: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_space_mb: Option<u64>,
    pub user_config: Map<String, Value>,
}

/// Body of `PUT /project/{project}/service/{service}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateServiceRequest {
    pub plan: String,
    #[serde(rename = "cloud", skip_serializing_if = "Option::is_none")]
    pub cloud_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_vpc_id: Option<String>,
    pub powered: bool,
    pub termination_protection: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_space_mb: Option<u64>,
    /// Only ever sent as `true`: Karapace can be switched on, not off.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub karapace: Option<bool>,
    pub user_config: Map<String, Value>,
}

/// A project scoped static IP address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticIp {
    pub static_ip_address_id: String,
    pub state: StaticIpState,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub cloud_name: String,
    /// Empty when the address is not bound to a service.
    #[serde(default)]
    pub service_name: String,
}

/// Body of `POST /project/{project}/static-ips`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateStaticIpRequest {
    pub cloud_name: String,
}

/// A Kafka topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KafkaTopic {
    pub topic_name: String,
    pub state: TopicState,
    #[serde(default)]
    pub partitions: Vec<TopicPartition>,
    #[serde(default)]
    pub replication: u32,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub tags: Vec<TopicTag>,
}

/// One partition of a Kafka topic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicPartition {
    pub partition: u32,
    pub isr: u32,
    pub size: u64,
}

/// A user defined topic tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicTag {
    pub key: String,
    pub value: String,
}

/// Body of `POST /project/{project}/service/{service}/topic`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateKafkaTopicRequest {
    pub topic_name: String,
    pub partitions: u32,
    pub replication: u32,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TopicTag>,
}

/// Body of `PUT /project/{project}/service/{service}/topic/{topic}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateKafkaTopicRequest {
    pub partitions: u32,
    pub replication: u32,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub tags: Vec<TopicTag>,
}

/// A logical database of a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Database {
    pub database_name: String,
    pub lc_collate: String,
    pub lc_ctype: String,
}

/// Body of `POST /project/{project}/service/{service}/db`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDatabaseRequest {
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lc_collate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lc_ctype: Option<String>,
}

/// An AWS privatelink of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsPrivatelink {
    pub state: PrivatelinkState,
    #[serde(default)]
    pub principals: Vec<String>,
    #[serde(default)]
    pub aws_service_id: Option<String>,
    #[serde(default)]
    pub aws_service_name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of the AWS privatelink create and update calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsPrivatelinkRequest {
    pub principals: Vec<String>,
}

/// An Azure privatelink of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzurePrivatelink {
    pub state: PrivatelinkState,
    #[serde(default)]
    pub user_subscription_ids: Vec<String>,
    #[serde(default)]
    pub azure_service_alias: Option<String>,
    #[serde(default)]
    pub azure_service_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of the Azure privatelink create and update calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzurePrivatelinkRequest {
    pub user_subscription_ids: Vec<String>,
}

/// Whether a user config switches static IPs on.
///
/// Terraform user configs carry scalars as strings, so `"true"` counts too.
pub fn static_ips_enabled(user_config: &Map<String, Value>) -> bool {
    match user_config.get("static_ips") {
        Some(Value::Bool(enabled)) => *enabled,
        Some(Value::String(s)) => s == "true",
        _ => false,
    }
}
