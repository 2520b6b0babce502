//! Resource handlers.
//!
//! [`ProviderService`] is the CRUD surface the plugin host drives with JSON
//! state. [`AivenProvider`] implements it for the Aiven resources: each handler
//! issues the API call, then blocks on the matching waiter before returning the
//! new state.

mod database;
mod kafka_topic;
mod privatelink;
mod service;
mod static_ip;

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::cache::TopicCache;
use crate::client::{AivenApi, HttpClient};
use crate::config::{ProviderConfig, ResourceTimeouts, WaitConfig};
use crate::error::ProviderError;
use crate::types::ServiceType;
use crate::waiter::Waiter;

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// An error that prevents the operation from succeeding.
    Error,
    /// A warning that does not prevent the operation.
    Warning,
}

/// A diagnostic message returned from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity of the diagnostic.
    pub severity: DiagnosticSeverity,
    /// A short summary of the issue.
    pub summary: String,
    /// A detailed description of the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: None,
        }
    }

    /// Create a warning diagnostic.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: None,
        }
    }

    /// Add detail to the diagnostic.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// A resource brought under management by import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type.
    pub resource_type: String,
    /// The imported state.
    pub state: Value,
}

impl ImportedResource {
    /// Create a new imported resource.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// The CRUD surface of a provider.
#[async_trait]
pub trait ProviderService: Send + Sync + 'static {
    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Configure the provider with credentials and settings.
    /// Returns diagnostics (errors and warnings).
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Stop the provider, aborting every in-flight wait.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Create a new resource.
    async fn create(&self, resource_type: &str, planned_state: Value)
        -> Result<Value, ProviderError>;

    /// Read the current state of a resource.
    async fn read(&self, resource_type: &str, current_state: Value)
        -> Result<Value, ProviderError>;

    /// Update an existing resource.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, current_state: Value)
        -> Result<(), ProviderError>;

    /// Import existing infrastructure into management.
    async fn import_resource(
        &self,
        resource_type: &str,
        _id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        Err(ProviderError::Validation(format!(
            "Import not supported for resource type: {}",
            resource_type
        )))
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Look up an existing object without managing it.
    async fn read_data_source(
        &self,
        data_source_type: &str,
        _config: Value,
    ) -> Result<Value, ProviderError> {
        Err(ProviderError::UnknownResource(format!(
            "Unknown data source type: {}",
            data_source_type
        )))
    }
}

/// The resource types [`AivenProvider`] manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// `aiven_service`, or `aiven_<kind>` with the kind fixed.
    Service(Option<ServiceType>),
    /// `aiven_kafka_topic`.
    KafkaTopic,
    /// `aiven_static_ip`.
    StaticIp,
    /// `aiven_database`.
    Database,
    /// `aiven_aws_privatelink`.
    AwsPrivatelink,
    /// `aiven_azure_privatelink`.
    AzurePrivatelink,
}

impl ResourceKind {
    /// Every resource type name, service aliases included.
    pub fn names() -> Vec<String> {
        let mut names: Vec<String> = [
            "aiven_service",
            "aiven_kafka_topic",
            "aiven_static_ip",
            "aiven_database",
            "aiven_aws_privatelink",
            "aiven_azure_privatelink",
        ]
        .iter()
        .map(|name| name.to_string())
        .collect();
        names.extend(ServiceType::ALL.iter().map(|kind| format!("aiven_{kind}")));
        names
    }
}

impl FromStr for ResourceKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "aiven_service" => Self::Service(None),
            "aiven_kafka_topic" => Self::KafkaTopic,
            "aiven_static_ip" => Self::StaticIp,
            "aiven_database" => Self::Database,
            "aiven_aws_privatelink" => Self::AwsPrivatelink,
            "aiven_azure_privatelink" => Self::AzurePrivatelink,
            other => other
                .strip_prefix("aiven_")
                .and_then(|kind| kind.parse::<ServiceType>().ok())
                .map(|kind| Self::Service(Some(kind)))
                .ok_or_else(|| ProviderError::UnknownResource(other.to_string()))?,
        };
        Ok(kind)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service(None) => f.write_str("aiven_service"),
            Self::Service(Some(kind)) => write!(f, "aiven_{kind}"),
            Self::KafkaTopic => f.write_str("aiven_kafka_topic"),
            Self::StaticIp => f.write_str("aiven_static_ip"),
            Self::Database => f.write_str("aiven_database"),
            Self::AwsPrivatelink => f.write_str("aiven_aws_privatelink"),
            Self::AzurePrivatelink => f.write_str("aiven_azure_privatelink"),
        }
    }
}

type Connector<A> = fn(&ProviderConfig) -> Result<A, ProviderError>;

/// [`ProviderService`] for Aiven.
pub struct AivenProvider<A: AivenApi = HttpClient> {
    api: RwLock<Option<Arc<A>>>,
    connect: Option<Connector<A>>,
    cache: Arc<TopicCache>,
    cancel: CancellationToken,
}

impl AivenProvider<HttpClient> {
    /// A provider that builds its [`HttpClient`] in `configure`.
    pub fn unconfigured() -> Self {
        Self {
            api: RwLock::new(None),
            connect: Some(HttpClient::from_config),
            cache: Arc::new(TopicCache::new()),
            cancel: CancellationToken::new(),
        }
    }
}

impl<A: AivenApi> AivenProvider<A> {
    /// A provider talking through `api`; `configure` keeps it.
    pub fn new(api: A) -> Self {
        Self {
            api: RwLock::new(Some(Arc::new(api))),
            connect: None,
            cache: Arc::new(TopicCache::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Share `cache` instead of a private topic cache.
    pub fn with_topic_cache(mut self, cache: Arc<TopicCache>) -> Self {
        self.cache = cache;
        self
    }

    /// The topic cache used by topic waits.
    pub fn topic_cache(&self) -> &Arc<TopicCache> {
        &self.cache
    }

    /// The API the handlers talk through.
    pub fn api(&self) -> Result<Arc<A>, ProviderError> {
        self.api
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| ProviderError::Configuration("provider is not configured".to_string()))
    }

    /// A waiter that `stop` can abort.
    fn waiter(&self, config: WaitConfig) -> Waiter {
        Waiter::new(config).with_cancellation(self.cancel.child_token())
    }
}

/// Deserialize resource state, reporting problems as validation errors.
/// What a data source is looked up by.
#[derive(Debug, Deserialize)]
struct ServiceLookup {
    project: String,
    service_name: String,
}

fn parse_state<T: DeserializeOwned>(resource: &str, state: Value) -> Result<T, ProviderError> {
    serde_json::from_value(state)
        .map_err(|e| ProviderError::Validation(format!("invalid {resource} state: {e}")))
}

/// Resource timeouts with the state's `timeouts` block applied.
fn timeouts(
    defaults: ResourceTimeouts,
    overrides: Option<&Value>,
) -> Result<ResourceTimeouts, ProviderError> {
    defaults.with_overrides(overrides)
}

/// Accept an in-place update only if nothing but local settings changed.
fn local_only_update(
    resource: &str,
    prior: &Value,
    planned: &Value,
    local: &[&str],
) -> Result<(), ProviderError> {
    let (Some(prior), Some(planned)) = (prior.as_object(), planned.as_object()) else {
        return Err(ProviderError::Validation(format!(
            "{resource} state must be an object"
        )));
    };
    let changed: Vec<&str> = planned
        .iter()
        .filter(|(key, _)| !local.contains(&key.as_str()))
        .filter(|(key, value)| prior.get(key.as_str()) != Some(*value))
        .map(|(key, _)| key.as_str())
        .collect();
    if changed.is_empty() {
        Ok(())
    } else {
        Err(ProviderError::FailedPrecondition(format!(
            "{resource} cannot be updated in place, changed: {}",
            changed.join(", ")
        )))
    }
}

#[async_trait]
impl<A: AivenApi> ProviderService for AivenProvider<A> {
    #[instrument(skip(self, config))]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let config = match ProviderConfig::from_value(config) {
            Ok(config) => config,
            Err(e) => {
                return Ok(vec![
                    Diagnostic::error("Invalid provider configuration").with_detail(e.to_string())
                ])
            },
        };

        let Some(connect) = self.connect else {
            return Ok(vec![]);
        };
        match connect(&config) {
            Ok(api) => {
                *self.api.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(api));
                info!(base_url = %config.resolve_base_url(), "Provider configured");
                Ok(vec![])
            },
            Err(e) => Ok(vec![
                Diagnostic::error("Unable to configure the Aiven client").with_detail(e.to_string())
            ]),
        }
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        info!("Stopping provider, cancelling in-flight waits");
        self.cancel.cancel();
        Ok(())
    }

    #[instrument(skip(self, planned_state))]
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        match resource_type.parse::<ResourceKind>()? {
            ResourceKind::Service(kind) => self.create_service(kind, planned_state).await,
            ResourceKind::KafkaTopic => self.create_kafka_topic(planned_state).await,
            ResourceKind::StaticIp => self.create_static_ip(planned_state).await,
            ResourceKind::Database => self.create_database(planned_state).await,
            ResourceKind::AwsPrivatelink => self.put_aws_privatelink(planned_state, false).await,
            ResourceKind::AzurePrivatelink => self.put_azure_privatelink(planned_state, false).await,
        }
    }

    #[instrument(skip(self, current_state))]
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        match resource_type.parse::<ResourceKind>()? {
            ResourceKind::Service(kind) => self.read_service(kind, current_state).await,
            ResourceKind::KafkaTopic => self.read_kafka_topic(current_state).await,
            ResourceKind::StaticIp => self.read_static_ip(current_state).await,
            ResourceKind::Database => self.read_database(current_state).await,
            ResourceKind::AwsPrivatelink => self.read_aws_privatelink(current_state).await,
            ResourceKind::AzurePrivatelink => self.read_azure_privatelink(current_state).await,
        }
    }

    #[instrument(skip(self, prior_state, planned_state))]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        match resource_type.parse::<ResourceKind>()? {
            ResourceKind::Service(kind) => {
                self.update_service(kind, prior_state, planned_state).await
            },
            ResourceKind::KafkaTopic => {
                self.update_kafka_topic(prior_state, planned_state).await
            },
            ResourceKind::StaticIp => {
                local_only_update("static ip", &prior_state, &planned_state, static_ip::LOCAL)?;
                Ok(planned_state)
            },
            ResourceKind::Database => {
                local_only_update("database", &prior_state, &planned_state, database::LOCAL)?;
                Ok(planned_state)
            },
            ResourceKind::AwsPrivatelink => self.put_aws_privatelink(planned_state, true).await,
            ResourceKind::AzurePrivatelink => self.put_azure_privatelink(planned_state, true).await,
        }
    }

    #[instrument(skip(self, current_state))]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        match resource_type.parse::<ResourceKind>()? {
            ResourceKind::Service(_) => self.delete_service(current_state).await,
            ResourceKind::KafkaTopic => self.delete_kafka_topic(current_state).await,
            ResourceKind::StaticIp => self.delete_static_ip(current_state).await,
            ResourceKind::Database => self.delete_database(current_state).await,
            ResourceKind::AwsPrivatelink => self.delete_aws_privatelink(current_state).await,
            ResourceKind::AzurePrivatelink => self.delete_azure_privatelink(current_state).await,
        }
    }

    #[instrument(skip(self))]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let kind = resource_type.parse::<ResourceKind>()?;
        let state = match kind {
            ResourceKind::Service(kind) => self.import_service(kind, id).await?,
            ResourceKind::KafkaTopic => self.import_kafka_topic(id).await?,
            ResourceKind::StaticIp => self.import_static_ip(id).await?,
            ResourceKind::Database => self.import_database(id).await?,
            ResourceKind::AwsPrivatelink => self.import_aws_privatelink(id).await?,
            ResourceKind::AzurePrivatelink => self.import_azure_privatelink(id).await?,
        };
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    #[instrument(skip(self, config))]
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let kind = data_source_type.parse::<ResourceKind>()?;
        let lookup: ServiceLookup = parse_state(data_source_type, config)?;
        let id = crate::ident::build_resource_id(&[&lookup.project, &lookup.service_name]);
        match kind {
            ResourceKind::Service(kind) => self.import_service(kind, &id).await,
            ResourceKind::AzurePrivatelink => self.import_azure_privatelink(&id).await,
            _ => Err(ProviderError::UnknownResource(format!(
                "Unknown data source type: {}",
                data_source_type
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockApi, ProviderTester, TestError};
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_resource_kind_parsing() {
        assert_eq!(
            "aiven_service".parse::<ResourceKind>().unwrap(),
            ResourceKind::Service(None)
        );
        assert_eq!(
            "aiven_pg".parse::<ResourceKind>().unwrap(),
            ResourceKind::Service(Some(ServiceType::Pg))
        );
        assert_eq!(
            "aiven_kafka_connect".parse::<ResourceKind>().unwrap(),
            ResourceKind::Service(Some(ServiceType::KafkaConnect))
        );
        assert_eq!(
            "aiven_kafka_topic".parse::<ResourceKind>().unwrap(),
            ResourceKind::KafkaTopic
        );
        assert!(matches!(
            "aiven_unknown".parse::<ResourceKind>(),
            Err(ProviderError::UnknownResource(_))
        ));
        assert_err!("pg".parse::<ResourceKind>());
    }

    #[test]
    fn test_resource_kind_names_round_trip() {
        let names = ResourceKind::names();
        assert!(names.contains(&"aiven_grafana".to_string()));
        for name in names {
            assert_eq!(name.parse::<ResourceKind>().unwrap().to_string(), name);
        }
    }

    #[test]
    fn test_local_only_update() {
        let prior = json!({"id": "p/s/t", "partitions": 3, "termination_protection": false});
        let planned = json!({"id": "p/s/t", "partitions": 3, "termination_protection": true});
        assert_ok!(local_only_update("topic", &prior, &planned, &["termination_protection"]));

        let planned = json!({"id": "p/s/t", "partitions": 6, "termination_protection": false});
        let err = local_only_update("topic", &prior, &planned, &["termination_protection"])
            .unwrap_err();
        assert!(err.message().contains("partitions"));
    }

    #[tokio::test]
    async fn test_configure_keeps_injected_api() {
        let tester = ProviderTester::new(AivenProvider::new(MockApi::new()));
        tester.configure(json!({})).await.unwrap();
        assert!(tester.provider().api().is_ok());
    }

    #[tokio::test]
    async fn test_configure_rejects_bad_config() {
        let tester = ProviderTester::new(AivenProvider::new(MockApi::new()));
        let err = tester
            .configure(json!({"api_token": 42}))
            .await
            .unwrap_err();
        assert!(matches!(err, TestError::Diagnostics(_)));
    }

    #[tokio::test]
    async fn test_configure_builds_http_client() {
        let provider = AivenProvider::unconfigured();
        assert!(provider.api().is_err());

        let tester = ProviderTester::new(provider);
        tester
            .configure(json!({"api_token": "secret", "base_url": "https://api.example.com"}))
            .await
            .unwrap();
        assert!(tester.provider().api().is_ok());
    }

    #[tokio::test]
    async fn test_unknown_resource_type() {
        let tester = ProviderTester::new(AivenProvider::new(MockApi::new()));
        let err = tester.create("aiven_nope", json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_service_data_source() {
        let api = MockApi::new();
        api.push_get_service(Ok(crate::testing::service_snapshot("pg-1", "pg", "RUNNING")));
        let tester = ProviderTester::new(AivenProvider::new(api));

        let state = assert_ok!(
            tester
                .read_data_source(
                    "aiven_service",
                    json!({"project": "proj", "service_name": "pg-1"})
                )
                .await
        );
        assert_eq!(state["id"], "proj/pg-1");
        assert_eq!(state["service_type"], "pg");
        assert_eq!(state["state"], "RUNNING");
        assert!(state["pg"].is_object());
    }

    #[tokio::test]
    async fn test_data_source_lookup_failures() {
        let tester = ProviderTester::new(AivenProvider::new(MockApi::new()));
        let lookup = json!({"project": "proj", "service_name": "pg-1"});

        let err = tester
            .read_data_source("aiven_pg", lookup.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));

        let err = tester
            .read_data_source("aiven_kafka_topic", lookup)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));

        assert_err!(
            tester
                .read_data_source("aiven_service", json!({"project": "proj"}))
                .await
        );
    }
}
