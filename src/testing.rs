//! Testing utilities.
//!
//! [`MockApi`] is an [`AivenApi`] serving scripted responses, so waiters and
//! resource handlers can be exercised without the real API. [`ProviderTester`]
//! drives a [`ProviderService`] the way the plugin host would.
//!
//! # Example
//!
//! ```ignore
//! use aiven_provider::testing::{service_snapshot, MockApi, ProviderTester};
//! use aiven_provider::AivenProvider;
//! use serde_json::json;
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_create_service() {
//!     let api = MockApi::new();
//!     api.push_create_service(Ok(service_snapshot("pg-1", "pg", "REBUILDING")));
//!     api.push_get_service(Ok(service_snapshot("pg-1", "pg", "RUNNING")));
//!
//!     let tester = ProviderTester::new(AivenProvider::new(api));
//!     let state = tester.create("aiven_pg", json!({
//!         "project": "proj",
//!         "service_name": "pg-1",
//!         "plan": "startup-4"
//!     })).await.unwrap();
//!     assert_eq!(state["state"], "RUNNING");
//! }
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::client::AivenApi;
use crate::error::{ApiError, ProviderError};
use crate::provider::{Diagnostic, DiagnosticSeverity, ImportedResource, ProviderService};
use crate::status::{ServiceState, StaticIpState, TopicState};
use crate::types::{
    AwsPrivatelink, AwsPrivatelinkRequest, AzurePrivatelink, AzurePrivatelinkRequest,
    CreateDatabaseRequest, CreateKafkaTopicRequest, CreateServiceRequest, CreateStaticIpRequest,
    Database, KafkaTopic, Service, StaticIp, UpdateKafkaTopicRequest, UpdateServiceRequest,
};

// =========================================================================
// Scripted API
// =========================================================================

/// Queue of responses for one method; the last response repeats forever.
struct Script<T> {
    queue: Mutex<VecDeque<Result<T, ApiError>>>,
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }
}

impl<T: Clone> Script<T> {
    fn push(&self, result: Result<T, ApiError>) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(result);
    }

    fn next(&self) -> Option<Result<T, ApiError>> {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

macro_rules! scripts {
    ($( $(#[$meta:meta])* $push:ident => $field:ident: $ty:ty, )+) => {
        #[derive(Default)]
        struct Scripts {
            $( $field: Script<$ty>, )+
        }

        impl MockApi {
            $(
                $(#[$meta])*
                pub fn $push(&self, result: Result<$ty, ApiError>) -> &Self {
                    self.scripts.$field.push(result);
                    self
                }
            )+
        }
    };
}

scripts! {
    /// Script `get_service`; unscripted it reports not found.
    push_get_service => get_service: Service,
    /// Script `create_service`.
    push_create_service => create_service: Service,
    /// Script `update_service`.
    push_update_service => update_service: Service,
    /// Script `delete_service`; unscripted it succeeds.
    push_delete_service => delete_service: (),
    /// Script `list_static_ips`; unscripted it returns nothing.
    push_list_static_ips => list_static_ips: Vec<StaticIp>,
    /// Script `create_static_ip`.
    push_create_static_ip => create_static_ip: StaticIp,
    /// Script `delete_static_ip`; unscripted it succeeds.
    push_delete_static_ip => delete_static_ip: (),
    /// Script `get_kafka_topic`; unscripted it reports not found.
    push_get_kafka_topic => get_kafka_topic: KafkaTopic,
    /// Script `list_kafka_topics`; unscripted it returns nothing.
    push_list_kafka_topics => list_kafka_topics: Vec<KafkaTopic>,
    /// Script `create_kafka_topic`; unscripted it succeeds.
    push_create_kafka_topic => create_kafka_topic: (),
    /// Script `update_kafka_topic`; unscripted it succeeds.
    push_update_kafka_topic => update_kafka_topic: (),
    /// Script `delete_kafka_topic`; unscripted it succeeds.
    push_delete_kafka_topic => delete_kafka_topic: (),
    /// Script `list_databases`; unscripted it returns nothing.
    push_list_databases => list_databases: Vec<Database>,
    /// Script `create_database`; unscripted it succeeds.
    push_create_database => create_database: (),
    /// Script `delete_database`; unscripted it succeeds.
    push_delete_database => delete_database: (),
    /// Script `get_aws_privatelink`; unscripted it reports not found.
    push_get_aws_privatelink => get_aws_privatelink: AwsPrivatelink,
    /// Script `put_aws_privatelink`.
    push_put_aws_privatelink => put_aws_privatelink: AwsPrivatelink,
    /// Script `delete_aws_privatelink`; unscripted it succeeds.
    push_delete_aws_privatelink => delete_aws_privatelink: (),
    /// Script `get_azure_privatelink`; unscripted it reports not found.
    push_get_azure_privatelink => get_azure_privatelink: AzurePrivatelink,
    /// Script `put_azure_privatelink`.
    push_put_azure_privatelink => put_azure_privatelink: AzurePrivatelink,
    /// Script `delete_azure_privatelink`; unscripted it succeeds.
    push_delete_azure_privatelink => delete_azure_privatelink: (),
}

/// An [`AivenApi`] answering from per-method scripts.
///
/// Every call is counted and write requests are recorded as JSON.
#[derive(Default)]
pub struct MockApi {
    scripts: Scripts,
    calls: Mutex<HashMap<&'static str, usize>>,
    requests: Mutex<Vec<(&'static str, Value)>>,
}

impl MockApi {
    /// Create a mock with nothing scripted.
    pub fn new() -> Self {
        Self::default()
    }

    /// How often `method` was called.
    pub fn calls(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(method)
            .copied()
            .unwrap_or(0)
    }

    /// The body of the latest `method` request, if any.
    pub fn last_request(&self, method: &str) -> Option<Value> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find(|(name, _)| *name == method)
            .map(|(_, body)| body.clone())
    }

    fn record(&self, method: &'static str) {
        *self
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(method)
            .or_default() += 1;
    }

    fn record_request<R: Serialize>(&self, method: &'static str, request: &R) {
        self.record(method);
        let body = serde_json::to_value(request).unwrap_or(Value::Null);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((method, body));
    }
}

fn not_found(what: &str) -> ApiError {
    ApiError::NotFound(format!("{what} not found"))
}

fn unscripted(method: &str) -> ApiError {
    ApiError::Api {
        status: 501,
        message: format!("no scripted response for {method}"),
    }
}

#[async_trait]
impl AivenApi for MockApi {
    async fn get_service(&self, _project: &str, service: &str) -> Result<Service, ApiError> {
        self.record("get_service");
        self.scripts
            .get_service
            .next()
            .unwrap_or_else(|| Err(not_found(service)))
    }

    async fn create_service(
        &self,
        _project: &str,
        request: &CreateServiceRequest,
    ) -> Result<Service, ApiError> {
        self.record_request("create_service", request);
        self.scripts
            .create_service
            .next()
            .unwrap_or_else(|| Err(unscripted("create_service")))
    }

    async fn update_service(
        &self,
        _project: &str,
        _service: &str,
        request: &UpdateServiceRequest,
    ) -> Result<Service, ApiError> {
        self.record_request("update_service", request);
        self.scripts
            .update_service
            .next()
            .unwrap_or_else(|| Err(unscripted("update_service")))
    }

    async fn delete_service(&self, _project: &str, _service: &str) -> Result<(), ApiError> {
        self.record("delete_service");
        self.scripts.delete_service.next().unwrap_or(Ok(()))
    }

    async fn list_static_ips(&self, _project: &str) -> Result<Vec<StaticIp>, ApiError> {
        self.record("list_static_ips");
        self.scripts
            .list_static_ips
            .next()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn create_static_ip(
        &self,
        _project: &str,
        request: &CreateStaticIpRequest,
    ) -> Result<StaticIp, ApiError> {
        self.record_request("create_static_ip", request);
        self.scripts
            .create_static_ip
            .next()
            .unwrap_or_else(|| Err(unscripted("create_static_ip")))
    }

    async fn delete_static_ip(&self, _project: &str, _static_ip_id: &str) -> Result<(), ApiError> {
        self.record("delete_static_ip");
        self.scripts.delete_static_ip.next().unwrap_or(Ok(()))
    }

    async fn get_kafka_topic(
        &self,
        _project: &str,
        _service: &str,
        topic: &str,
    ) -> Result<KafkaTopic, ApiError> {
        self.record("get_kafka_topic");
        self.scripts
            .get_kafka_topic
            .next()
            .unwrap_or_else(|| Err(not_found(topic)))
    }

    async fn list_kafka_topics(
        &self,
        _project: &str,
        _service: &str,
        topics: &[String],
    ) -> Result<Vec<KafkaTopic>, ApiError> {
        self.record_request("list_kafka_topics", &topics);
        self.scripts
            .list_kafka_topics
            .next()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn create_kafka_topic(
        &self,
        _project: &str,
        _service: &str,
        request: &CreateKafkaTopicRequest,
    ) -> Result<(), ApiError> {
        self.record_request("create_kafka_topic", request);
        self.scripts.create_kafka_topic.next().unwrap_or(Ok(()))
    }

    async fn update_kafka_topic(
        &self,
        _project: &str,
        _service: &str,
        _topic: &str,
        request: &UpdateKafkaTopicRequest,
    ) -> Result<(), ApiError> {
        self.record_request("update_kafka_topic", request);
        self.scripts.update_kafka_topic.next().unwrap_or(Ok(()))
    }

    async fn delete_kafka_topic(
        &self,
        _project: &str,
        _service: &str,
        _topic: &str,
    ) -> Result<(), ApiError> {
        self.record("delete_kafka_topic");
        self.scripts.delete_kafka_topic.next().unwrap_or(Ok(()))
    }

    async fn list_databases(
        &self,
        _project: &str,
        _service: &str,
    ) -> Result<Vec<Database>, ApiError> {
        self.record("list_databases");
        self.scripts
            .list_databases
            .next()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn create_database(
        &self,
        _project: &str,
        _service: &str,
        request: &CreateDatabaseRequest,
    ) -> Result<(), ApiError> {
        self.record_request("create_database", request);
        self.scripts.create_database.next().unwrap_or(Ok(()))
    }

    async fn delete_database(
        &self,
        _project: &str,
        _service: &str,
        _database: &str,
    ) -> Result<(), ApiError> {
        self.record("delete_database");
        self.scripts.delete_database.next().unwrap_or(Ok(()))
    }

    async fn get_aws_privatelink(
        &self,
        _project: &str,
        service: &str,
    ) -> Result<AwsPrivatelink, ApiError> {
        self.record("get_aws_privatelink");
        self.scripts
            .get_aws_privatelink
            .next()
            .unwrap_or_else(|| Err(not_found(service)))
    }

    async fn put_aws_privatelink(
        &self,
        _project: &str,
        _service: &str,
        request: &AwsPrivatelinkRequest,
        _update: bool,
    ) -> Result<AwsPrivatelink, ApiError> {
        self.record_request("put_aws_privatelink", request);
        self.scripts
            .put_aws_privatelink
            .next()
            .unwrap_or_else(|| Err(unscripted("put_aws_privatelink")))
    }

    async fn delete_aws_privatelink(&self, _project: &str, _service: &str) -> Result<(), ApiError> {
        self.record("delete_aws_privatelink");
        self.scripts.delete_aws_privatelink.next().unwrap_or(Ok(()))
    }

    async fn get_azure_privatelink(
        &self,
        _project: &str,
        service: &str,
    ) -> Result<AzurePrivatelink, ApiError> {
        self.record("get_azure_privatelink");
        self.scripts
            .get_azure_privatelink
            .next()
            .unwrap_or_else(|| Err(not_found(service)))
    }

    async fn put_azure_privatelink(
        &self,
        _project: &str,
        _service: &str,
        request: &AzurePrivatelinkRequest,
        _update: bool,
    ) -> Result<AzurePrivatelink, ApiError> {
        self.record_request("put_azure_privatelink", request);
        self.scripts
            .put_azure_privatelink
            .next()
            .unwrap_or_else(|| Err(unscripted("put_azure_privatelink")))
    }

    async fn delete_azure_privatelink(
        &self,
        _project: &str,
        _service: &str,
    ) -> Result<(), ApiError> {
        self.record("delete_azure_privatelink");
        self.scripts.delete_azure_privatelink.next().unwrap_or(Ok(()))
    }
}

// =========================================================================
// Snapshot fixtures
// =========================================================================

/// A minimal service snapshot.
pub fn service_snapshot(name: &str, service_type: &str, state: &str) -> Service {
    Service {
        service_name: name.to_string(),
        service_type: service_type.to_string(),
        state: ServiceState::from(state),
        plan: "startup-4".to_string(),
        cloud_name: "google-europe-west1".to_string(),
        backups: Vec::new(),
        components: Vec::new(),
        service_integrations: Vec::new(),
        user_config: serde_json::Map::new(),
        connection_info: Default::default(),
        service_uri: String::new(),
        service_uri_params: HashMap::new(),
        termination_protection: false,
        disk_space_mb: 0,
        project_vpc_id: None,
    }
}

/// A minimal topic snapshot.
pub fn topic_snapshot(name: &str, state: &str) -> KafkaTopic {
    KafkaTopic {
        topic_name: name.to_string(),
        state: TopicState::from(state),
        partitions: Vec::new(),
        replication: 2,
        config: serde_json::Map::new(),
        tags: Vec::new(),
    }
}

/// A static IP snapshot; an empty `service` means unbound.
pub fn static_ip_snapshot(id: &str, state: &str, service: &str) -> StaticIp {
    StaticIp {
        static_ip_address_id: id.to_string(),
        state: StaticIpState::from(state),
        ip_address: String::new(),
        cloud_name: "google-europe-west1".to_string(),
        service_name: service.to_string(),
    }
}

// =========================================================================
// Provider harness
// =========================================================================

/// A test harness for [`ProviderService`] implementations.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Configure the provider.
    ///
    /// Returns `Err` with the diagnostics if there are errors.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Stop the provider.
    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    /// Create a new resource.
    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read the current state of a resource.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update an existing resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import an existing resource.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Read a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    /// Run create followed by read and return the state read back.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let created = self.create(resource_type, config).await?;
        self.read(resource_type, created).await
    }
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation failed with diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed with a provider error.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics
        .into_iter()
        .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

/// Assert that diagnostics contain an error with the given summary substring.
///
/// # Panics
///
/// Panics if no error diagnostic contains the given substring.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let has_matching_error = diagnostics
        .iter()
        .any(|d| matches!(d.severity, DiagnosticSeverity::Error) && d.summary.contains(substring));

    assert!(
        has_matching_error,
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_repeats_last_response() {
        let api = MockApi::new();
        api.push_get_service(Ok(service_snapshot("pg-1", "pg", "REBUILDING")))
            .push_get_service(Ok(service_snapshot("pg-1", "pg", "RUNNING")));

        let first = api.get_service("p", "pg-1").await.unwrap();
        let second = api.get_service("p", "pg-1").await.unwrap();
        let third = api.get_service("p", "pg-1").await.unwrap();
        assert_eq!(first.state, ServiceState::Rebuilding);
        assert_eq!(second.state, ServiceState::Running);
        assert_eq!(third.state, ServiceState::Running);
        assert_eq!(api.calls("get_service"), 3);
    }

    #[tokio::test]
    async fn test_unscripted_defaults() {
        let api = MockApi::new();
        assert!(api.get_service("p", "s").await.unwrap_err().is_not_found());
        assert!(api.list_static_ips("p").await.unwrap().is_empty());
        assert!(api.delete_service("p", "s").await.is_ok());
        assert!(matches!(
            api.put_aws_privatelink("p", "s", &AwsPrivatelinkRequest { principals: vec![] }, false)
                .await,
            Err(ApiError::Api { status: 501, .. })
        ));
        assert_eq!(api.calls("create_service"), 0);
    }

    #[tokio::test]
    async fn test_records_requests() {
        let api = MockApi::new();
        let request = CreateDatabaseRequest {
            database: "app".to_string(),
            lc_collate: None,
            lc_ctype: None,
        };
        api.create_database("p", "pg-1", &request).await.unwrap();
        assert_eq!(
            api.last_request("create_database").unwrap()["database"],
            "app"
        );
        assert!(api.last_request("create_service").is_none());
    }

    #[test]
    fn test_check_diagnostics() {
        assert!(check_diagnostics(vec![Diagnostic::warning("careful")]).is_ok());
        let err = check_diagnostics(vec![Diagnostic::error("broken")]).unwrap_err();
        match err {
            TestError::Diagnostics(diags) => assert_error_contains(&diags, "broken"),
            TestError::Provider(e) => panic!("unexpected provider error {e}"),
        }
    }
}
