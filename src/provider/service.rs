//! `aiven_service` and the per-kind `aiven_<kind>` resources.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, instrument};

use super::{parse_state, timeouts, AivenProvider};
use crate::client::AivenApi;
use crate::config::ResourceTimeouts;
use crate::error::ProviderError;
use crate::ident::{build_resource_id, split_resource_id};
use crate::types::{Component, CreateServiceRequest, Service, ServiceType, UpdateServiceRequest};
use crate::waiter::readiness::StaticIpExpectation;
use crate::waiter::service::{deletion_config, ready_config, ServiceDeleted, ServiceReady};

/// Service resource state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ServiceResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    project: String,
    service_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    service_type: Option<String>,
    plan: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cloud_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    project_vpc_id: Option<String>,
    #[serde(default)]
    termination_protection: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    disk_space_mb: Option<u64>,
    #[serde(default)]
    user_config: Map<String, Value>,
    #[serde(default)]
    static_ips: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    karapace: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeouts: Option<Value>,

    // Computed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state: Option<String>,
    #[serde(default)]
    service_uri: String,
    #[serde(default)]
    service_host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    service_port: Option<u16>,
    #[serde(default)]
    components: Vec<Component>,
}

impl ServiceResource {
    /// The service kind, from the resource type alias or `service_type`.
    fn kind(&self, alias: Option<ServiceType>) -> Result<ServiceType, ProviderError> {
        match (alias, self.service_type.as_deref()) {
            (Some(kind), None) => Ok(kind),
            (Some(kind), Some(declared)) if declared == kind.as_str() => Ok(kind),
            (Some(kind), Some(declared)) => Err(ProviderError::Validation(format!(
                "service_type '{declared}' does not match resource type aiven_{kind}"
            ))),
            (None, Some(declared)) => declared.parse(),
            (None, None) => Err(ProviderError::Validation(
                "service_type is required".to_string(),
            )),
        }
    }

    fn static_ip_expectation(&self) -> StaticIpExpectation {
        StaticIpExpectation::new(&self.user_config, self.static_ips.clone())
    }

    /// Copy the computed attributes of `service`.
    fn apply(&mut self, kind: ServiceType, service: &Service) {
        self.id = Some(build_resource_id(&[&self.project, &self.service_name]));
        self.service_type = Some(kind.to_string());
        self.state = Some(service.state.to_string());
        self.plan = service.plan.clone();
        if !service.cloud_name.is_empty() {
            self.cloud_name = Some(service.cloud_name.clone());
        }
        self.project_vpc_id = service.project_vpc_id.clone();
        self.termination_protection = service.termination_protection;
        if service.disk_space_mb > 0 {
            self.disk_space_mb = Some(service.disk_space_mb);
        }
        self.service_uri = service.service_uri.clone();
        self.service_host = service
            .service_uri_params
            .get("host")
            .cloned()
            .unwrap_or_default();
        self.service_port = service
            .service_uri_params
            .get("port")
            .and_then(|port| port.parse().ok());
        self.components = service.components.clone();
    }

    /// Serialize with the kind specific connection block under the kind name.
    fn into_state(self, kind: ServiceType, service: &Service) -> Result<Value, ProviderError> {
        let mut state = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut state {
            map.insert(
                kind.to_string(),
                Value::Object(kind.connection_info(&service.connection_info)),
            );
        }
        Ok(state)
    }
}

impl<A: AivenApi> AivenProvider<A> {
    #[instrument(skip(self, planned), level = "debug")]
    pub(super) async fn create_service(
        &self,
        alias: Option<ServiceType>,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let mut resource: ServiceResource = parse_state("service", planned)?;
        let kind = resource.kind(alias)?;
        let timeouts = timeouts(ResourceTimeouts::service(), resource.timeouts.as_ref())?;
        let api = self.api()?;

        let request = CreateServiceRequest {
            service_name: resource.service_name.clone(),
            service_type: kind.to_string(),
            plan: resource.plan.clone(),
            cloud_name: resource.cloud_name.clone(),
            project_vpc_id: resource.project_vpc_id.clone(),
            termination_protection: resource.termination_protection,
            disk_space_mb: resource.disk_space_mb,
            user_config: resource.user_config.clone(),
        };
        api.create_service(&resource.project, &request).await?;
        info!(project = %resource.project, service = %resource.service_name, %kind, "Service created, waiting until running");

        let target = ServiceReady::creation(
            &*api,
            &resource.project,
            &resource.service_name,
            resource.static_ip_expectation(),
        );
        let service = self
            .waiter(ready_config(timeouts.create))
            .wait_for(&target)
            .await?;

        resource.apply(kind, &service);
        resource.into_state(kind, &service)
    }

    #[instrument(skip(self, current), level = "debug")]
    pub(super) async fn read_service(
        &self,
        alias: Option<ServiceType>,
        current: Value,
    ) -> Result<Value, ProviderError> {
        let mut resource: ServiceResource = parse_state("service", current)?;
        let kind = resource.kind(alias)?;
        let service = self
            .api()?
            .get_service(&resource.project, &resource.service_name)
            .await?;

        resource.apply(kind, &service);
        resource.into_state(kind, &service)
    }

    #[instrument(skip(self, prior, planned), level = "debug")]
    pub(super) async fn update_service(
        &self,
        alias: Option<ServiceType>,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: ServiceResource = parse_state("service", prior)?;
        let mut resource: ServiceResource = parse_state("service", planned)?;
        let kind = resource.kind(alias)?;
        let timeouts = timeouts(ResourceTimeouts::service(), resource.timeouts.as_ref())?;
        let api = self.api()?;

        // Karapace can be switched on but never off.
        let karapace = (resource.karapace == Some(true) && prior.karapace != Some(true))
            .then_some(true);
        let request = UpdateServiceRequest {
            plan: resource.plan.clone(),
            cloud_name: resource.cloud_name.clone(),
            project_vpc_id: resource.project_vpc_id.clone(),
            powered: true,
            termination_protection: resource.termination_protection,
            disk_space_mb: resource.disk_space_mb,
            karapace,
            user_config: resource.user_config.clone(),
        };
        api.update_service(&resource.project, &resource.service_name, &request)
            .await?;

        let target = ServiceReady::update(
            &*api,
            &resource.project,
            &resource.service_name,
            resource.static_ip_expectation(),
        );
        let service = self
            .waiter(ready_config(timeouts.update))
            .wait_for(&target)
            .await?;

        resource.apply(kind, &service);
        resource.into_state(kind, &service)
    }

    #[instrument(skip(self, current), level = "debug")]
    pub(super) async fn delete_service(&self, current: Value) -> Result<(), ProviderError> {
        let resource: ServiceResource = parse_state("service", current)?;
        if resource.termination_protection {
            return Err(ProviderError::FailedPrecondition(format!(
                "cannot delete service {} while termination_protection is enabled",
                resource.service_name
            )));
        }
        let timeouts = timeouts(ResourceTimeouts::service(), resource.timeouts.as_ref())?;
        let api = self.api()?;

        match api
            .delete_service(&resource.project, &resource.service_name)
            .await
        {
            Ok(()) => {},
            Err(err) if err.is_not_found() => {},
            Err(err) => return Err(err.into()),
        }

        let target = ServiceDeleted::new(
            &*api,
            &resource.project,
            &resource.service_name,
            resource.static_ip_expectation(),
        );
        self.waiter(deletion_config(timeouts.delete))
            .wait_for(&target)
            .await?;
        Ok(())
    }

    pub(super) async fn import_service(
        &self,
        alias: Option<ServiceType>,
        id: &str,
    ) -> Result<Value, ProviderError> {
        let [project, service_name] = split_resource_id::<2>(id)?;
        let service = self.api()?.get_service(project, service_name).await?;

        let mut resource = ServiceResource {
            project: project.to_string(),
            service_name: service_name.to_string(),
            service_type: Some(service.service_type.clone()),
            user_config: service.user_config.clone(),
            ..Default::default()
        };
        let kind = resource.kind(alias)?;
        resource.apply(kind, &service);
        resource.into_state(kind, &service)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::ApiError;
    use crate::provider::ProviderService;
    use crate::testing::{service_snapshot, MockApi, ProviderTester};
    use crate::types::Backup;
    use serde_json::json;

    fn running_pg() -> Service {
        let mut service = service_snapshot("pg-1", "pg", "RUNNING");
        service.backups.push(Backup {
            backup_name: "b1".to_string(),
            backup_time: "2024-01-01T00:00:00Z".to_string(),
            data_size: 1,
        });
        service.service_uri_params.insert("host".to_string(), "pg-1.example.com".to_string());
        service.service_uri_params.insert("port".to_string(), "12345".to_string());
        service
    }

    fn pg_config() -> Value {
        json!({
            "project": "proj",
            "service_name": "pg-1",
            "plan": "startup-4",
            "cloud_name": "google-europe-west1"
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_waits_until_running() {
        let api = MockApi::new();
        api.push_create_service(Ok(service_snapshot("pg-1", "pg", "REBUILDING")));
        api.push_get_service(Ok(service_snapshot("pg-1", "pg", "REBUILDING")))
            .push_get_service(Ok(running_pg()));
        let tester = ProviderTester::new(AivenProvider::new(api));

        let state = tester.create("aiven_pg", pg_config()).await.unwrap();

        assert_eq!(state["id"], "proj/pg-1");
        assert_eq!(state["state"], "RUNNING");
        assert_eq!(state["service_type"], "pg");
        assert_eq!(state["service_host"], "pg-1.example.com");
        assert_eq!(state["service_port"], 12345);
        assert!(state["pg"].is_object());

        let api = tester.provider().api().unwrap();
        assert_eq!(api.last_request("create_service").unwrap()["service_type"], "pg");
        // One REBUILDING, then five consecutive RUNNING.
        assert_eq!(api.calls("get_service"), 6);
    }

    #[tokio::test]
    async fn test_generic_resource_requires_service_type() {
        let tester = ProviderTester::new(AivenProvider::new(MockApi::new()));
        let err = tester.create("aiven_service", pg_config()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));

        let mut config = pg_config();
        config["service_type"] = json!("kafka");
        let err = tester.create("aiven_pg", config).await.unwrap_err();
        assert!(err.message().contains("aiven_pg"));
        assert_eq!(tester.provider().api().unwrap().calls("create_service"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_sends_karapace_only_when_enabled() {
        let api = MockApi::new();
        api.push_update_service(Ok(service_snapshot("kafka-1", "kafka", "RUNNING")));
        api.push_get_service(Ok(service_snapshot("kafka-1", "kafka", "RUNNING")));
        let tester = ProviderTester::new(AivenProvider::new(api));

        let prior = json!({
            "project": "proj", "service_name": "kafka-1", "plan": "business-4", "karapace": false
        });
        let planned = json!({
            "project": "proj", "service_name": "kafka-1", "plan": "business-4", "karapace": true
        });
        tester
            .update("aiven_kafka", prior, planned.clone())
            .await
            .unwrap();
        let api = tester.provider().api().unwrap();
        let body = api.last_request("update_service").unwrap();
        assert_eq!(body["karapace"], true);
        assert_eq!(body["powered"], true);

        tester
            .update("aiven_kafka", planned.clone(), planned)
            .await
            .unwrap();
        let body = api.last_request("update_service").unwrap();
        assert!(body.get("karapace").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_waits_until_gone() {
        let api = MockApi::new();
        api.push_get_service(Ok(service_snapshot("pg-1", "pg", "RUNNING")))
            .push_get_service(Err(ApiError::NotFound("gone".to_string())));
        let tester = ProviderTester::new(AivenProvider::new(api));

        tester.delete("aiven_pg", pg_config()).await.unwrap();
        let api = tester.provider().api().unwrap();
        assert_eq!(api.calls("delete_service"), 1);
        assert_eq!(api.calls("get_service"), 2);
    }

    #[tokio::test]
    async fn test_delete_refused_under_termination_protection() {
        let tester = ProviderTester::new(AivenProvider::new(MockApi::new()));
        let mut config = pg_config();
        config["termination_protection"] = json!(true);

        let err = tester.delete("aiven_pg", config).await.unwrap_err();
        assert!(matches!(err, ProviderError::FailedPrecondition(_)));
        assert_eq!(tester.provider().api().unwrap().calls("delete_service"), 0);
    }

    #[tokio::test]
    async fn test_read_missing_service() {
        let tester = ProviderTester::new(AivenProvider::new(MockApi::new()));
        let err = tester.read("aiven_pg", pg_config()).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_import_service() {
        let api = MockApi::new();
        api.push_get_service(Ok(running_pg()));
        let tester = ProviderTester::new(AivenProvider::new(api));

        let imported = tester.import_resource("aiven_service", "proj/pg-1").await.unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].state["service_type"], "pg");
        assert_eq!(imported[0].state["plan"], "startup-4");

        let err = tester
            .import_resource("aiven_kafka", "proj/pg-1")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
        assert!(tester.import_resource("aiven_pg", "proj").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_create() {
        let api = MockApi::new();
        api.push_create_service(Ok(service_snapshot("pg-1", "pg", "REBUILDING")));
        api.push_get_service(Ok(service_snapshot("pg-1", "pg", "REBUILDING")));
        let provider = AivenProvider::new(api);

        let (result, stopped) = tokio::join!(provider.create("aiven_pg", pg_config()), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            provider.stop().await
        });

        stopped.unwrap();
        assert!(matches!(result, Err(ProviderError::DeadlineExceeded(_))));
    }
}
