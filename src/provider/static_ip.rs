//! `aiven_static_ip`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use super::{parse_state, timeouts, AivenProvider};
use crate::client::AivenApi;
use crate::config::ResourceTimeouts;
use crate::error::ProviderError;
use crate::ident::{build_resource_id, split_resource_id};
use crate::types::{CreateStaticIpRequest, StaticIp};
use crate::waiter::static_ip::{create_config, StaticIpCreated};

/// Attributes an in-place update may change.
pub(super) const LOCAL: &[&str] = &["timeouts"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StaticIpResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    project: String,
    cloud_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeouts: Option<Value>,
    #[serde(default)]
    static_ip_address_id: String,
    #[serde(default)]
    ip_address: String,
    #[serde(default)]
    service_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state: Option<String>,
}

impl StaticIpResource {
    fn apply(&mut self, ip: &StaticIp) {
        self.id = Some(build_resource_id(&[
            &self.project,
            &ip.static_ip_address_id,
        ]));
        self.static_ip_address_id = ip.static_ip_address_id.clone();
        self.ip_address = ip.ip_address.clone();
        self.service_name = ip.service_name.clone();
        self.state = Some(ip.state.to_string());
        if !ip.cloud_name.is_empty() {
            self.cloud_name = ip.cloud_name.clone();
        }
    }
}

impl<A: AivenApi> AivenProvider<A> {
    async fn find_static_ip(&self, project: &str, id: &str) -> Result<StaticIp, ProviderError> {
        self.api()?
            .list_static_ips(project)
            .await?
            .into_iter()
            .find(|ip| ip.static_ip_address_id == id)
            .ok_or_else(|| ProviderError::NotFound(format!("static ip {project}/{id}")))
    }

    #[instrument(skip(self, planned), level = "debug")]
    pub(super) async fn create_static_ip(&self, planned: Value) -> Result<Value, ProviderError> {
        let mut resource: StaticIpResource = parse_state("static ip", planned)?;
        let timeouts = timeouts(ResourceTimeouts::static_ip(), resource.timeouts.as_ref())?;
        let api = self.api()?;

        let request = CreateStaticIpRequest {
            cloud_name: resource.cloud_name.clone(),
        };
        let created = api.create_static_ip(&resource.project, &request).await?;
        debug!(id = %created.static_ip_address_id, "Static IP allocated");

        let target = StaticIpCreated::new(&*api, &resource.project, &created.static_ip_address_id);
        let listed = self
            .waiter(create_config(timeouts.create))
            .wait_for(&target)
            .await?;

        resource.apply(&listed.unwrap_or(created));
        Ok(serde_json::to_value(resource)?)
    }

    #[instrument(skip(self, current), level = "debug")]
    pub(super) async fn read_static_ip(&self, current: Value) -> Result<Value, ProviderError> {
        let mut resource: StaticIpResource = parse_state("static ip", current)?;
        let ip = self
            .find_static_ip(&resource.project, &resource.static_ip_address_id)
            .await?;
        resource.apply(&ip);
        Ok(serde_json::to_value(resource)?)
    }

    #[instrument(skip(self, current), level = "debug")]
    pub(super) async fn delete_static_ip(&self, current: Value) -> Result<(), ProviderError> {
        let resource: StaticIpResource = parse_state("static ip", current)?;
        match self
            .api()?
            .delete_static_ip(&resource.project, &resource.static_ip_address_id)
            .await
        {
            Err(err) if !err.is_not_found() => Err(err.into()),
            _ => Ok(()),
        }
    }

    pub(super) async fn import_static_ip(&self, id: &str) -> Result<Value, ProviderError> {
        let [project, static_ip_id] = split_resource_id::<2>(id)?;
        let ip = self.find_static_ip(project, static_ip_id).await?;
        let mut resource = StaticIpResource {
            project: project.to_string(),
            ..Default::default()
        };
        resource.apply(&ip);
        Ok(serde_json::to_value(resource)?)
    }
}
