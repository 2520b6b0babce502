//! `aiven_aws_privatelink` and `aiven_azure_privatelink`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use super::{parse_state, timeouts, AivenProvider};
use crate::client::AivenApi;
use crate::config::ResourceTimeouts;
use crate::error::ProviderError;
use crate::ident::{build_resource_id, split_resource_id};
use crate::types::{AwsPrivatelink, AwsPrivatelinkRequest, AzurePrivatelink, AzurePrivatelinkRequest};
use crate::waiter::privatelink::{active_config, AwsPrivatelinkActive, AzurePrivatelinkActive};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AwsPrivatelinkResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    project: String,
    service_name: String,
    #[serde(default)]
    principals: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeouts: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    aws_service_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    aws_service_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state: Option<String>,
}

impl AwsPrivatelinkResource {
    fn apply(&mut self, link: &AwsPrivatelink) {
        self.id = Some(build_resource_id(&[&self.project, &self.service_name]));
        self.principals = link.principals.clone();
        self.aws_service_id = link.aws_service_id.clone();
        self.aws_service_name = link.aws_service_name.clone();
        self.state = Some(link.state.to_string());
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AzurePrivatelinkResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    project: String,
    service_name: String,
    #[serde(default)]
    user_subscription_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeouts: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    azure_service_alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    azure_service_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state: Option<String>,
}

impl AzurePrivatelinkResource {
    fn apply(&mut self, link: &AzurePrivatelink) {
        self.id = Some(build_resource_id(&[&self.project, &self.service_name]));
        self.user_subscription_ids = link.user_subscription_ids.clone();
        self.azure_service_alias = link.azure_service_alias.clone();
        self.azure_service_id = link.azure_service_id.clone();
        self.state = Some(link.state.to_string());
    }
}

impl<A: AivenApi> AivenProvider<A> {
    // =========================================================================
    // AWS
    // =========================================================================

    /// Create (`update == false`) or update, then wait until active.
    #[instrument(skip(self, planned), level = "debug")]
    pub(super) async fn put_aws_privatelink(
        &self,
        planned: Value,
        update: bool,
    ) -> Result<Value, ProviderError> {
        let mut resource: AwsPrivatelinkResource = parse_state("AWS privatelink", planned)?;
        let timeouts = timeouts(ResourceTimeouts::privatelink(), resource.timeouts.as_ref())?;
        let api = self.api()?;

        let request = AwsPrivatelinkRequest {
            principals: resource.principals.clone(),
        };
        api.put_aws_privatelink(&resource.project, &resource.service_name, &request, update)
            .await?;
        info!(service = %resource.service_name, update, "AWS privatelink requested, waiting until active");

        let timeout = if update { timeouts.update } else { timeouts.create };
        let target = AwsPrivatelinkActive::new(&*api, &resource.project, &resource.service_name);
        let link = self
            .waiter(active_config(timeout))
            .wait_for(&target)
            .await?;

        resource.apply(&link);
        Ok(serde_json::to_value(resource)?)
    }

    pub(super) async fn read_aws_privatelink(&self, current: Value) -> Result<Value, ProviderError> {
        let mut resource: AwsPrivatelinkResource = parse_state("AWS privatelink", current)?;
        let link = self
            .api()?
            .get_aws_privatelink(&resource.project, &resource.service_name)
            .await?;
        resource.apply(&link);
        Ok(serde_json::to_value(resource)?)
    }

    pub(super) async fn delete_aws_privatelink(&self, current: Value) -> Result<(), ProviderError> {
        let resource: AwsPrivatelinkResource = parse_state("AWS privatelink", current)?;
        match self
            .api()?
            .delete_aws_privatelink(&resource.project, &resource.service_name)
            .await
        {
            Err(err) if !err.is_not_found() => Err(err.into()),
            _ => Ok(()),
        }
    }

    pub(super) async fn import_aws_privatelink(&self, id: &str) -> Result<Value, ProviderError> {
        let [project, service_name] = split_resource_id::<2>(id)?;
        let link = self.api()?.get_aws_privatelink(project, service_name).await?;
        let mut resource = AwsPrivatelinkResource {
            project: project.to_string(),
            service_name: service_name.to_string(),
            ..Default::default()
        };
        resource.apply(&link);
        Ok(serde_json::to_value(resource)?)
    }

    // =========================================================================
    // Azure
    // =========================================================================

    /// Create (`update == false`) or update, then wait until active.
    #[instrument(skip(self, planned), level = "debug")]
    pub(super) async fn put_azure_privatelink(
        &self,
        planned: Value,
        update: bool,
    ) -> Result<Value, ProviderError> {
        let mut resource: AzurePrivatelinkResource = parse_state("Azure privatelink", planned)?;
        let timeouts = timeouts(ResourceTimeouts::privatelink(), resource.timeouts.as_ref())?;
        let api = self.api()?;

        let request = AzurePrivatelinkRequest {
            user_subscription_ids: resource.user_subscription_ids.clone(),
        };
        api.put_azure_privatelink(&resource.project, &resource.service_name, &request, update)
            .await?;
        info!(service = %resource.service_name, update, "Azure privatelink requested, waiting until active");

        let timeout = if update { timeouts.update } else { timeouts.create };
        let target = AzurePrivatelinkActive::new(&*api, &resource.project, &resource.service_name);
        let link = self
            .waiter(active_config(timeout))
            .wait_for(&target)
            .await?;

        resource.apply(&link);
        Ok(serde_json::to_value(resource)?)
    }

    pub(super) async fn read_azure_privatelink(&self, current: Value) -> Result<Value, ProviderError> {
        let mut resource: AzurePrivatelinkResource = parse_state("Azure privatelink", current)?;
        let link = self
            .api()?
            .get_azure_privatelink(&resource.project, &resource.service_name)
            .await?;
        resource.apply(&link);
        Ok(serde_json::to_value(resource)?)
    }

    pub(super) async fn delete_azure_privatelink(&self, current: Value) -> Result<(), ProviderError> {
        let resource: AzurePrivatelinkResource = parse_state("Azure privatelink", current)?;
        match self
            .api()?
            .delete_azure_privatelink(&resource.project, &resource.service_name)
            .await
        {
            Err(err) if !err.is_not_found() => Err(err.into()),
            _ => Ok(()),
        }
    }

    pub(super) async fn import_azure_privatelink(&self, id: &str) -> Result<Value, ProviderError> {
        let [project, service_name] = split_resource_id::<2>(id)?;
        let link = self.api()?.get_azure_privatelink(project, service_name).await?;
        let mut resource = AzurePrivatelinkResource {
            project: project.to_string(),
            service_name: service_name.to_string(),
            ..Default::default()
        };
        resource.apply(&link);
        Ok(serde_json::to_value(resource)?)
    }
}
