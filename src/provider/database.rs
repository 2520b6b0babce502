//! `aiven_database`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use super::{parse_state, timeouts, AivenProvider};
use crate::client::AivenApi;
use crate::config::ResourceTimeouts;
use crate::error::ProviderError;
use crate::ident::{build_resource_id, split_resource_id};
use crate::types::{CreateDatabaseRequest, Database};
use crate::waiter::database::{delete_config, DatabaseDeleted};

/// Attributes an in-place update may change.
pub(super) const LOCAL: &[&str] = &["termination_protection", "timeouts"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DatabaseResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    project: String,
    service_name: String,
    database_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lc_collate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lc_ctype: Option<String>,
    #[serde(default)]
    termination_protection: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeouts: Option<Value>,
}

impl DatabaseResource {
    fn apply(&mut self, database: &Database) {
        self.id = Some(build_resource_id(&[
            &self.project,
            &self.service_name,
            &self.database_name,
        ]));
        if !database.lc_collate.is_empty() {
            self.lc_collate = Some(database.lc_collate.clone());
        }
        if !database.lc_ctype.is_empty() {
            self.lc_ctype = Some(database.lc_ctype.clone());
        }
    }
}

impl<A: AivenApi> AivenProvider<A> {
    async fn find_database(
        &self,
        project: &str,
        service: &str,
        name: &str,
    ) -> Result<Database, ProviderError> {
        self.api()?
            .list_databases(project, service)
            .await?
            .into_iter()
            .find(|db| db.database_name == name)
            .ok_or_else(|| ProviderError::NotFound(format!("database {project}/{service}/{name}")))
    }

    #[instrument(skip(self, planned), level = "debug")]
    pub(super) async fn create_database(&self, planned: Value) -> Result<Value, ProviderError> {
        let mut resource: DatabaseResource = parse_state("database", planned)?;
        let request = CreateDatabaseRequest {
            database: resource.database_name.clone(),
            lc_collate: resource.lc_collate.clone(),
            lc_ctype: resource.lc_ctype.clone(),
        };
        self.api()?
            .create_database(&resource.project, &resource.service_name, &request)
            .await?;

        let database = self
            .find_database(&resource.project, &resource.service_name, &resource.database_name)
            .await?;
        resource.apply(&database);
        Ok(serde_json::to_value(resource)?)
    }

    #[instrument(skip(self, current), level = "debug")]
    pub(super) async fn read_database(&self, current: Value) -> Result<Value, ProviderError> {
        let mut resource: DatabaseResource = parse_state("database", current)?;
        let database = self
            .find_database(&resource.project, &resource.service_name, &resource.database_name)
            .await?;
        resource.apply(&database);
        Ok(serde_json::to_value(resource)?)
    }

    #[instrument(skip(self, current), level = "debug")]
    pub(super) async fn delete_database(&self, current: Value) -> Result<(), ProviderError> {
        let resource: DatabaseResource = parse_state("database", current)?;
        if resource.termination_protection {
            return Err(ProviderError::FailedPrecondition(format!(
                "cannot delete database {} while termination_protection is enabled",
                resource.database_name
            )));
        }
        let timeouts = timeouts(ResourceTimeouts::database(), resource.timeouts.as_ref())?;
        let api = self.api()?;

        let target = DatabaseDeleted::new(
            &*api,
            &resource.project,
            &resource.service_name,
            &resource.database_name,
        );
        self.waiter(delete_config(timeouts.delete))
            .wait_for(&target)
            .await?;
        Ok(())
    }

    pub(super) async fn import_database(&self, id: &str) -> Result<Value, ProviderError> {
        let [project, service_name, database_name] = split_resource_id::<3>(id)?;
        let database = self.find_database(project, service_name, database_name).await?;
        let mut resource = DatabaseResource {
            project: project.to_string(),
            service_name: service_name.to_string(),
            database_name: database_name.to_string(),
            ..Default::default()
        };
        resource.apply(&database);
        Ok(serde_json::to_value(resource)?)
    }
}
