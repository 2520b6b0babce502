//! `aiven_kafka_topic`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, instrument};

use super::{parse_state, timeouts, AivenProvider};
use crate::client::AivenApi;
use crate::config::ResourceTimeouts;
use crate::error::ProviderError;
use crate::ident::{build_resource_id, split_resource_id};
use crate::types::{CreateKafkaTopicRequest, KafkaTopic, TopicTag, UpdateKafkaTopicRequest};
use crate::waiter::kafka_topic::{
    availability_config, create_config, delete_config, TopicAvailable, TopicCreated, TopicDeleted,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct KafkaTopicResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    project: String,
    service_name: String,
    topic_name: String,
    partitions: u32,
    replication: u32,
    #[serde(default)]
    config: Map<String, Value>,
    #[serde(default)]
    tags: Vec<TopicTag>,
    #[serde(default)]
    termination_protection: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeouts: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state: Option<String>,
}

impl KafkaTopicResource {
    fn apply(&mut self, topic: &KafkaTopic) {
        self.id = Some(build_resource_id(&[
            &self.project,
            &self.service_name,
            &self.topic_name,
        ]));
        self.state = Some(topic.state.to_string());
        if !topic.partitions.is_empty() {
            self.partitions = u32::try_from(topic.partitions.len()).unwrap_or(u32::MAX);
        }
        if topic.replication > 0 {
            self.replication = topic.replication;
        }
        self.tags = topic.tags.clone();
    }
}

impl<A: AivenApi> AivenProvider<A> {
    /// Wait until the topic is listed as active, reading through the cache.
    async fn await_topic(
        &self,
        resource: &KafkaTopicResource,
        timeout: std::time::Duration,
        ignore_not_found: bool,
    ) -> Result<KafkaTopic, ProviderError> {
        let api = self.api()?;
        let target = TopicAvailable::new(
            &*api,
            self.topic_cache(),
            &resource.project,
            &resource.service_name,
            &resource.topic_name,
        )
        .ignore_not_found(ignore_not_found);
        Ok(self
            .waiter(availability_config(timeout))
            .wait_for(&target)
            .await?)
    }

    #[instrument(skip(self, planned), level = "debug")]
    pub(super) async fn create_kafka_topic(&self, planned: Value) -> Result<Value, ProviderError> {
        let mut resource: KafkaTopicResource = parse_state("kafka topic", planned)?;
        let timeouts = timeouts(ResourceTimeouts::kafka_topic(), resource.timeouts.as_ref())?;
        let api = self.api()?;

        let request = CreateKafkaTopicRequest {
            topic_name: resource.topic_name.clone(),
            partitions: resource.partitions,
            replication: resource.replication,
            config: resource.config.clone(),
            tags: resource.tags.clone(),
        };
        let target = TopicCreated::new(&*api, &resource.project, &resource.service_name, request);
        self.waiter(create_config(timeouts.create))
            .wait_for(&target)
            .await?;
        info!(topic = %resource.topic_name, "Kafka topic accepted, waiting until active");

        // A fresh topic may take a while to be listed at all.
        let topic = self.await_topic(&resource, timeouts.create, true).await?;
        resource.apply(&topic);
        Ok(serde_json::to_value(resource)?)
    }

    #[instrument(skip(self, current), level = "debug")]
    pub(super) async fn read_kafka_topic(&self, current: Value) -> Result<Value, ProviderError> {
        let mut resource: KafkaTopicResource = parse_state("kafka topic", current)?;
        let timeouts = timeouts(ResourceTimeouts::kafka_topic(), resource.timeouts.as_ref())?;

        self.topic_cache().forget_topic(
            &resource.project,
            &resource.service_name,
            &resource.topic_name,
        );
        let topic = self.await_topic(&resource, timeouts.read, false).await?;
        resource.apply(&topic);
        Ok(serde_json::to_value(resource)?)
    }

    #[instrument(skip(self, prior, planned), level = "debug")]
    pub(super) async fn update_kafka_topic(
        &self,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: KafkaTopicResource = parse_state("kafka topic", prior)?;
        let mut resource: KafkaTopicResource = parse_state("kafka topic", planned)?;
        let moved = [
            ("project", &prior.project, &resource.project),
            ("service_name", &prior.service_name, &resource.service_name),
            ("topic_name", &prior.topic_name, &resource.topic_name),
        ]
        .into_iter()
        .filter(|(_, old, new)| old != new)
        .map(|(field, _, _)| field)
        .collect::<Vec<_>>();
        if !moved.is_empty() {
            return Err(ProviderError::FailedPrecondition(format!(
                "kafka topic cannot be updated in place, changed: {}",
                moved.join(", ")
            )));
        }
        let timeouts = timeouts(ResourceTimeouts::kafka_topic(), resource.timeouts.as_ref())?;
        let api = self.api()?;

        let request = UpdateKafkaTopicRequest {
            partitions: resource.partitions,
            replication: resource.replication,
            config: resource.config.clone(),
            tags: resource.tags.clone(),
        };
        api.update_kafka_topic(
            &resource.project,
            &resource.service_name,
            &resource.topic_name,
            &request,
        )
        .await?;
        info!(topic = %resource.topic_name, "Kafka topic updated, waiting until active");

        self.topic_cache().forget_topic(
            &resource.project,
            &resource.service_name,
            &resource.topic_name,
        );
        let topic = self.await_topic(&resource, timeouts.update, false).await?;
        resource.apply(&topic);
        Ok(serde_json::to_value(resource)?)
    }

    #[instrument(skip(self, current), level = "debug")]
    pub(super) async fn delete_kafka_topic(&self, current: Value) -> Result<(), ProviderError> {
        let resource: KafkaTopicResource = parse_state("kafka topic", current)?;
        if resource.termination_protection {
            return Err(ProviderError::FailedPrecondition(format!(
                "cannot delete kafka topic {} while termination_protection is enabled",
                resource.topic_name
            )));
        }
        let timeouts = timeouts(ResourceTimeouts::kafka_topic(), resource.timeouts.as_ref())?;
        let api = self.api()?;

        let target = TopicDeleted::new(
            &*api,
            self.topic_cache(),
            &resource.project,
            &resource.service_name,
            &resource.topic_name,
        );
        self.waiter(delete_config(timeouts.delete))
            .wait_for(&target)
            .await?;
        Ok(())
    }

    pub(super) async fn import_kafka_topic(&self, id: &str) -> Result<Value, ProviderError> {
        let [project, service_name, topic_name] = split_resource_id::<3>(id)?;
        let mut resource = KafkaTopicResource {
            project: project.to_string(),
            service_name: service_name.to_string(),
            topic_name: topic_name.to_string(),
            ..Default::default()
        };
        let topic = self
            .await_topic(&resource, ResourceTimeouts::kafka_topic().read, false)
            .await?;
        resource.config = topic.config.clone();
        resource.apply(&topic);
        Ok(serde_json::to_value(resource)?)
    }
}
