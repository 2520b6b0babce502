//! Kafka topic create, availability and delete waits.
//!
//! Topic creation is asynchronous on the Kafka side: the create call can fail
//! while brokers are busy, and a created topic takes a while to show up in the
//! listing. Reads go through the shared [`TopicCache`] so many topics of one
//! service are fetched with a single batch call.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{Observation, PollTarget};
use crate::cache::{TopicCache, MAX_BATCH};
use crate::client::AivenApi;
use crate::config::WaitConfig;
use crate::error::ApiError;
use crate::status::{RemovalState, TopicCreateState, TopicState};
use crate::types::{CreateKafkaTopicRequest, KafkaTopic};

/// Loop settings of topic create waits.
pub fn create_config(timeout: Duration) -> WaitConfig {
    WaitConfig::new(timeout).with_min_poll_interval(Duration::from_secs(2))
}

/// Loop settings of topic availability waits.
pub fn availability_config(timeout: Duration) -> WaitConfig {
    WaitConfig::new(timeout).with_min_poll_interval(Duration::from_secs(2))
}

/// Loop settings of topic delete waits.
pub fn delete_config(timeout: Duration) -> WaitConfig {
    WaitConfig::new(timeout)
        .with_initial_delay(Duration::from_secs(1))
        .with_min_poll_interval(Duration::from_secs(1))
}

/// Issues the create request until the API accepts it.
pub struct TopicCreated<'a, A: AivenApi + ?Sized> {
    api: &'a A,
    project: String,
    service: String,
    request: CreateKafkaTopicRequest,
}

impl<'a, A: AivenApi + ?Sized> TopicCreated<'a, A> {
    /// Create `request.topic_name` on `service`.
    pub fn new(
        api: &'a A,
        project: impl Into<String>,
        service: impl Into<String>,
        request: CreateKafkaTopicRequest,
    ) -> Self {
        Self {
            api,
            project: project.into(),
            service: service.into(),
            request,
        }
    }
}

#[async_trait]
impl<'a, A: AivenApi + ?Sized> PollTarget for TopicCreated<'a, A> {
    type Snapshot = CreateKafkaTopicRequest;
    type Status = TopicCreateState;

    fn describe(&self) -> String {
        format!(
            "creation of kafka topic {}/{}/{}",
            self.project, self.service, self.request.topic_name
        )
    }

    fn pending(&self) -> Vec<TopicCreateState> {
        vec![TopicCreateState::Creating]
    }

    fn target(&self) -> Vec<TopicCreateState> {
        vec![TopicCreateState::Created]
    }

    async fn refresh(
        &self,
    ) -> Result<Observation<CreateKafkaTopicRequest, TopicCreateState>, ApiError> {
        let status = match self
            .api
            .create_kafka_topic(&self.project, &self.service, &self.request)
            .await
        {
            Ok(()) => TopicCreateState::Created,
            Err(ApiError::Conflict(message)) if message.contains("already exists") => {
                TopicCreateState::Created
            },
            // Brokers that are offline or rebalancing reject creates for a while.
            Err(ApiError::Conflict(message)) => {
                debug!(topic = %self.request.topic_name, %message, "Topic create rejected, retrying");
                TopicCreateState::Creating
            },
            Err(ApiError::Api { status: 501, .. }) => TopicCreateState::Creating,
            Err(err) if err.is_retryable() => {
                warn!(topic = %self.request.topic_name, error = %err, "Topic create failed, retrying");
                TopicCreateState::Creating
            },
            Err(err) => return Err(err),
        };
        Ok(Observation::new(self.request.clone(), status))
    }
}

/// Waits until a topic is listed as `ACTIVE`.
pub struct TopicAvailable<'a, A: AivenApi + ?Sized> {
    api: &'a A,
    cache: &'a TopicCache,
    project: String,
    service: String,
    topic: String,
    ignore_not_found: bool,
}

impl<'a, A: AivenApi + ?Sized> TopicAvailable<'a, A> {
    /// Wait for `topic` of `service`.
    pub fn new(
        api: &'a A,
        cache: &'a TopicCache,
        project: impl Into<String>,
        service: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            api,
            cache,
            project: project.into(),
            service: service.into(),
            topic: topic.into(),
            ignore_not_found: false,
        }
    }

    /// Treat an unknown topic as not visible yet instead of failing.
    ///
    /// Use right after creation, when the listing lags behind.
    pub fn ignore_not_found(mut self, ignore: bool) -> Self {
        self.ignore_not_found = ignore;
        self
    }

    /// Fetch every queued topic of the service into the cache.
    async fn fetch_queue(&self) -> Result<(), ApiError> {
        let mut queued = self.cache.get_queue(&self.project, &self.service);
        if queued.is_empty() {
            return Ok(());
        }
        // Other waits may have pushed this topic out of a full queue.
        if !queued.contains(&self.topic) {
            queued.truncate(MAX_BATCH - 1);
            queued.push(self.topic.clone());
        }

        match self
            .api
            .list_kafka_topics(&self.project, &self.service, &queued)
            .await
        {
            Ok(topics) => {
                self.cache.store(&self.project, &self.service, topics);
                Ok(())
            },
            // One unknown name fails the whole batch; look them up one by one.
            Err(err) if err.is_not_found() => self.fetch_one_by_one(&queued).await,
            Err(err) => Err(err),
        }
    }

    async fn fetch_one_by_one(&self, names: &[String]) -> Result<(), ApiError> {
        debug!(
            project = %self.project,
            service = %self.service,
            count = names.len(),
            "Batch topic lookup failed, falling back to single lookups"
        );
        let mut found = Vec::with_capacity(names.len());
        for name in names {
            match self
                .api
                .get_kafka_topic(&self.project, &self.service, name)
                .await
            {
                Ok(topic) => found.push(topic),
                // Unknown names leave the queue; waits still interested queue them again.
                Err(err) if err.is_not_found() => {
                    self.cache.dequeue(&self.project, &self.service, name);
                    if !self.ignore_not_found && name == &self.topic {
                        self.cache.store(&self.project, &self.service, found);
                        return Err(err);
                    }
                },
                Err(err) => return Err(err),
            }
        }
        self.cache.store(&self.project, &self.service, found);
        Ok(())
    }
}

#[async_trait]
impl<'a, A: AivenApi + ?Sized> PollTarget for TopicAvailable<'a, A> {
    type Snapshot = KafkaTopic;
    type Status = TopicState;

    fn describe(&self) -> String {
        format!(
            "kafka topic {}/{}/{}",
            self.project, self.service, self.topic
        )
    }

    fn pending(&self) -> Vec<TopicState> {
        vec![TopicState::Configuring]
    }

    fn target(&self) -> Vec<TopicState> {
        vec![TopicState::Active]
    }

    async fn refresh(&self) -> Result<Observation<KafkaTopic, TopicState>, ApiError> {
        self.cache
            .add_to_queue(&self.project, &self.service, &self.topic);
        if !self.cache.is_queue_empty(&self.project, &self.service) {
            self.fetch_queue().await?;
        }

        let (topic, _) = self
            .cache
            .load_by_topic_name(&self.project, &self.service, &self.topic);
        let status = topic.state.clone();
        Ok(Observation::new(topic, status))
    }
}

/// Deletes a topic until the API reports it gone.
pub struct TopicDeleted<'a, A: AivenApi + ?Sized> {
    api: &'a A,
    cache: &'a TopicCache,
    project: String,
    service: String,
    topic: String,
}

impl<'a, A: AivenApi + ?Sized> TopicDeleted<'a, A> {
    /// Delete `topic` of `service`.
    pub fn new(
        api: &'a A,
        cache: &'a TopicCache,
        project: impl Into<String>,
        service: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            api,
            cache,
            project: project.into(),
            service: service.into(),
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl<'a, A: AivenApi + ?Sized> PollTarget for TopicDeleted<'a, A> {
    type Snapshot = ();
    type Status = RemovalState;

    fn describe(&self) -> String {
        format!(
            "deletion of kafka topic {}/{}/{}",
            self.project, self.service, self.topic
        )
    }

    fn pending(&self) -> Vec<RemovalState> {
        vec![RemovalState::Removing]
    }

    fn target(&self) -> Vec<RemovalState> {
        vec![RemovalState::Deleted]
    }

    async fn refresh(&self) -> Result<Observation<(), RemovalState>, ApiError> {
        match self
            .api
            .delete_kafka_topic(&self.project, &self.service, &self.topic)
            .await
        {
            Err(err) if !err.is_not_found() => {
                debug!(topic = %self.topic, error = %err, "Topic delete not accepted yet");
                Ok(Observation::new((), RemovalState::Removing))
            },
            _ => {
                self.cache
                    .forget_topic(&self.project, &self.service, &self.topic);
                Ok(Observation::new((), RemovalState::Deleted))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WaitError;
    use crate::testing::{topic_snapshot, MockApi};
    use crate::waiter::Waiter;

    const TIMEOUT: Duration = Duration::from_secs(5 * 60);

    fn request(name: &str) -> CreateKafkaTopicRequest {
        CreateKafkaTopicRequest {
            topic_name: name.to_string(),
            partitions: 3,
            replication: 2,
            config: Default::default(),
            tags: Vec::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_retries_until_accepted() {
        let api = MockApi::new();
        api.push_create_kafka_topic(Err(ApiError::Conflict("broker offline".to_string())))
            .push_create_kafka_topic(Err(ApiError::Api {
                status: 501,
                message: "not ready".to_string(),
            }))
            .push_create_kafka_topic(Err(ApiError::Unavailable("busy".to_string())))
            .push_create_kafka_topic(Ok(()));

        let target = TopicCreated::new(&api, "proj", "kafka-1", request("events"));
        let created = Waiter::new(create_config(TIMEOUT))
            .wait_for(&target)
            .await
            .unwrap();
        assert_eq!(created.topic_name, "events");
        assert_eq!(api.calls("create_kafka_topic"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_already_exists_counts_as_created() {
        let api = MockApi::new();
        api.push_create_kafka_topic(Err(ApiError::Conflict(
            "Topic 'events' already exists".to_string(),
        )));

        let target = TopicCreated::new(&api, "proj", "kafka-1", request("events"));
        Waiter::new(create_config(TIMEOUT))
            .wait_for(&target)
            .await
            .unwrap();
        assert_eq!(api.calls("create_kafka_topic"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_fatal_error() {
        let api = MockApi::new();
        api.push_create_kafka_topic(Err(ApiError::Api {
            status: 400,
            message: "invalid partitions".to_string(),
        }));

        let target = TopicCreated::new(&api, "proj", "kafka-1", request("events"));
        let err = Waiter::new(create_config(TIMEOUT))
            .wait_for(&target)
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::Fatal { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_availability_not_found_then_found() {
        let api = MockApi::new();
        let cache = TopicCache::new();
        for _ in 0..3 {
            api.push_list_kafka_topics(Err(ApiError::NotFound("unknown topic".to_string())));
        }
        api.push_list_kafka_topics(Ok(vec![topic_snapshot("events", "ACTIVE")]));

        let target =
            TopicAvailable::new(&api, &cache, "proj", "kafka-1", "events").ignore_not_found(true);
        let topic = Waiter::new(availability_config(TIMEOUT))
            .wait_for(&target)
            .await
            .unwrap();

        assert_eq!(topic.state, TopicState::Active);
        assert_eq!(topic.topic_name, "events");
        assert_eq!(api.calls("list_kafka_topics"), 4);
        assert_eq!(api.calls("get_kafka_topic"), 3);
        assert!(cache.is_queue_empty("proj", "kafka-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_availability_falls_back_to_single_lookup() {
        let api = MockApi::new();
        let cache = TopicCache::new();
        api.push_list_kafka_topics(Err(ApiError::NotFound("unknown topic".to_string())));
        api.push_get_kafka_topic(Ok(topic_snapshot("events", "ACTIVE")));

        let target = TopicAvailable::new(&api, &cache, "proj", "kafka-1", "events");
        let topic = Waiter::new(availability_config(TIMEOUT))
            .wait_for(&target)
            .await
            .unwrap();
        assert_eq!(topic.state, TopicState::Active);
        assert_eq!(api.calls("list_kafka_topics"), 1);
        assert!(cache.load_by_topic_name("proj", "kafka-1", "events").1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_availability_unknown_topic_fails_without_ignore() {
        let api = MockApi::new();
        let cache = TopicCache::new();
        api.push_list_kafka_topics(Err(ApiError::NotFound("unknown topic".to_string())));

        let target = TopicAvailable::new(&api, &cache, "proj", "kafka-1", "events");
        let err = Waiter::new(availability_config(TIMEOUT))
            .wait_for(&target)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WaitError::Fatal {
                source: ApiError::NotFound(_),
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_lookup_leaves_queue_empty() {
        let api = MockApi::new();
        let cache = TopicCache::new();
        api.push_list_kafka_topics(Err(ApiError::NotFound("gone".to_string())));

        let target = TopicAvailable::new(&api, &cache, "proj", "kafka-1", "gone");
        let err = Waiter::new(availability_config(TIMEOUT))
            .wait_for(&target)
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::Fatal { .. }));
        assert!(cache.is_queue_empty("proj", "kafka-1"));

        // A later wait on the same service batches only its own topic.
        let api = MockApi::new();
        api.push_list_kafka_topics(Ok(vec![topic_snapshot("events", "ACTIVE")]));
        let target = TopicAvailable::new(&api, &cache, "proj", "kafka-1", "events");
        Waiter::new(availability_config(TIMEOUT))
            .wait_for(&target)
            .await
            .unwrap();
        assert_eq!(
            api.last_request("list_kafka_topics").unwrap(),
            serde_json::json!(["events"])
        );
        assert_eq!(api.calls("get_kafka_topic"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_names_do_not_starve_lookup() {
        let api = MockApi::new();
        let cache = TopicCache::new();
        for i in 0..MAX_BATCH {
            cache.add_to_queue("proj", "kafka-1", &format!("stale-{i}"));
        }
        api.push_list_kafka_topics(Err(ApiError::NotFound("unknown topic".to_string())));
        for _ in 0..MAX_BATCH - 1 {
            api.push_get_kafka_topic(Err(ApiError::NotFound("stale".to_string())));
        }
        api.push_get_kafka_topic(Ok(topic_snapshot("events", "ACTIVE")));

        let target = TopicAvailable::new(&api, &cache, "proj", "kafka-1", "events");
        let topic = Waiter::new(availability_config(Duration::from_secs(60)))
            .wait_for(&target)
            .await
            .unwrap();

        assert_eq!(topic.state, TopicState::Active);
        assert_eq!(api.calls("list_kafka_topics"), 1);
        assert_eq!(api.calls("get_kafka_topic"), MAX_BATCH);
        assert!(cache.is_queue_empty("proj", "kafka-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_availability_served_from_cache() {
        let api = MockApi::new();
        let cache = TopicCache::new();
        cache.store("proj", "kafka-1", vec![topic_snapshot("events", "ACTIVE")]);

        let target = TopicAvailable::new(&api, &cache, "proj", "kafka-1", "events");
        Waiter::new(availability_config(TIMEOUT))
            .wait_for(&target)
            .await
            .unwrap();
        assert_eq!(api.calls("list_kafka_topics"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_availability_configuring_until_active() {
        let api = MockApi::new();
        let cache = TopicCache::new();
        api.push_list_kafka_topics(Ok(vec![]))
            .push_list_kafka_topics(Ok(vec![topic_snapshot("events", "ACTIVE")]));

        let target = TopicAvailable::new(&api, &cache, "proj", "kafka-1", "events");
        Waiter::new(availability_config(TIMEOUT))
            .wait_for(&target)
            .await
            .unwrap();
        assert_eq!(api.calls("list_kafka_topics"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_until_gone() {
        let api = MockApi::new();
        let cache = TopicCache::new();
        cache.store("proj", "kafka-1", vec![topic_snapshot("events", "ACTIVE")]);
        api.push_delete_kafka_topic(Err(ApiError::Unavailable("busy".to_string())))
            .push_delete_kafka_topic(Err(ApiError::NotFound("gone".to_string())));

        let target = TopicDeleted::new(&api, &cache, "proj", "kafka-1", "events");
        Waiter::new(delete_config(Duration::from_secs(120)))
            .wait_for(&target)
            .await
            .unwrap();
        assert_eq!(api.calls("delete_kafka_topic"), 2);
        assert!(!cache.load_by_topic_name("proj", "kafka-1", "events").1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_not_found_immediately() {
        let api = MockApi::new();
        let cache = TopicCache::new();
        api.push_delete_kafka_topic(Err(ApiError::NotFound("gone".to_string())));

        let target = TopicDeleted::new(&api, &cache, "proj", "kafka-1", "events");
        Waiter::new(delete_config(Duration::from_secs(120)))
            .wait_for(&target)
            .await
            .unwrap();
        assert_eq!(api.calls("delete_kafka_topic"), 1);
    }
}
