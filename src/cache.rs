//! Kafka topic cache shared by topic waits.
//!
//! Reading many topics of one service one by one is slow and rate limited, so
//! availability waits register the topic they are interested in with
//! [`TopicCache::add_to_queue`] and whoever polls next fetches the whole queue
//! in a single batch call. The cache is an explicit instance: construct one per
//! provider and hand it out as `Arc<TopicCache>`.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Map;
use tracing::{debug, trace};

use crate::status::TopicState;
use crate::types::KafkaTopic;

/// Largest number of topic names queued per service, and so the largest batch
/// handed out by [`TopicCache::get_queue`].
pub const MAX_BATCH: usize = 100;

type ServiceKey = (String, String);

fn key(project: &str, service: &str) -> ServiceKey {
    (project.to_string(), service.to_string())
}

#[derive(Debug, Default)]
struct Inner {
    topics: HashMap<ServiceKey, HashMap<String, KafkaTopic>>,
    queue: HashMap<ServiceKey, Vec<String>>,
}

/// Topics known per `(project, service)` plus the names still to be looked up.
#[derive(Debug, Default)]
pub struct TopicCache {
    inner: RwLock<Inner>,
}

impl TopicCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every cached topic of a service, if any were stored.
    pub fn load_by_project_and_service(
        &self,
        project: &str,
        service: &str,
    ) -> Option<HashMap<String, KafkaTopic>> {
        self.read().topics.get(&key(project, service)).cloned()
    }

    /// The cached topic, or a `CONFIGURING` placeholder when it is unknown.
    ///
    /// The flag tells whether the topic was found.
    pub fn load_by_topic_name(
        &self,
        project: &str,
        service: &str,
        topic: &str,
    ) -> (KafkaTopic, bool) {
        let cached = self
            .read()
            .topics
            .get(&key(project, service))
            .and_then(|topics| topics.get(topic))
            .cloned();
        trace!(project, service, topic, found = cached.is_some(), "Topic cache lookup");
        match cached {
            Some(found) => (found, true),
            None => (configuring_placeholder(topic), false),
        }
    }

    /// Store topics of a service and take them off the lookup queue.
    pub fn store(&self, project: &str, service: &str, topics: Vec<KafkaTopic>) {
        if topics.is_empty() {
            return;
        }
        debug!(project, service, count = topics.len(), "Updating topic cache");

        let key = key(project, service);
        let mut inner = self.write();
        if let Some(queue) = inner.queue.get_mut(&key) {
            queue.retain(|name| !topics.iter().any(|t| &t.topic_name == name));
            if queue.is_empty() {
                inner.queue.remove(&key);
            }
        }
        let cached = inner.topics.entry(key).or_default();
        for topic in topics {
            cached.insert(topic.topic_name.clone(), topic);
        }
    }

    /// Drop everything cached for a service.
    pub fn delete_by_project_and_service(&self, project: &str, service: &str) {
        self.write().topics.remove(&key(project, service));
    }

    /// Drop one topic, e.g. after it was deleted.
    pub fn forget_topic(&self, project: &str, service: &str, topic: &str) {
        let key = key(project, service);
        let mut inner = self.write();
        if let Some(topics) = inner.topics.get_mut(&key) {
            topics.remove(topic);
        }
        if let Some(queue) = inner.queue.get_mut(&key) {
            queue.retain(|name| name != topic);
            if queue.is_empty() {
                inner.queue.remove(&key);
            }
        }
    }

    /// Whether no topic of the service awaits lookup.
    pub fn is_queue_empty(&self, project: &str, service: &str) -> bool {
        self.read()
            .queue
            .get(&key(project, service))
            .map_or(true, Vec::is_empty)
    }

    /// Queue a topic for lookup unless it is queued or cached already.
    ///
    /// A full queue drops its oldest name to make room.
    pub fn add_to_queue(&self, project: &str, service: &str, topic: &str) {
        let key = key(project, service);
        let mut inner = self.write();
        let cached = inner
            .topics
            .get(&key)
            .is_some_and(|topics| topics.contains_key(topic));
        if cached {
            return;
        }
        let queue = inner.queue.entry(key).or_default();
        if queue.iter().any(|name| name == topic) {
            return;
        }
        if queue.len() >= MAX_BATCH {
            let evicted = queue.remove(0);
            debug!(project, service, topic = %evicted, "Topic queue full, dropping oldest name");
        }
        queue.push(topic.to_string());
    }

    /// Take a topic off the lookup queue without caching anything.
    pub fn dequeue(&self, project: &str, service: &str, topic: &str) {
        let key = key(project, service);
        let mut inner = self.write();
        if let Some(queue) = inner.queue.get_mut(&key) {
            queue.retain(|name| name != topic);
            if queue.is_empty() {
                inner.queue.remove(&key);
            }
        }
    }

    /// The queued names of a service, oldest first.
    pub fn get_queue(&self, project: &str, service: &str) -> Vec<String> {
        self.read()
            .queue
            .get(&key(project, service))
            .map(|queue| queue.iter().take(MAX_BATCH).cloned().collect())
            .unwrap_or_default()
    }
}

fn configuring_placeholder(topic: &str) -> KafkaTopic {
    KafkaTopic {
        topic_name: topic.to_string(),
        state: TopicState::Configuring,
        partitions: Vec::new(),
        replication: 0,
        config: Map::new(),
        tags: Vec::new(),
    }
}
