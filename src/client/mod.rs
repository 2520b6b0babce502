//! The Aiven API as seen by the provider.
//!
//! [`AivenApi`] is the fetch capability the waiters poll through and the
//! write capability the resource handlers act through. [`HttpClient`] talks to
//! the real API; [`crate::testing::MockApi`] serves scripted responses.

mod http;

pub use http::HttpClient;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::types::{
    AwsPrivatelink, AwsPrivatelinkRequest, AzurePrivatelink, AzurePrivatelinkRequest,
    CreateDatabaseRequest, CreateKafkaTopicRequest, CreateServiceRequest, CreateStaticIpRequest,
    Database, KafkaTopic, Service, StaticIp, UpdateKafkaTopicRequest, UpdateServiceRequest,
};

/// Operations against the Aiven control plane.
///
/// Implementations must report a missing entity as [`ApiError::NotFound`] so
/// deletion waits can tell "gone" from "failed".
#[async_trait]
pub trait AivenApi: Send + Sync + 'static {
    // =========================================================================
    // Services
    // =========================================================================

    /// Fetch one service.
    async fn get_service(&self, project: &str, service: &str) -> Result<Service, ApiError>;

    /// Create a service.
    async fn create_service(
        &self,
        project: &str,
        request: &CreateServiceRequest,
    ) -> Result<Service, ApiError>;

    /// Update a service.
    async fn update_service(
        &self,
        project: &str,
        service: &str,
        request: &UpdateServiceRequest,
    ) -> Result<Service, ApiError>;

    /// Delete a service.
    async fn delete_service(&self, project: &str, service: &str) -> Result<(), ApiError>;

    // =========================================================================
    // Static IPs
    // =========================================================================

    /// List every static IP of a project.
    async fn list_static_ips(&self, project: &str) -> Result<Vec<StaticIp>, ApiError>;

    /// Allocate a static IP.
    async fn create_static_ip(
        &self,
        project: &str,
        request: &CreateStaticIpRequest,
    ) -> Result<StaticIp, ApiError>;

    /// Release a static IP.
    async fn delete_static_ip(&self, project: &str, static_ip_id: &str) -> Result<(), ApiError>;

    // =========================================================================
    // Kafka topics
    // =========================================================================

    /// Fetch one topic.
    async fn get_kafka_topic(
        &self,
        project: &str,
        service: &str,
        topic: &str,
    ) -> Result<KafkaTopic, ApiError>;

    /// Fetch several topics in one call.
    ///
    /// Fails with [`ApiError::NotFound`] when any of the names is unknown.
    async fn list_kafka_topics(
        &self,
        project: &str,
        service: &str,
        topics: &[String],
    ) -> Result<Vec<KafkaTopic>, ApiError>;

    /// Create a topic.
    async fn create_kafka_topic(
        &self,
        project: &str,
        service: &str,
        request: &CreateKafkaTopicRequest,
    ) -> Result<(), ApiError>;

    /// Change partitions, replication, config or tags of a topic.
    async fn update_kafka_topic(
        &self,
        project: &str,
        service: &str,
        topic: &str,
        request: &UpdateKafkaTopicRequest,
    ) -> Result<(), ApiError>;

    /// Delete a topic.
    async fn delete_kafka_topic(
        &self,
        project: &str,
        service: &str,
        topic: &str,
    ) -> Result<(), ApiError>;

    // =========================================================================
    // Databases
    // =========================================================================

    /// List the databases of a service.
    async fn list_databases(&self, project: &str, service: &str)
        -> Result<Vec<Database>, ApiError>;

    /// Create a database.
    async fn create_database(
        &self,
        project: &str,
        service: &str,
        request: &CreateDatabaseRequest,
    ) -> Result<(), ApiError>;

    /// Delete a database.
    async fn delete_database(
        &self,
        project: &str,
        service: &str,
        database: &str,
    ) -> Result<(), ApiError>;

    // =========================================================================
    // Privatelinks
    // =========================================================================

    /// Fetch the AWS privatelink of a service.
    async fn get_aws_privatelink(
        &self,
        project: &str,
        service: &str,
    ) -> Result<AwsPrivatelink, ApiError>;

    /// Create (`update == false`) or update the AWS privatelink of a service.
    async fn put_aws_privatelink(
        &self,
        project: &str,
        service: &str,
        request: &AwsPrivatelinkRequest,
        update: bool,
    ) -> Result<AwsPrivatelink, ApiError>;

    /// Delete the AWS privatelink of a service.
    async fn delete_aws_privatelink(&self, project: &str, service: &str) -> Result<(), ApiError>;

    /// Fetch the Azure privatelink of a service.
    async fn get_azure_privatelink(
        &self,
        project: &str,
        service: &str,
    ) -> Result<AzurePrivatelink, ApiError>;

    /// Create (`update == false`) or update the Azure privatelink of a service.
    async fn put_azure_privatelink(
        &self,
        project: &str,
        service: &str,
        request: &AzurePrivatelinkRequest,
        update: bool,
    ) -> Result<AzurePrivatelink, ApiError>;

    /// Delete the Azure privatelink of a service.
    async fn delete_azure_privatelink(&self, project: &str, service: &str)
        -> Result<(), ApiError>;
}
