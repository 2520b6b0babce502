//! [`AivenApi`] over HTTPS/JSON.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::AivenApi;
use crate::config::ProviderConfig;
use crate::error::{ApiError, ProviderError};
use crate::types::{
    AwsPrivatelink, AwsPrivatelinkRequest, AzurePrivatelink, AzurePrivatelinkRequest,
    CreateDatabaseRequest, CreateKafkaTopicRequest, CreateServiceRequest, CreateStaticIpRequest,
    Database, KafkaTopic, Service, StaticIp, UpdateKafkaTopicRequest, UpdateServiceRequest,
};

const USER_AGENT: &str = concat!("aiven-provider/", env!("CARGO_PKG_VERSION"));

/// Client for the Aiven REST API.
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Deserialize)]
struct ServiceEnvelope {
    service: Service,
}

#[derive(Deserialize)]
struct StaticIpsEnvelope {
    #[serde(default)]
    static_ips: Vec<StaticIp>,
}

#[derive(Deserialize)]
struct TopicEnvelope {
    topic: KafkaTopic,
}

#[derive(Deserialize)]
struct TopicsEnvelope {
    #[serde(default)]
    topics: Vec<KafkaTopic>,
}

#[derive(Serialize)]
struct TopicsQuery<'a> {
    topic_names: &'a [String],
}

#[derive(Deserialize)]
struct DatabasesEnvelope {
    #[serde(default)]
    databases: Vec<Database>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl HttpClient {
    /// Create a client for `base_url` (without the `/v1` suffix).
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        user_agent: Option<&str>,
    ) -> Result<Self, ApiError> {
        let agent = match user_agent {
            Some(extra) => format!("{USER_AGENT} {extra}"),
            None => USER_AGENT.to_string(),
        };
        let http = reqwest::Client::builder()
            .user_agent(agent)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Create a client from the provider configuration.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let token = config.resolve_token().ok_or_else(|| {
            ProviderError::Configuration(format!(
                "an API token is required, set api_token or {}",
                crate::config::TOKEN_ENV
            ))
        })?;
        Self::new(
            config.resolve_base_url(),
            token,
            config.user_agent.as_deref(),
        )
        .map_err(|e| ProviderError::Configuration(e.to_string()))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/v1/{}", self.base_url, path))
            .header("Authorization", format!("aivenv1 {}", self.token))
    }

    async fn check(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or(body);
        Err(ApiError::from_status(status.as_u16(), message))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = Self::check(request.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn send_empty(&self, request: RequestBuilder) -> Result<(), ApiError> {
        Self::check(request.send().await?).await?;
        Ok(())
    }
}

fn privatelink_method(update: bool) -> Method {
    if update {
        Method::PUT
    } else {
        Method::POST
    }
}

#[async_trait]
impl AivenApi for HttpClient {
    #[instrument(skip(self), level = "debug")]
    async fn get_service(&self, project: &str, service: &str) -> Result<Service, ApiError> {
        let path = format!("project/{project}/service/{service}");
        let envelope: ServiceEnvelope = self.send(self.request(Method::GET, &path)).await?;
        Ok(envelope.service)
    }

    #[instrument(skip(self, request), level = "debug")]
    async fn create_service(
        &self,
        project: &str,
        request: &CreateServiceRequest,
    ) -> Result<Service, ApiError> {
        let path = format!("project/{project}/service");
        let envelope: ServiceEnvelope = self
            .send(self.request(Method::POST, &path).json(request))
            .await?;
        Ok(envelope.service)
    }

    #[instrument(skip(self, request), level = "debug")]
    async fn update_service(
        &self,
        project: &str,
        service: &str,
        request: &UpdateServiceRequest,
    ) -> Result<Service, ApiError> {
        let path = format!("project/{project}/service/{service}");
        let envelope: ServiceEnvelope = self
            .send(self.request(Method::PUT, &path).json(request))
            .await?;
        Ok(envelope.service)
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete_service(&self, project: &str, service: &str) -> Result<(), ApiError> {
        let path = format!("project/{project}/service/{service}");
        self.send_empty(self.request(Method::DELETE, &path)).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_static_ips(&self, project: &str) -> Result<Vec<StaticIp>, ApiError> {
        let path = format!("project/{project}/static-ips");
        let envelope: StaticIpsEnvelope = self.send(self.request(Method::GET, &path)).await?;
        Ok(envelope.static_ips)
    }

    #[instrument(skip(self, request), level = "debug")]
    async fn create_static_ip(
        &self,
        project: &str,
        request: &CreateStaticIpRequest,
    ) -> Result<StaticIp, ApiError> {
        let path = format!("project/{project}/static-ips");
        self.send(self.request(Method::POST, &path).json(request))
            .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete_static_ip(&self, project: &str, static_ip_id: &str) -> Result<(), ApiError> {
        let path = format!("project/{project}/static-ips/{static_ip_id}");
        self.send_empty(self.request(Method::DELETE, &path)).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_kafka_topic(
        &self,
        project: &str,
        service: &str,
        topic: &str,
    ) -> Result<KafkaTopic, ApiError> {
        let path = format!("project/{project}/service/{service}/topic/{topic}");
        let envelope: TopicEnvelope = self.send(self.request(Method::GET, &path)).await?;
        Ok(envelope.topic)
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_kafka_topics(
        &self,
        project: &str,
        service: &str,
        topics: &[String],
    ) -> Result<Vec<KafkaTopic>, ApiError> {
        let path = format!("project/{project}/service/{service}/topic/get");
        let query = TopicsQuery {
            topic_names: topics,
        };
        let envelope: TopicsEnvelope = self
            .send(self.request(Method::POST, &path).json(&query))
            .await?;
        debug!(requested = topics.len(), returned = envelope.topics.len(), "Batch topic lookup");
        Ok(envelope.topics)
    }

    #[instrument(skip(self, request), fields(topic = %request.topic_name), level = "debug")]
    async fn create_kafka_topic(
        &self,
        project: &str,
        service: &str,
        request: &CreateKafkaTopicRequest,
    ) -> Result<(), ApiError> {
        let path = format!("project/{project}/service/{service}/topic");
        self.send_empty(self.request(Method::POST, &path).json(request))
            .await
    }

    #[instrument(skip(self, request), level = "debug")]
    async fn update_kafka_topic(
        &self,
        project: &str,
        service: &str,
        topic: &str,
        request: &UpdateKafkaTopicRequest,
    ) -> Result<(), ApiError> {
        let path = format!("project/{project}/service/{service}/topic/{topic}");
        self.send_empty(self.request(Method::PUT, &path).json(request))
            .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete_kafka_topic(
        &self,
        project: &str,
        service: &str,
        topic: &str,
    ) -> Result<(), ApiError> {
        let path = format!("project/{project}/service/{service}/topic/{topic}");
        self.send_empty(self.request(Method::DELETE, &path)).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_databases(
        &self,
        project: &str,
        service: &str,
    ) -> Result<Vec<Database>, ApiError> {
        let path = format!("project/{project}/service/{service}/db");
        let envelope: DatabasesEnvelope = self.send(self.request(Method::GET, &path)).await?;
        Ok(envelope.databases)
    }

    #[instrument(skip(self, request), level = "debug")]
    async fn create_database(
        &self,
        project: &str,
        service: &str,
        request: &CreateDatabaseRequest,
    ) -> Result<(), ApiError> {
        let path = format!("project/{project}/service/{service}/db");
        self.send_empty(self.request(Method::POST, &path).json(request))
            .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete_database(
        &self,
        project: &str,
        service: &str,
        database: &str,
    ) -> Result<(), ApiError> {
        let path = format!("project/{project}/service/{service}/db/{database}");
        self.send_empty(self.request(Method::DELETE, &path)).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_aws_privatelink(
        &self,
        project: &str,
        service: &str,
    ) -> Result<AwsPrivatelink, ApiError> {
        let path = format!("project/{project}/service/{service}/privatelink/aws");
        self.send(self.request(Method::GET, &path)).await
    }

    #[instrument(skip(self, request), level = "debug")]
    async fn put_aws_privatelink(
        &self,
        project: &str,
        service: &str,
        request: &AwsPrivatelinkRequest,
        update: bool,
    ) -> Result<AwsPrivatelink, ApiError> {
        let path = format!("project/{project}/service/{service}/privatelink/aws");
        self.send(self.request(privatelink_method(update), &path).json(request))
            .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete_aws_privatelink(&self, project: &str, service: &str) -> Result<(), ApiError> {
        let path = format!("project/{project}/service/{service}/privatelink/aws");
        self.send_empty(self.request(Method::DELETE, &path)).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_azure_privatelink(
        &self,
        project: &str,
        service: &str,
    ) -> Result<AzurePrivatelink, ApiError> {
        let path = format!("project/{project}/service/{service}/privatelink/azure");
        self.send(self.request(Method::GET, &path)).await
    }

    #[instrument(skip(self, request), level = "debug")]
    async fn put_azure_privatelink(
        &self,
        project: &str,
        service: &str,
        request: &AzurePrivatelinkRequest,
        update: bool,
    ) -> Result<AzurePrivatelink, ApiError> {
        let path = format!("project/{project}/service/{service}/privatelink/azure");
        self.send(self.request(privatelink_method(update), &path).json(request))
            .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete_azure_privatelink(
        &self,
        project: &str,
        service: &str,
    ) -> Result<(), ApiError> {
        let path = format!("project/{project}/service/{service}/privatelink/azure");
        self.send_empty(self.request(Method::DELETE, &path)).await
    }
}
