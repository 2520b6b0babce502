//! AWS and Azure privatelink create/update waits.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{Observation, PollTarget};
use crate::client::AivenApi;
use crate::config::WaitConfig;
use crate::error::ApiError;
use crate::status::PrivatelinkState;
use crate::types::{AwsPrivatelink, AzurePrivatelink};

/// Loop settings of privatelink waits.
pub fn active_config(timeout: Duration) -> WaitConfig {
    WaitConfig::new(timeout).with_initial_delay(Duration::from_secs(10))
}

/// Waits until the AWS privatelink of a service is `active`.
pub struct AwsPrivatelinkActive<'a, A: AivenApi + ?Sized> {
    api: &'a A,
    project: String,
    service: String,
}

impl<'a, A: AivenApi + ?Sized> AwsPrivatelinkActive<'a, A> {
    /// Wait for the AWS privatelink of `service`.
    pub fn new(api: &'a A, project: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            api,
            project: project.into(),
            service: service.into(),
        }
    }
}

#[async_trait]
impl<'a, A: AivenApi + ?Sized> PollTarget for AwsPrivatelinkActive<'a, A> {
    type Snapshot = AwsPrivatelink;
    type Status = PrivatelinkState;

    fn describe(&self) -> String {
        format!("AWS privatelink of {}/{}", self.project, self.service)
    }

    fn pending(&self) -> Vec<PrivatelinkState> {
        vec![PrivatelinkState::Creating]
    }

    fn target(&self) -> Vec<PrivatelinkState> {
        vec![PrivatelinkState::Active]
    }

    async fn refresh(&self) -> Result<Observation<AwsPrivatelink, PrivatelinkState>, ApiError> {
        let link = self
            .api
            .get_aws_privatelink(&self.project, &self.service)
            .await?;
        debug!(service = %self.service, state = %link.state, "AWS privatelink state");
        let status = link.state.clone();
        Ok(Observation::new(link, status))
    }
}

/// Waits until the Azure privatelink of a service is `active`.
pub struct AzurePrivatelinkActive<'a, A: AivenApi + ?Sized> {
    api: &'a A,
    project: String,
    service: String,
}

impl<'a, A: AivenApi + ?Sized> AzurePrivatelinkActive<'a, A> {
    /// Wait for the Azure privatelink of `service`.
    pub fn new(api: &'a A, project: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            api,
            project: project.into(),
            service: service.into(),
        }
    }
}

#[async_trait]
impl<'a, A: AivenApi + ?Sized> PollTarget for AzurePrivatelinkActive<'a, A> {
    type Snapshot = AzurePrivatelink;
    type Status = PrivatelinkState;

    fn describe(&self) -> String {
        format!("Azure privatelink of {}/{}", self.project, self.service)
    }

    fn pending(&self) -> Vec<PrivatelinkState> {
        vec![PrivatelinkState::Creating]
    }

    fn target(&self) -> Vec<PrivatelinkState> {
        vec![PrivatelinkState::Active]
    }

    async fn refresh(&self) -> Result<Observation<AzurePrivatelink, PrivatelinkState>, ApiError> {
        let link = self
            .api
            .get_azure_privatelink(&self.project, &self.service)
            .await?;
        debug!(service = %self.service, state = %link.state, "Azure privatelink state");
        let status = link.state.clone();
        Ok(Observation::new(link, status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WaitError;
    use crate::testing::MockApi;
    use crate::waiter::Waiter;

    const TIMEOUT: Duration = Duration::from_secs(20 * 60);

    fn aws(state: &str) -> AwsPrivatelink {
        AwsPrivatelink {
            state: PrivatelinkState::from(state),
            principals: vec!["arn:aws:iam::012345678901:user/ops".to_string()],
            aws_service_id: None,
            aws_service_name: None,
            message: None,
        }
    }

    fn azure(state: &str) -> AzurePrivatelink {
        AzurePrivatelink {
            state: PrivatelinkState::from(state),
            user_subscription_ids: vec!["sub-1".to_string()],
            azure_service_alias: None,
            azure_service_id: None,
            message: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_aws_creating_then_active() {
        let api = MockApi::new();
        api.push_get_aws_privatelink(Ok(aws("creating")))
            .push_get_aws_privatelink(Ok(aws("active")));

        let target = AwsPrivatelinkActive::new(&api, "proj", "kafka-1");
        let link = Waiter::new(active_config(TIMEOUT))
            .wait_for(&target)
            .await
            .unwrap();
        assert_eq!(link.state, PrivatelinkState::Active);
        assert_eq!(api.calls("get_aws_privatelink"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aws_not_found_is_fatal() {
        let api = MockApi::new();

        let target = AwsPrivatelinkActive::new(&api, "proj", "kafka-1");
        let err = Waiter::new(active_config(TIMEOUT))
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
    async fn test_azure_creating_then_active() {
        let api = MockApi::new();
        api.push_get_azure_privatelink(Ok(azure("creating")))
            .push_get_azure_privatelink(Ok(azure("active")));

        let target = AzurePrivatelinkActive::new(&api, "proj", "pg-1");
        let link = Waiter::new(active_config(TIMEOUT))
            .wait_for(&target)
            .await
            .unwrap();
        assert_eq!(link.user_subscription_ids, vec!["sub-1".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_azure_unexpected_state() {
        let api = MockApi::new();
        api.push_get_azure_privatelink(Ok(azure("deleting")));

        let target = AzurePrivatelinkActive::new(&api, "proj", "pg-1");
        let err = Waiter::new(active_config(TIMEOUT))
            .wait_for(&target)
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::UnexpectedState { .. }));
    }
}
