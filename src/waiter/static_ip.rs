//! Static IP allocation wait.

use std::time::Duration;

use async_trait::async_trait;

use super::{Observation, PollTarget};
use crate::client::AivenApi;
use crate::config::WaitConfig;
use crate::error::ApiError;
use crate::status::StaticIpState;
use crate::types::StaticIp;

/// Loop settings of static IP create waits.
pub fn create_config(timeout: Duration) -> WaitConfig {
    WaitConfig::new(timeout)
}

/// Scans the project listing until the address is `created`.
///
/// An address missing from the listing reports the synthetic `waiting` label.
pub struct StaticIpCreated<'a, A: AivenApi + ?Sized> {
    api: &'a A,
    project: String,
    static_ip_id: String,
}

impl<'a, A: AivenApi + ?Sized> StaticIpCreated<'a, A> {
    /// Wait for `static_ip_id` in `project`.
    pub fn new(api: &'a A, project: impl Into<String>, static_ip_id: impl Into<String>) -> Self {
        Self {
            api,
            project: project.into(),
            static_ip_id: static_ip_id.into(),
        }
    }
}

#[async_trait]
impl<'a, A: AivenApi + ?Sized> PollTarget for StaticIpCreated<'a, A> {
    type Snapshot = Option<StaticIp>;
    type Status = StaticIpState;

    fn describe(&self) -> String {
        format!("static ip {}/{}", self.project, self.static_ip_id)
    }

    fn pending(&self) -> Vec<StaticIpState> {
        vec![StaticIpState::Creating, StaticIpState::Waiting]
    }

    fn target(&self) -> Vec<StaticIpState> {
        vec![StaticIpState::Created]
    }

    async fn refresh(&self) -> Result<Observation<Option<StaticIp>, StaticIpState>, ApiError> {
        let listing = self.api.list_static_ips(&self.project).await?;
        let found = listing
            .into_iter()
            .find(|ip| ip.static_ip_address_id == self.static_ip_id);
        let status = found
            .as_ref()
            .map_or(StaticIpState::Waiting, |ip| ip.state.clone());
        Ok(Observation::new(found, status))
    }
}
