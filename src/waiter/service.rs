//! Service create, update and delete waits.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::readiness::{
    backups_ready, grafana_ready, static_ips_disassociated, static_ips_ready, StaticIpExpectation,
};
use super::{Observation, PollTarget};
use crate::client::AivenApi;
use crate::config::WaitConfig;
use crate::error::ApiError;
use crate::status::{ServiceDeletionState, ServiceState};
use crate::types::Service;

/// Loop settings of service create and update waits.
pub fn ready_config(timeout: Duration) -> WaitConfig {
    WaitConfig::new(timeout)
        .with_initial_delay(Duration::from_secs(10))
        .with_min_poll_interval(Duration::from_secs(2))
        .with_required_consecutive_successes(5)
}

/// Loop settings of service delete waits.
pub fn deletion_config(timeout: Duration) -> WaitConfig {
    WaitConfig::new(timeout)
        .with_initial_delay(Duration::from_secs(10))
        .with_min_poll_interval(Duration::from_secs(20))
}

/// Waits until a service is `RUNNING` and every readiness fact holds.
///
/// After an update the service already ran once, so its own state is not
/// awaited again (a plan or cloud migration can rebuild for hours); only the
/// readiness facts are.
pub struct ServiceReady<'a, A: AivenApi + ?Sized> {
    api: &'a A,
    project: String,
    service: String,
    static_ips: StaticIpExpectation,
    update: bool,
}

impl<'a, A: AivenApi + ?Sized> ServiceReady<'a, A> {
    /// Wait for a newly created service.
    pub fn creation(
        api: &'a A,
        project: impl Into<String>,
        service: impl Into<String>,
        static_ips: StaticIpExpectation,
    ) -> Self {
        Self {
            api,
            project: project.into(),
            service: service.into(),
            static_ips,
            update: false,
        }
    }

    /// Wait for an updated service.
    pub fn update(
        api: &'a A,
        project: impl Into<String>,
        service: impl Into<String>,
        static_ips: StaticIpExpectation,
    ) -> Self {
        Self {
            update: true,
            ..Self::creation(api, project, service, static_ips)
        }
    }

    async fn readiness(&self, service: &Service) -> Result<bool, ApiError> {
        if !backups_ready(service) {
            debug!(service = %self.service, "Waiting for service backups");
            return Ok(false);
        }
        if !grafana_ready(service).await {
            debug!(service = %self.service, "Waiting for Grafana to become reachable");
            return Ok(false);
        }
        if !self.static_ips.is_empty() {
            let listing = self.api.list_static_ips(&self.project).await?;
            if !static_ips_ready(&listing, &self.service, &self.static_ips) {
                debug!(service = %self.service, "Waiting for static IPs");
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl<'a, A: AivenApi + ?Sized> PollTarget for ServiceReady<'a, A> {
    type Snapshot = Service;
    type Status = ServiceState;

    fn describe(&self) -> String {
        format!("service {}/{}", self.project, self.service)
    }

    fn pending(&self) -> Vec<ServiceState> {
        vec![
            ServiceState::Rebuilding,
            ServiceState::Rebalancing,
            ServiceState::WaitingForServices,
        ]
    }

    fn target(&self) -> Vec<ServiceState> {
        vec![ServiceState::Running]
    }

    async fn refresh(&self) -> Result<Observation<Service, ServiceState>, ApiError> {
        let service = self.api.get_service(&self.project, &self.service).await?;

        let state = if self.update {
            ServiceState::Running
        } else {
            service.state.clone()
        };
        if state != ServiceState::Running {
            return Ok(Observation::new(service, state));
        }

        let status = if self.readiness(&service).await? {
            ServiceState::Running
        } else {
            ServiceState::WaitingForServices
        };
        Ok(Observation::new(service, status))
    }
}

/// Waits until a service is gone and its static IPs are released.
pub struct ServiceDeleted<'a, A: AivenApi + ?Sized> {
    api: &'a A,
    project: String,
    service: String,
    static_ips: StaticIpExpectation,
}

impl<'a, A: AivenApi + ?Sized> ServiceDeleted<'a, A> {
    /// Wait for the deletion of `service`.
    pub fn new(
        api: &'a A,
        project: impl Into<String>,
        service: impl Into<String>,
        static_ips: StaticIpExpectation,
    ) -> Self {
        Self {
            api,
            project: project.into(),
            service: service.into(),
            static_ips,
        }
    }
}

#[async_trait]
impl<'a, A: AivenApi + ?Sized> PollTarget for ServiceDeleted<'a, A> {
    type Snapshot = ();
    type Status = ServiceDeletionState;

    fn describe(&self) -> String {
        format!("deletion of service {}/{}", self.project, self.service)
    }

    fn pending(&self) -> Vec<ServiceDeletionState> {
        vec![ServiceDeletionState::Deleting]
    }

    fn target(&self) -> Vec<ServiceDeletionState> {
        vec![ServiceDeletionState::Deleted]
    }

    async fn refresh(&self) -> Result<Observation<(), ServiceDeletionState>, ApiError> {
        match self.api.get_service(&self.project, &self.service).await {
            Ok(_) => return Ok(Observation::new((), ServiceDeletionState::Deleting)),
            Err(err) if err.is_not_found() => {},
            Err(err) => return Err(err),
        }

        if !self.static_ips.is_empty() {
            let listing = self.api.list_static_ips(&self.project).await?;
            if !static_ips_disassociated(&listing, &self.static_ips) {
                debug!(service = %self.service, "Service gone, waiting for static IPs to be released");
                return Ok(Observation::new((), ServiceDeletionState::Deleting));
            }
        }
        Ok(Observation::new((), ServiceDeletionState::Deleted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WaitError;
    use crate::testing::{service_snapshot, static_ip_snapshot, MockApi};
    use crate::types::Backup;
    use crate::waiter::Waiter;
    use serde_json::json;
    use tokio::time::Instant;

    const TIMEOUT: Duration = Duration::from_secs(20 * 60);

    fn with_backup(mut service: Service) -> Service {
        service.backups.push(Backup {
            backup_name: "b1".to_string(),
            backup_time: "2024-01-01T00:00:00Z".to_string(),
            data_size: 1,
        });
        service
    }

    fn expect_ips(ids: &[&str]) -> StaticIpExpectation {
        StaticIpExpectation::new(
            json!({"static_ips": true}).as_object().unwrap(),
            ids.iter().map(|id| id.to_string()).collect(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_creation_waits_for_backups() {
        let api = MockApi::new();
        api.push_get_service(Ok(service_snapshot("pg-1", "pg", "REBUILDING")))
            .push_get_service(Ok(service_snapshot("pg-1", "pg", "REBUILDING")))
            .push_get_service(Ok(service_snapshot("pg-1", "pg", "RUNNING")))
            .push_get_service(Ok(with_backup(service_snapshot("pg-1", "pg", "RUNNING"))));

        let target = ServiceReady::creation(&api, "proj", "pg-1", StaticIpExpectation::default());
        let waiter = Waiter::new(ready_config(TIMEOUT).with_required_consecutive_successes(1));
        let service = waiter.wait_for(&target).await.unwrap();

        assert_eq!(service.backups.len(), 1);
        assert_eq!(api.calls("get_service"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_creation_requires_consecutive_running() {
        let api = MockApi::new();
        api.push_get_service(Ok(service_snapshot("kafka-1", "kafka", "RUNNING")))
            .push_get_service(Ok(service_snapshot("kafka-1", "kafka", "REBALANCING")))
            .push_get_service(Ok(service_snapshot("kafka-1", "kafka", "RUNNING")));

        let target = ServiceReady::creation(&api, "proj", "kafka-1", StaticIpExpectation::default());
        let started = Instant::now();
        Waiter::new(ready_config(TIMEOUT))
            .wait_for(&target)
            .await
            .unwrap();

        // One RUNNING, one REBALANCING, then five RUNNING in a row.
        assert_eq!(api.calls("get_service"), 7);
        assert!(started.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_ignores_service_state() {
        let api = MockApi::new();
        api.push_get_service(Ok(service_snapshot("kafka-1", "kafka", "REBUILDING")));

        let target = ServiceReady::update(&api, "proj", "kafka-1", StaticIpExpectation::default());
        let service = Waiter::new(ready_config(TIMEOUT))
            .wait_for(&target)
            .await
            .unwrap();
        assert_eq!(service.state, ServiceState::Rebuilding);
        assert_eq!(api.calls("get_service"), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_creation_waits_for_static_ips() {
        let api = MockApi::new();
        api.push_get_service(Ok(service_snapshot("pg-1", "kafka", "RUNNING")));
        api.push_list_static_ips(Ok(vec![static_ip_snapshot("ip1", "created", "")]))
            .push_list_static_ips(Ok(vec![static_ip_snapshot("ip1", "assigned", "pg-1")]));

        let target = ServiceReady::creation(&api, "proj", "pg-1", expect_ips(&["ip1"]));
        let waiter = Waiter::new(ready_config(TIMEOUT).with_required_consecutive_successes(1));
        waiter.wait_for(&target).await.unwrap();
        assert_eq!(api.calls("list_static_ips"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_static_ip_listing_failure_is_fatal() {
        let api = MockApi::new();
        api.push_get_service(Ok(service_snapshot("pg-1", "kafka", "RUNNING")));
        api.push_list_static_ips(Err(ApiError::PermissionDenied("nope".to_string())));

        let target = ServiceReady::creation(&api, "proj", "pg-1", expect_ips(&["ip1"]));
        let err = Waiter::new(ready_config(TIMEOUT))
            .wait_for(&target)
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::Fatal { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_creation_times_out_while_rebuilding() {
        let api = MockApi::new();
        api.push_get_service(Ok(service_snapshot("pg-1", "pg", "REBUILDING")));

        let target = ServiceReady::creation(&api, "proj", "pg-1", StaticIpExpectation::default());
        let err = Waiter::new(ready_config(Duration::from_secs(60)))
            .wait_for(&target)
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("REBUILDING"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deletion_done_on_first_not_found() {
        let api = MockApi::new();

        let target = ServiceDeleted::new(&api, "proj", "pg-1", StaticIpExpectation::default());
        Waiter::new(deletion_config(TIMEOUT))
            .wait_for(&target)
            .await
            .unwrap();
        assert_eq!(api.calls("get_service"), 1);
        assert_eq!(api.calls("list_static_ips"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deletion_waits_for_service_and_static_ips() {
        let api = MockApi::new();
        api.push_get_service(Ok(service_snapshot("pg-1", "pg", "RUNNING")))
            .push_get_service(Err(ApiError::NotFound("gone".to_string())));
        api.push_list_static_ips(Ok(vec![static_ip_snapshot("ip1", "assigned", "")]))
            .push_list_static_ips(Ok(vec![static_ip_snapshot("ip1", "created", "")]));

        let target = ServiceDeleted::new(&api, "proj", "pg-1", expect_ips(&["ip1"]));
        Waiter::new(deletion_config(TIMEOUT))
            .wait_for(&target)
            .await
            .unwrap();
        assert_eq!(api.calls("get_service"), 3);
        assert_eq!(api.calls("list_static_ips"), 2);
    }
}
