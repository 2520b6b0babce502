//! Database delete wait.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{Observation, PollTarget};
use crate::client::AivenApi;
use crate::config::WaitConfig;
use crate::error::ApiError;
use crate::status::RemovalState;

/// Loop settings of database delete waits.
pub fn delete_config(timeout: Duration) -> WaitConfig {
    WaitConfig::new(timeout)
        .with_initial_delay(Duration::from_secs(5))
        .with_min_poll_interval(Duration::from_secs(5))
}

/// Re-issues the delete call until the database is reported gone.
///
/// Deletes are refused while connections are open, so any failure other than
/// not-found keeps the wait in `REMOVING`.
pub struct DatabaseDeleted<'a, A: AivenApi + ?Sized> {
    api: &'a A,
    project: String,
    service: String,
    database: String,
}

impl<'a, A: AivenApi + ?Sized> DatabaseDeleted<'a, A> {
    /// Delete `database` of `service`.
    pub fn new(
        api: &'a A,
        project: impl Into<String>,
        service: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            api,
            project: project.into(),
            service: service.into(),
            database: database.into(),
        }
    }
}

#[async_trait]
impl<'a, A: AivenApi + ?Sized> PollTarget for DatabaseDeleted<'a, A> {
    type Snapshot = ();
    type Status = RemovalState;

    fn describe(&self) -> String {
        format!(
            "deletion of database {}/{}/{}",
            self.project, self.service, self.database
        )
    }

    fn pending(&self) -> Vec<RemovalState> {
        vec![RemovalState::Removing]
    }

    fn target(&self) -> Vec<RemovalState> {
        vec![RemovalState::Deleted]
    }

    async fn refresh(&self) -> Result<Observation<(), RemovalState>, ApiError> {
        let status = match self
            .api
            .delete_database(&self.project, &self.service, &self.database)
            .await
        {
            Err(err) if !err.is_not_found() => {
                debug!(database = %self.database, error = %err, "Database delete not accepted yet");
                RemovalState::Removing
            },
            _ => RemovalState::Deleted,
        };
        Ok(Observation::new((), status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockApi;
    use crate::waiter::Waiter;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_retries_refused_delete() {
        let api = MockApi::new();
        api.push_delete_database(Err(ApiError::Api {
            status: 400,
            message: "database has active connections".to_string(),
        }))
        .push_delete_database(Ok(()));

        let target = DatabaseDeleted::new(&api, "proj", "pg-1", "app");
        let started = Instant::now();
        Waiter::new(delete_config(Duration::from_secs(120)))
            .wait_for(&target)
            .await
            .unwrap();
        assert_eq!(api.calls("delete_database"), 2);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_deleted() {
        let api = MockApi::new();
        api.push_delete_database(Err(ApiError::NotFound("gone".to_string())));

        let target = DatabaseDeleted::new(&api, "proj", "pg-1", "app");
        Waiter::new(delete_config(Duration::from_secs(120)))
            .wait_for(&target)
            .await
            .unwrap();
        assert_eq!(api.calls("delete_database"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_while_refused() {
        let api = MockApi::new();
        api.push_delete_database(Err(ApiError::Unavailable("busy".to_string())));

        let target = DatabaseDeleted::new(&api, "proj", "pg-1", "app");
        let err = Waiter::new(delete_config(Duration::from_secs(30)))
            .wait_for(&target)
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("REMOVING"));
    }
}
