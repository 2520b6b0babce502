//! Poll-until-condition engine.
//!
//! A [`PollTarget`] knows how to fetch one remote entity and how to label what
//! it sees; a [`Waiter`] drives it until the label lands in the target set,
//! something goes wrong, or the deadline passes.
//!
//! The per-resource targets live in the submodules:
//!
//! - [`service`]: service create, update and delete
//! - [`kafka_topic`]: topic create, availability and delete
//! - [`static_ip`]: static IP allocation
//! - [`privatelink`]: AWS and Azure privatelink create/update
//! - [`database`]: database delete
//!
//! [`readiness`] holds the auxiliary facts service waits compose.

pub mod database;
pub mod kafka_topic;
pub mod privatelink;
pub mod readiness;
pub mod service;
pub mod static_ip;

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep_until, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::WaitConfig;
use crate::error::{ApiError, WaitError};
use crate::status::WaitStatus;

/// One successful poll: what was fetched and how it was labelled.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation<S, St> {
    /// The fetched entity.
    pub snapshot: S,
    /// Its status label.
    pub status: St,
}

impl<S, St> Observation<S, St> {
    /// Pair a snapshot with its label.
    pub fn new(snapshot: S, status: St) -> Self {
        Self { snapshot, status }
    }
}

/// Something a [`Waiter`] can poll.
#[async_trait]
pub trait PollTarget: Send + Sync {
    /// What [`refresh`](Self::refresh) returns and the wait finally yields.
    type Snapshot: Send;

    /// Status labels of this target.
    type Status: WaitStatus;

    /// Human readable name of the awaited entity, used in errors and logs.
    fn describe(&self) -> String;

    /// Labels meaning "keep polling".
    fn pending(&self) -> Vec<Self::Status>;

    /// Labels meaning "done".
    fn target(&self) -> Vec<Self::Status>;

    /// Fetch and label the entity once.
    async fn refresh(&self) -> Result<Observation<Self::Snapshot, Self::Status>, ApiError>;
}

/// Runs poll loops with one [`WaitConfig`].
#[derive(Debug, Clone)]
pub struct Waiter {
    config: WaitConfig,
    cancel: CancellationToken,
}

impl Waiter {
    /// Create a waiter that can only end by success, failure or its deadline.
    pub fn new(config: WaitConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort waits as soon as `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The loop settings.
    pub fn config(&self) -> &WaitConfig {
        &self.config
    }

    /// Poll `target` until it reports a target label often enough in a row.
    ///
    /// Retryable fetch failures are remembered and polling continues; any other
    /// failure ends the wait immediately, as does a label outside the pending
    /// and target sets. Once the deadline passes the wait fails with
    /// [`WaitError::Timeout`] carrying the last label and error seen.
    pub async fn wait_for<T>(&self, target: &T) -> Result<T::Snapshot, WaitError>
    where
        T: PollTarget + ?Sized,
    {
        self.config.validate()?;

        let what = target.describe();
        let pending = target.pending();
        let goal = target.target();
        let started = Instant::now();
        let deadline = at_most(started, self.config.timeout, None);

        let mut last_status: Option<String> = None;
        let mut last_error: Option<ApiError> = None;
        let mut successes = 0u32;
        let mut interval: Option<Duration> = None;
        let mut attempt = 0u32;

        let expired = |last_status: Option<String>, last_error: Option<ApiError>, cancelled| {
            WaitError::Timeout {
                what: what.clone(),
                timeout: self.config.timeout,
                last_status,
                last_error,
                cancelled,
            }
        };

        debug!(what = %what, timeout = ?self.config.timeout, "Waiting");

        if !self.config.initial_delay.is_zero()
            && !self
                .sleep_until(at_most(started, self.config.initial_delay, Some(deadline)))
                .await
        {
            return Err(expired(last_status, last_error, true));
        }

        loop {
            attempt += 1;
            let refreshed = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return Err(expired(last_status, last_error, true));
                },
                result = timeout_at(deadline, target.refresh()) => result,
            };

            match refreshed {
                Err(_) => return Err(expired(last_status, last_error, false)),
                Ok(Err(err)) if err.is_retryable() => {
                    warn!(what = %what, attempt, error = %err, "Retryable error while polling");
                    successes = 0;
                    last_error = Some(err);
                },
                Ok(Err(err)) => {
                    return Err(WaitError::Fatal {
                        what: what.clone(),
                        source: err,
                    })
                },
                Ok(Ok(observation)) => {
                    let status = observation.status.as_str().to_string();
                    debug!(what = %what, attempt, status = %status, "Polled");

                    if goal.contains(&observation.status) {
                        successes += 1;
                        if successes >= self.config.required_consecutive_successes {
                            info!(
                                what = %what,
                                status = %status,
                                elapsed = ?started.elapsed(),
                                "Wait complete"
                            );
                            return Ok(observation.snapshot);
                        }
                    } else if pending.contains(&observation.status) {
                        successes = 0;
                    } else {
                        return Err(WaitError::UnexpectedState {
                            what: what.clone(),
                            status,
                            expected: expected_labels(&pending, &goal),
                        });
                    }
                    last_status = Some(status);
                },
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(expired(last_status, last_error, false));
            }

            let next = self.config.next_interval(interval);
            interval = Some(next);
            if !self.sleep_until(at_most(now, next, Some(deadline))).await {
                return Err(expired(last_status, last_error, true));
            }
        }
    }

    /// Sleep until `wake`; `false` if cancelled first.
    async fn sleep_until(&self, wake: Instant) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = sleep_until(wake) => true,
        }
    }
}

/// Furthest a wait can be scheduled, for timeouts past what the clock can hold.
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 3600);

/// `from + by`, saturating at [`FAR_FUTURE`] and clamped to `limit`.
fn at_most(from: Instant, by: Duration, limit: Option<Instant>) -> Instant {
    let wake = from
        .checked_add(by.min(FAR_FUTURE))
        .unwrap_or(from);
    limit.map_or(wake, |limit| wake.min(limit))
}

fn expected_labels<St: WaitStatus>(pending: &[St], goal: &[St]) -> String {
    pending
        .iter()
        .chain(goal)
        .map(|status| status.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
