//! Aiven Provider
//!
//! Provider core for Aiven managed services. Every create, update and delete
//! call against the Aiven API returns before the change has taken effect; this
//! crate blocks until the resource actually reached the state the user asked
//! for, or reports why it did not.
//!
//! # Overview
//!
//! - **Waiter**: a generic poll loop ([`Waiter`]) driven by [`PollTarget`]
//!   implementations, one per resource and transition
//! - **Readiness**: the extra facts a `RUNNING` service must satisfy (backups,
//!   reachable Grafana, assigned static IPs)
//! - **Topic cache**: batches Kafka topic reads of one service into a single call
//! - **Client**: the [`AivenApi`] trait and its HTTP implementation
//! - **Provider**: resource handlers behind the [`ProviderService`] trait
//! - **Error types**: [`ApiError`], [`WaitError`] and [`ProviderError`]
//! - **Logging**: `tracing` setup writing to stderr
//!
//! # Quick Start
//!
//! ```ignore
//! use aiven_provider::{init_logging, AivenProvider, ProviderService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!
//!     let provider = AivenProvider::unconfigured();
//!     provider.configure(json!({"api_token": "..."})).await?;
//!
//!     let state = provider
//!         .create(
//!             "aiven_pg",
//!             json!({
//!                 "project": "my-project",
//!                 "service_name": "pg-1",
//!                 "plan": "startup-4",
//!                 "cloud_name": "google-europe-west1"
//!             }),
//!         )
//!         .await?;
//!     tracing::info!(id = %state["id"], "Service is running");
//!     Ok(())
//! }
//! ```
//!
//! # Waiting
//!
//! A wait sleeps an initial delay, then polls its target until the observed
//! status is a target status the required number of times in a row. A pending
//! status keeps it polling; anything else fails it. Retryable API errors are
//! logged and polled through, other errors end the wait at once. The deadline
//! is absolute: sleeps are cut short so no poll starts after it.

#![warn(clippy::all)]

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod ident;
pub mod logging;
pub mod provider;
pub mod status;
pub mod testing;
pub mod types;
pub mod waiter;

// Re-export main types at crate root
pub use cache::TopicCache;
pub use client::{AivenApi, HttpClient};
pub use config::{Backoff, ProviderConfig, ResourceTimeouts, WaitConfig};
pub use error::{ApiError, ProviderError, WaitError};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::{
    AivenProvider, Diagnostic, DiagnosticSeverity, ImportedResource, ProviderService, ResourceKind,
};
pub use waiter::{Observation, PollTarget, Waiter};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tokio_util::sync::CancellationToken;
pub use tracing;
