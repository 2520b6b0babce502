//! Auxiliary facts a running service must satisfy before it counts as ready.
//!
//! These are recomputed on every poll and never stored.

use std::time::Duration;

use serde_json::{Map, Value};
use tokio::net::TcpStream;
use tracing::debug;

use crate::status::StaticIpState;
use crate::types::{static_ips_enabled, Service, ServiceType, StaticIp, OPEN_IP_FILTER};

/// How long the public Grafana endpoint gets to accept a connection.
pub const GRAFANA_DIAL_TIMEOUT: Duration = Duration::from_secs(1);

/// Static IPs a service is expected to hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticIpExpectation {
    ids: Vec<String>,
}

impl StaticIpExpectation {
    /// Expect `ids`, provided the user config switches static IPs on.
    pub fn new(user_config: &Map<String, Value>, ids: Vec<String>) -> Self {
        if static_ips_enabled(user_config) {
            Self { ids }
        } else {
            Self::default()
        }
    }

    /// Whether there is nothing to check.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// The expected static IP ids.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }
}

/// Whether the service has what it needs backup-wise.
///
/// Only kinds that take a backup right after creation are checked, and a read
/// replica destination never gets one of its own.
pub fn backups_ready(service: &Service) -> bool {
    let requires_backups = service
        .kind()
        .map(|kind| kind.requires_backups())
        .unwrap_or(false);
    if !requires_backups || service.is_read_replica() {
        return true;
    }
    !service.backups.is_empty()
}

/// Whether a Grafana service is reachable on its public endpoint.
///
/// Anything IP filtered (more than one entry, or one that is not `0.0.0.0/0`)
/// is taken as ready without a probe, as is a service without a public address.
pub async fn grafana_ready(service: &Service) -> bool {
    if !matches!(service.kind(), Ok(ServiceType::Grafana)) {
        return true;
    }

    if let Some(filters) = service.ip_filters() {
        let restricted = filters.len() > 1 || filters.first().is_some_and(|f| f != OPEN_IP_FILTER);
        if restricted {
            debug!(
                service = %service.service_name,
                ?filters,
                "Grafana is IP filtered, skipping availability check"
            );
            return true;
        }
    }

    let Some(address) = service.public_primary_address() else {
        return true;
    };
    let reachable = dial(&address, GRAFANA_DIAL_TIMEOUT).await;
    debug!(service = %service.service_name, %address, reachable, "Probed public Grafana");
    reachable
}

async fn dial(address: &str, timeout: Duration) -> bool {
    matches!(
        tokio::time::timeout(timeout, TcpStream::connect(address)).await,
        Ok(Ok(_))
    )
}

/// Whether every expected static IP is listed, bound to `service` and either
/// `assigned` or `available`.
pub fn static_ips_ready(listing: &[StaticIp], service: &str, expected: &StaticIpExpectation) -> bool {
    expected.ids().iter().all(|id| {
        listing.iter().any(|ip| {
            &ip.static_ip_address_id == id
                && ip.service_name == service
                && matches!(ip.state, StaticIpState::Assigned | StaticIpState::Available)
        })
    })
}

/// Whether none of the expected static IPs is still `assigned`.
///
/// The service name is not compared: it disappears once the service is gone
/// while the address lingers as `assigned` for a while.
pub fn static_ips_disassociated(listing: &[StaticIp], expected: &StaticIpExpectation) -> bool {
    !expected.ids().iter().any(|id| {
        listing
            .iter()
            .any(|ip| &ip.static_ip_address_id == id && ip.state == StaticIpState::Assigned)
    })
}
