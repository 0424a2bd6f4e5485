//! Capability interfaces toward the outside world, per §6.
//!
//! Persisting results or talking to an external service has no prior
//! equivalent here; these trait boundaries are grounded in
//! `original_source/apps/crawler/src/{database,geoip}.py`'s shape
//! (upsert-by-identity, append-only snapshots, null-safe lookups) and use
//! `async-trait`, a common choice for writing trait methods that return
//! futures without hand-rolled boxed-future signatures.

use async_trait::async_trait;
use std::net::IpAddr;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq)]
pub struct NodeRecord {
    pub ip: IpAddr,
    pub port: u16,
    pub chain: String,
    pub protocol_version: Option<i32>,
    pub user_agent: Option<String>,
    pub services: Option<u64>,
    pub classification: &'static str,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("{0}")]
    Failed(String),
}

/// Persistence sink. The core depends only on this shape (§6); the
/// reference implementation in the `crawler` binary stores to an in-memory
/// table, standing in for a relational backend.
#[async_trait]
pub trait NodeSink: Send + Sync {
    async fn upsert_node(&self, record: &NodeRecord) -> Result<String, SinkError>;
    async fn append_snapshot(
        &self,
        node_id: &str,
        online: bool,
        rtt_ms: Option<u64>,
        block_height: Option<i32>,
    ) -> Result<(), SinkError>;
    /// Idempotent coarse snapshot; the sink is expected to de-duplicate
    /// within a ~55-minute window.
    async fn save_network_snapshot(&self, chain: &str) -> Result<Option<String>, SinkError>;
    async fn prune_stale(&self, older_than_hours: u32) -> Result<u64, SinkError>;
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeoIpRecord {
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub tz: Option<String>,
    pub asn: Option<u32>,
    pub asn_org: Option<String>,
}

/// GeoIP sink. Must never raise on an unknown IP — an all-`None` record is
/// the correct answer, not an error (§6).
pub trait GeoIpSink: Send + Sync {
    fn lookup(&self, ip: IpAddr) -> GeoIpRecord;
}

/// Alert webhook. Non-2xx responses are logged, not retried within the
/// pass (§6) — callers should treat `Err` as a fire-and-forget failure.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify_check_overdue(&self, check_minutes: u32) -> Result<(), SinkError>;
}
