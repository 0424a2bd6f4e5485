//! In-memory stand-in for `original_source/apps/crawler/src/database.py`'s
//! `upsert_node`/`create_node_snapshot`/`save_snapshot`/`prune_stale_nodes`.
//!
//! A real deployment would back this with a relational store the way the
//! Python original does; this binary only needs something that satisfies
//! `crawler_net::sinks::NodeSink` well enough to drive the rest of the
//! pipeline and to exercise it in tests.

use async_trait::async_trait;
use crawler_net::sinks::{NodeRecord, NodeSink, SinkError};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct StoredNode {
    id: String,
    record: NodeRecord,
    last_seen: Instant,
    snapshots: Vec<(Instant, bool, Option<u64>, Option<i32>)>,
}

/// De-duplication window for `save_network_snapshot`, matching the
/// Python original's coarse once-per-hour cadence (§6).
const SNAPSHOT_DEDUP_WINDOW: Duration = Duration::from_secs(55 * 60);

#[derive(Default)]
struct State {
    nodes: HashMap<(IpAddr, u16, String), StoredNode>,
    next_id: u64,
    last_network_snapshot: Option<Instant>,
}

pub struct InMemoryNodeSink {
    state: Mutex<State>,
}

impl InMemoryNodeSink {
    pub fn new() -> Self {
        InMemoryNodeSink {
            state: Mutex::new(State::default()),
        }
    }

    /// Test/inspection helper: number of distinct nodes currently stored.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().nodes.len()
    }
}

impl Default for InMemoryNodeSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeSink for InMemoryNodeSink {
    async fn upsert_node(&self, record: &NodeRecord) -> Result<String, SinkError> {
        let mut state = self.state.lock().unwrap();
        let key = (record.ip, record.port, record.chain.clone());
        if let Some(existing) = state.nodes.get_mut(&key) {
            existing.record = record.clone();
            existing.last_seen = Instant::now();
            return Ok(existing.id.clone());
        }
        let id = format!("node-{}", state.next_id);
        state.next_id += 1;
        state.nodes.insert(
            key,
            StoredNode {
                id: id.clone(),
                record: record.clone(),
                last_seen: Instant::now(),
                snapshots: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn append_snapshot(
        &self,
        node_id: &str,
        online: bool,
        rtt_ms: Option<u64>,
        block_height: Option<i32>,
    ) -> Result<(), SinkError> {
        let mut state = self.state.lock().unwrap();
        let node = state
            .nodes
            .values_mut()
            .find(|n| n.id == node_id)
            .ok_or_else(|| SinkError::Failed(format!("unknown node id {node_id}")))?;
        node.snapshots.push((Instant::now(), online, rtt_ms, block_height));
        Ok(())
    }

    async fn save_network_snapshot(&self, _chain: &str) -> Result<Option<String>, SinkError> {
        let mut state = self.state.lock().unwrap();
        let now = Instant::now();
        if let Some(last) = state.last_network_snapshot {
            if now.duration_since(last) < SNAPSHOT_DEDUP_WINDOW {
                return Ok(None);
            }
        }
        state.last_network_snapshot = Some(now);
        Ok(Some(format!("snapshot-{}", state.nodes.len())))
    }

    async fn prune_stale(&self, older_than_hours: u32) -> Result<u64, SinkError> {
        let mut state = self.state.lock().unwrap();
        let cutoff = Duration::from_secs(u64::from(older_than_hours) * 3600);
        let now = Instant::now();
        let before = state.nodes.len();
        state
            .nodes
            .retain(|_, node| now.duration_since(node.last_seen) < cutoff);
        Ok((before - state.nodes.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> NodeRecord {
        NodeRecord {
            ip: "127.0.0.1".parse().unwrap(),
            port: 8333,
            chain: "bitcoin".to_string(),
            protocol_version: Some(70016),
            user_agent: Some("/Satoshi:25.0.0/".to_string()),
            services: Some(1),
            classification: "reachable",
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_by_identity() {
        let sink = InMemoryNodeSink::new();
        let id1 = sink.upsert_node(&record()).await.unwrap();
        let id2 = sink.upsert_node(&record()).await.unwrap();
        assert_eq!(id1, id2);
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn network_snapshot_dedups_within_window() {
        let sink = InMemoryNodeSink::new();
        let first = sink.save_network_snapshot("bitcoin").await.unwrap();
        let second = sink.save_network_snapshot("bitcoin").await.unwrap();
        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn append_snapshot_requires_known_node() {
        let sink = InMemoryNodeSink::new();
        let result = sink.append_snapshot("node-missing", true, Some(50), None).await;
        assert!(result.is_err());
    }
}
