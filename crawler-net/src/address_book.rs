//! `AddressBook`: the deduplicating peer registry driving one crawl pass,
//! per §4.3.
//!
//! A one-shot demo that dials a single address given on the command line
//! has no equivalent structure; this module is grounded in the Design
//! Notes' description of the FIFO/delay-queue/counter structure and in the
//! general style of small, directly-testable owned collections seen
//! elsewhere (e.g. `node::NodeServiceSet` as a thin wrapper with explicit
//! methods rather than exposing the underlying `Vec`/`HashMap`).

use crate::candidate::{Candidate, Classification};
use crate::error::ErrorKind;
use crate::wire::{Endpoint, NetAddr, VersionPayload};
use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::time::{Duration, Instant};

/// Hard cap on total admissions in one pass (§4.4). Exceeding it does not
/// fail the pass; new admissions are simply rejected as `saturated`.
pub const MAX_ADMISSIONS: usize = 250_000;

/// How a candidate was proposed for admission. Manual seeds bypass the
/// private/loopback/multicast/reserved IP filter, mirroring the intent that
/// an operator who hand-configures a `seed_nodes` entry knows what they're
/// doing (e.g. testing against a regtest node on localhost).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    Seed,
    Learned,
    Manual,
}

#[derive(Debug, PartialEq, Eq)]
pub enum AdmitRejection {
    AlreadyKnown,
    FilteredAddress,
    ZeroPort,
    Saturated,
    SelfAdvertisement,
}

/// Outcome of one completed `PeerSession`, fed back via `report`.
pub struct SessionOutcome {
    pub endpoint: Endpoint,
    pub classification: Classification,
    pub learned: Vec<NetAddr>,
    pub rtt_ms: Option<u64>,
    /// The peer's own claim, from its `version` message, of our address
    /// (`addr_recv`). Used by the self-advertisement filter: a peer that
    /// relays "us" back inside its `addr` batch should not be re-admitted.
    pub peer_addr_recv: Option<Endpoint>,
}

pub struct AddressBook {
    candidates: HashMap<Endpoint, Candidate>,
    unprobed: VecDeque<Endpoint>,
    in_flight: usize,
    /// The crawler's own externally-visible address, if known. Used by the
    /// self-advertisement filter.
    external_ip: Option<IpAddr>,
    saturated: bool,
}

impl AddressBook {
    pub fn new() -> Self {
        AddressBook {
            candidates: HashMap::new(),
            unprobed: VecDeque::new(),
            in_flight: 0,
            external_ip: None,
            saturated: false,
        }
    }

    pub fn set_external_ip(&mut self, ip: IpAddr) {
        self.external_ip = Some(ip);
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn get(&self, endpoint: &Endpoint) -> Option<&Candidate> {
        self.candidates.get(endpoint)
    }

    /// Admits one endpoint. Rejections are non-fatal; callers typically
    /// ignore the `Err` and move to the next candidate in a batch.
    pub fn admit(&mut self, endpoint: Endpoint, source: Source) -> Result<(), AdmitRejection> {
        if endpoint.port == 0 {
            return Err(AdmitRejection::ZeroPort);
        }
        if source != Source::Manual && is_filtered_address(&endpoint.ip) {
            return Err(AdmitRejection::FilteredAddress);
        }
        if self.external_ip == Some(endpoint.ip) {
            return Err(AdmitRejection::SelfAdvertisement);
        }
        if self.candidates.contains_key(&endpoint) {
            return Err(AdmitRejection::AlreadyKnown);
        }
        if self.candidates.len() >= MAX_ADMISSIONS {
            self.saturated = true;
            return Err(AdmitRejection::Saturated);
        }

        self.candidates.insert(endpoint, Candidate::new(endpoint));
        self.unprobed.push_back(endpoint);
        Ok(())
    }

    /// Admits a batch of peer-reported addresses, applying the
    /// self-advertisement filter against the responding peer's own
    /// `addr_recv` claim in addition to the standing `external_ip` filter.
    pub fn admit_learned(&mut self, learned: &[NetAddr], peer_addr_recv: Endpoint) {
        for addr in learned {
            if addr.endpoint.ip == peer_addr_recv.ip {
                continue;
            }
            let _ = self.admit(addr.endpoint, Source::Learned);
        }
    }

    /// Atomically pops one ready endpoint (unprobed, or past its retry
    /// deadline) and transitions it to `in-flight`.
    pub fn claim(&mut self) -> Option<Candidate> {
        let now = Instant::now();
        let ready_pos = self
            .unprobed
            .iter()
            .position(|e| self.candidates.get(e).map(|c| c.is_retry_ready(now)).unwrap_or(false))?;
        let endpoint = self.unprobed.remove(ready_pos)?;
        let candidate = self.candidates.get_mut(&endpoint)?;
        candidate.mark_in_flight();
        self.in_flight += 1;
        Some(candidate.clone())
    }

    /// Applies a completed session's outcome: reclassify the probed
    /// candidate, admit anything it learned, and reschedule on retryable
    /// failure.
    pub fn report(&mut self, outcome: SessionOutcome, retry_policy: &RetryPolicy) {
        self.in_flight = self.in_flight.saturating_sub(1);

        if let Some(peer_addr_recv) = outcome.peer_addr_recv {
            self.admit_learned(&outcome.learned, peer_addr_recv);
        } else {
            for addr in &outcome.learned {
                let _ = self.admit(addr.endpoint, Source::Learned);
            }
        }

        let Some(candidate) = self.candidates.get_mut(&outcome.endpoint) else {
            return;
        };

        if let Classification::Unreachable(kind) = &outcome.classification {
            if kind.is_retryable() && candidate.attempts <= retry_policy.max_retries {
                let delay = retry_policy.backoff_delay(candidate.attempts);
                candidate.schedule_retry(delay);
                self.unprobed.push_back(outcome.endpoint);
                return;
            }
        }

        candidate.apply(outcome.classification);
    }

    /// True once there is nothing left to probe: no unprobed/retry-ready
    /// endpoints and no in-flight sessions.
    pub fn fixpoint_reached(&self) -> bool {
        if self.in_flight > 0 {
            return false;
        }
        let now = Instant::now();
        !self.unprobed.iter().any(|e| {
            self.candidates
                .get(e)
                .map(|c| c.is_retry_ready(now))
                .unwrap_or(false)
        })
    }

    pub fn is_saturated(&self) -> bool {
        self.saturated
    }

    pub fn candidates(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.values()
    }

    pub fn counts_by_classification(&self) -> HashMap<&'static str, usize> {
        let mut counts = HashMap::new();
        for candidate in self.candidates.values() {
            *counts.entry(candidate.classification.as_label()).or_insert(0) += 1;
        }
        counts
    }
}

impl Default for AddressBook {
    fn default() -> Self {
        Self::new()
    }
}

/// Exponential backoff with jitter, per §4.2: `delay = initial * multiplier
/// ^ attempt`, jittered +/-20%.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        let jitter = 1.0 + (jitter_fraction(attempt) - 0.5) * 0.4;
        Duration::from_secs_f64((base * jitter).max(0.0))
    }
}

/// Deterministic pseudo-jitter derived from the attempt count rather than a
/// random source, so the same attempt always proposes the same delay in
/// tests and in production alike (§4.2 only asks for "jittered +/-20%",
/// not cryptographic unpredictability).
fn jitter_fraction(attempt: u32) -> f64 {
    ((attempt.wrapping_mul(2654435761) >> 16) & 0xFFFF) as f64 / 65535.0
}

/// Classifies an address as a crawl target: private, loopback, multicast,
/// unspecified, link-local, and documentation/benchmarking ranges are
/// filtered out (these never represent a dialable public peer).
pub fn is_filtered_address(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_multicast()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation()
        }
        IpAddr::V6(v6) => {
            v6.is_loopback() || v6.is_multicast() || v6.is_unspecified() || is_unique_local(v6)
        }
    }
}

fn is_unique_local(ip: &std::net::Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xfe00) == 0xfc00
}
