//! `Candidate`: one `AddressBook` entry, per §3 and §4.3.
//!
//! A one-shot handshake demo never needed to remember peers across
//! attempts, so this has no prior equivalent. Grounded instead in the Design Notes'
//! tagged `Classification` enum, reconciled with §7's requirement that a
//! terminal `unreachable` still records a previously obtained
//! `VersionPayload`: `Candidate` keeps both a tagged current `Classification`
//! and a separate `last_version` cache that survives reclassification.

use crate::error::ErrorKind;
use crate::wire::{Endpoint, VersionPayload};
use std::time::{Duration, Instant};

#[derive(Clone, Debug, PartialEq)]
pub enum Classification {
    Unprobed,
    InFlight,
    Reachable(VersionPayload),
    Unreachable(ErrorKind),
    /// Reachable, but below `minimum_version`.
    Stale(VersionPayload),
}

impl Classification {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Classification::Unprobed | Classification::InFlight)
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            Classification::Unprobed => "unprobed",
            Classification::InFlight => "in-flight",
            Classification::Reachable(_) => "reachable",
            Classification::Unreachable(_) => "unreachable",
            Classification::Stale(_) => "stale",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Candidate {
    pub endpoint: Endpoint,
    pub classification: Classification,
    pub attempts: u32,
    pub next_attempt: Option<Instant>,
    pub last_error: Option<ErrorKind>,
    /// The most recent `VersionPayload` ever obtained from this peer,
    /// independent of the current classification (§7).
    pub last_version: Option<VersionPayload>,
    pub services: u64,
    /// True if this candidate was ever reachable in a prior probe; governs
    /// whether a retry after failure uses `extended_timeout` (§4.2).
    pub ever_reachable: bool,
}

impl Candidate {
    pub fn new(endpoint: Endpoint) -> Self {
        Candidate {
            endpoint,
            classification: Classification::Unprobed,
            attempts: 0,
            next_attempt: None,
            last_error: None,
            last_version: None,
            services: 0,
            ever_reachable: false,
        }
    }

    pub fn mark_in_flight(&mut self) {
        self.classification = Classification::InFlight;
        self.attempts += 1;
    }

    /// Applies a terminal classification, updating `last_version` and
    /// `ever_reachable` bookkeeping without losing previously obtained
    /// version evidence.
    pub fn apply(&mut self, classification: Classification) {
        match &classification {
            Classification::Reachable(v) | Classification::Stale(v) => {
                self.last_version = Some(v.clone());
                self.ever_reachable = true;
            }
            Classification::Unreachable(kind) => {
                self.last_error = Some(*kind);
            }
            Classification::Unprobed | Classification::InFlight => {}
        }
        self.classification = classification;
    }

    /// Schedules a retry `delay` from now, per the backoff computation in
    /// `crate::scheduler::backoff_delay`.
    pub fn schedule_retry(&mut self, delay: Duration) {
        self.next_attempt = Some(Instant::now() + delay);
        self.classification = Classification::Unprobed;
    }

    pub fn is_retry_ready(&self, now: Instant) -> bool {
        matches!(self.classification, Classification::Unprobed)
            && self.next_attempt.map(|at| at <= now).unwrap_or(true)
    }
}
