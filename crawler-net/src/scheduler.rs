//! `Scheduler`: bounded-concurrency worker pool draining an `AddressBook`
//! to a fix-point or a pass deadline, per §4.4.
//!
//! A one-shot demo driving exactly one connection on
//! `#[tokio::main(flavor = "current_thread")]` has no equivalent pool to
//! draw from, but its habit of expressing timeouts with
//! `tokio::time::timeout` around a single future (see its
//! `timeout(handshake_timeout, ...)` call) is reused here at the worker
//! level, generalized to a pool of tasks racing against a shared
//! cancellation signal instead of one inline `match`.

use crate::address_book::{AddressBook, RetryPolicy, Source};
use crate::chain::ChainProfile;
use crate::session::{self, SessionConfig};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};

#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub max_concurrent: usize,
    pub connection_timeout: Duration,
    pub extended_timeout: Duration,
    pub pass_deadline: Duration,
    /// How long `claim()` must keep returning nothing, with zero active
    /// workers, before a fix-point is declared (§4.4, point 4).
    pub settle_interval: Duration,
    /// How long a cancelled worker is given to close its socket and report
    /// before being force-classified `cancelled` (§5).
    pub grace_period: Duration,
    pub retry_policy: RetryPolicy,
}

#[derive(Debug, Default)]
pub struct PassMetrics {
    pub counts_by_classification: HashMap<&'static str, usize>,
    pub admissions: usize,
    pub rtt_ms_mean: Option<f64>,
    pub rtt_ms_median: Option<u64>,
    pub rtt_ms_p95: Option<u64>,
    pub retries: usize,
    pub time_to_fixpoint: Duration,
    pub deadline_expired: bool,
}

struct Shared {
    book: Mutex<AddressBook>,
    chain: ChainProfile,
    session_template: SessionConfig,
    config: SchedulerConfig,
    rtts: Mutex<Vec<u64>>,
    retries: AtomicUsize,
}

/// Runs one crawl pass over `book` (which the caller has already seeded
/// with the Seeder's initial candidates) and returns per-pass metrics.
/// `book` is consumed and handed back via the returned metrics' classified
/// counts; callers that need the populated book itself should keep their
/// own handle and pass `Arc<Mutex<AddressBook>>` in a future revision —
/// for now this function owns the book for the duration of the pass.
pub async fn run_pass(
    book: AddressBook,
    chain: ChainProfile,
    session_template: SessionConfig,
    config: SchedulerConfig,
) -> (AddressBook, PassMetrics) {
    let shared = Arc::new(Shared {
        book: Mutex::new(book),
        chain,
        session_template,
        config: config.clone(),
        rtts: Mutex::new(Vec::new()),
        retries: AtomicUsize::new(0),
    });

    let active_workers = Arc::new(AtomicUsize::new(0));
    let (cancel_tx, cancel_rx) = watch::channel(false);

    let mut workers = Vec::with_capacity(config.max_concurrent);
    for _ in 0..config.max_concurrent {
        let shared = Arc::clone(&shared);
        let active_workers = Arc::clone(&active_workers);
        let cancel_rx = cancel_rx.clone();
        workers.push(tokio::spawn(worker_loop(shared, active_workers, cancel_rx)));
    }

    let pass_started = Instant::now();
    let mut idle_since: Option<Instant> = None;
    let mut deadline_expired = false;

    loop {
        if pass_started.elapsed() >= config.pass_deadline {
            deadline_expired = true;
            break;
        }

        let fixpoint = {
            let book = shared.book.lock().await;
            book.fixpoint_reached()
        };
        let idle = fixpoint && active_workers.load(Ordering::SeqCst) == 0;

        if idle {
            let since = *idle_since.get_or_insert_with(Instant::now);
            if since.elapsed() >= config.settle_interval {
                break;
            }
        } else {
            idle_since = None;
        }

        tokio::time::sleep(Duration::from_millis(50).min(config.settle_interval)).await;
    }

    let _ = cancel_tx.send(true);
    for worker in workers {
        let _ = worker.await;
    }

    let time_to_fixpoint = pass_started.elapsed();
    let shared = Arc::try_unwrap(shared).unwrap_or_else(|_| unreachable!("all workers joined"));
    let book = shared.book.into_inner();
    let rtts = shared.rtts.into_inner();
    // No candidate is ever evicted once admitted, so the book's final size
    // is the cumulative admission count for the whole pass, seeds and
    // learned addresses alike.
    let admissions = book.len();

    let metrics = PassMetrics {
        counts_by_classification: book
            .counts_by_classification()
            .into_iter()
            .collect(),
        admissions,
        rtt_ms_mean: mean(&rtts),
        rtt_ms_median: percentile(&rtts, 50),
        rtt_ms_p95: percentile(&rtts, 95),
        retries: shared.retries.load(Ordering::SeqCst),
        time_to_fixpoint,
        deadline_expired,
    };

    (book, metrics)
}

async fn worker_loop(
    shared: Arc<Shared>,
    active_workers: Arc<AtomicUsize>,
    mut cancel_rx: watch::Receiver<bool>,
) {
    loop {
        if *cancel_rx.borrow() {
            return;
        }

        let claimed = {
            let mut book = shared.book.lock().await;
            book.claim()
        };

        let Some(candidate) = claimed else {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(50)) => continue,
                _ = cancel_rx.changed() => {
                    if *cancel_rx.borrow() {
                        return;
                    }
                }
            }
            continue;
        };

        active_workers.fetch_add(1, Ordering::SeqCst);

        let attempt_index = candidate.attempts.saturating_sub(1);
        let mut session_config = shared.session_template.clone();
        session_config.protocol_version = shared.chain.protocol_version_for_attempt(attempt_index);
        let handshake_timeout = if candidate.ever_reachable {
            shared.config.extended_timeout
        } else {
            shared.config.connection_timeout
        };

        let session_fut = session::run_session(candidate.endpoint, &session_config, handshake_timeout);
        tokio::pin!(session_fut);

        let outcome = tokio::select! {
            outcome = &mut session_fut => outcome,
            _ = cancel_rx.changed() => {
                match tokio::time::timeout(shared.config.grace_period, &mut session_fut).await {
                    Ok(outcome) => outcome,
                    Err(_) => crate::session::cancelled_outcome(candidate.endpoint),
                }
            }
        };

        if let Some(rtt) = outcome.rtt_ms {
            shared.rtts.lock().await.push(rtt);
        }
        if matches!(&outcome.classification, crate::candidate::Classification::Unreachable(k) if k.is_retryable())
        {
            shared.retries.fetch_add(1, Ordering::SeqCst);
        }

        {
            let mut book = shared.book.lock().await;
            book.report(outcome, &shared.config.retry_policy);
        }

        active_workers.fetch_sub(1, Ordering::SeqCst);

        if *cancel_rx.borrow() {
            return;
        }
    }
}

fn mean(values: &[u64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<u64>() as f64 / values.len() as f64)
}

fn percentile(values: &[u64], pct: usize) -> Option<u64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let idx = (sorted.len() * pct / 100).min(sorted.len() - 1);
    Some(sorted[idx])
}

/// Seeds `book` with a batch of endpoints discovered before the pass
/// starts (the Seeder's output), ignoring individual rejections — a
/// duplicate or filtered seed is not a pass failure.
pub fn seed_book(book: &mut AddressBook, endpoints: impl IntoIterator<Item = crate::wire::Endpoint>) {
    for endpoint in endpoints {
        let _ = book.admit(endpoint, Source::Seed);
    }
}
