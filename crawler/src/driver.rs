//! Outer crawl loop: seed, run one pass, publish results through the
//! configured sinks, repeat.
//!
//! A one-shot `main.rs` that runs exactly one handshake and exits has no
//! outer loop to draw from; this generalizes that single `tokio::main`
//! entry point into a loop around `crawler_net::scheduler::run_pass`,
//! publishing through the sink traits instead of printing to stdout.

use crate::config::CrawlerConfig;
use crate::error::CliError;
use crawler_net::address_book::{AddressBook, RetryPolicy};
use crawler_net::candidate::Classification;
use crawler_net::scheduler::{self, SchedulerConfig};
use crawler_net::session::SessionConfig;
use crawler_net::sinks::{AlertSink, GeoIpSink, NodeRecord, NodeSink};
use crawler_net::{seed_candidates, PassMetrics};
use std::time::Instant;

pub struct Sinks<'a> {
    pub nodes: &'a dyn NodeSink,
    pub geoip: &'a dyn GeoIpSink,
    pub alerts: &'a dyn AlertSink,
}

/// Runs exactly one crawl pass and publishes its results. Returns the
/// pass metrics on success.
pub async fn run_once(config: &CrawlerConfig, sinks: &Sinks<'_>) -> Result<PassMetrics, CliError> {
    let endpoints = seed_candidates(&config.chain)
        .await
        .map_err(|_| CliError::NoSeeds(config.chain.name.clone()))?;

    let mut book = AddressBook::new();
    scheduler::seed_book(&mut book, endpoints);

    let session_template = SessionConfig {
        magic: config.chain.magic,
        protocol_version: config.chain.protocol_version,
        services: 0,
        user_agent: format!("/crawler:{}/", env!("CARGO_PKG_VERSION")),
        start_height: 0,
        minimum_version: config.chain.minimum_version,
        connect_timeout: config.connection_timeout,
        getaddr_delay: config.getaddr_delay,
    };

    let scheduler_config = SchedulerConfig {
        max_concurrent: config.max_concurrent,
        connection_timeout: config.connection_timeout,
        extended_timeout: config.extended_timeout,
        pass_deadline: config.scan_interval,
        settle_interval: std::time::Duration::from_secs(5),
        grace_period: std::time::Duration::from_secs(5),
        retry_policy: RetryPolicy {
            max_retries: config.max_retries,
            initial_delay: config.initial_retry_delay,
            backoff_multiplier: config.retry_backoff_multiplier,
        },
    };

    let (book, metrics) = scheduler::run_pass(book, config.chain.clone(), session_template, scheduler_config).await;

    publish(config, &book, sinks).await;

    Ok(metrics)
}

/// Publishes one pass's results through the sink traits. A sink failure for
/// one candidate is logged and skipped rather than aborting the pass — the
/// crawler's job is to keep crawling, not to guarantee every record lands.
async fn publish(config: &CrawlerConfig, book: &AddressBook, sinks: &Sinks<'_>) {
    for candidate in book.candidates() {
        let version = match &candidate.classification {
            Classification::Reachable(v) | Classification::Stale(v) => Some(v),
            _ => candidate.last_version.as_ref(),
        };
        if config.require_version_for_save && version.is_none() {
            continue;
        }

        let geo = sinks.geoip.lookup(candidate.endpoint.ip);
        log::debug!(
            "{}:{} geo={:?}",
            candidate.endpoint.ip,
            candidate.endpoint.port,
            geo.country_code
        );

        let record = NodeRecord {
            ip: candidate.endpoint.ip,
            port: candidate.endpoint.port,
            chain: config.chain.name.clone(),
            protocol_version: version.map(|v| v.protocol_version),
            user_agent: version.map(|v| v.user_agent.clone()),
            services: Some(candidate.services),
            classification: candidate.classification.as_label(),
        };

        let node_id = match sinks.nodes.upsert_node(&record).await {
            Ok(id) => id,
            Err(e) => {
                log::warn!(
                    "node sink failed for {}:{}: {e}",
                    candidate.endpoint.ip,
                    candidate.endpoint.port
                );
                continue;
            }
        };

        let online = matches!(
            candidate.classification,
            Classification::Reachable(_) | Classification::Stale(_)
        );
        if let Err(e) = sinks
            .nodes
            .append_snapshot(&node_id, online, None, None)
            .await
        {
            log::warn!(
                "snapshot sink failed for {}:{}: {e}",
                candidate.endpoint.ip,
                candidate.endpoint.port
            );
        }
    }

    let _ = sinks.nodes.save_network_snapshot(&config.chain.name).await;
    let _ = sinks.nodes.prune_stale(config.prune_after_hours).await;
}

/// Runs passes back-to-back forever, sleeping `scan_interval` between
/// them, and notifying `sinks.alerts` when a pass plus its sleep overruns
/// the configured interval by more than 2x.
pub async fn run_continuous(config: &CrawlerConfig, sinks: &Sinks<'_>) -> Result<(), CliError> {
    loop {
        let started = Instant::now();
        let metrics = tokio::select! {
            result = run_once(config, sinks) => result?,
            _ = tokio::signal::ctrl_c() => {
                log::info!("shutdown requested, exiting cleanly");
                return Ok(());
            }
        };
        log::info!(
            "pass complete: {} classified, fixpoint after {:?}, deadline_expired={}",
            metrics.admissions,
            metrics.time_to_fixpoint,
            metrics.deadline_expired
        );

        let elapsed = started.elapsed();
        if elapsed > config.scan_interval * 2 {
            let overdue_minutes = (elapsed.as_secs() / 60) as u32;
            if let Err(e) = sinks.alerts.notify_check_overdue(overdue_minutes).await {
                log::warn!("alert webhook failed: {e}");
            }
        }

        let remaining = config.scan_interval.saturating_sub(elapsed);
        tokio::select! {
            _ = tokio::time::sleep(remaining) => {}
            _ = tokio::signal::ctrl_c() => {
                log::info!("shutdown requested, exiting cleanly");
                return Ok(());
            }
        }
    }
}
