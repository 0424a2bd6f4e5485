//! Per-network constants, as described in §3's `ChainProfile`.

use regex::Regex;
use std::net::SocketAddr;

/// Constants distinguishing one Bitcoin-derived network from another.
///
/// A closed `Chain` enum hard-coding two magic values (`Regtest`,
/// `Testnet3`) is too narrow here; this crawler needs to support arbitrary
/// forks configured at runtime (§6), so `ChainProfile` is a plain data
/// record rather than an enum, loaded from YAML by the `crawler` binary.
#[derive(Clone, Debug)]
pub struct ChainProfile {
    pub name: String,
    pub ticker: String,
    pub p2p_port: u16,
    pub rpc_port: u16,
    pub protocol_version: i32,
    /// Fallback versions to retry the handshake with, in order, when the
    /// first attempt never receives a `version` reply (§4.2).
    pub fallback_protocol_versions: Vec<i32>,
    pub magic: u32,
    pub minimum_version: i32,
    pub dns_seeds: Vec<String>,
    pub seed_nodes: Vec<SocketAddr>,
    /// Regex patterns for extracting a version string out of a peer's
    /// user-agent. Per Open Question (a), only the first is applied.
    pub user_agent_patterns: Vec<String>,
}

impl ChainProfile {
    /// The protocol version to advertise for a given retry attempt: `0` is
    /// the chain's native version, `1..` index into `fallback_protocol_versions`.
    pub fn protocol_version_for_attempt(&self, attempt: u32) -> i32 {
        if attempt == 0 {
            return self.protocol_version;
        }
        let idx = (attempt - 1) as usize;
        self.fallback_protocol_versions
            .get(idx)
            .copied()
            .unwrap_or(self.protocol_version)
    }

    /// Extracts a version string from a user-agent using the first
    /// configured pattern, if any capture group matches.
    pub fn extract_user_agent_version(&self, user_agent: &str) -> Option<String> {
        let pattern = self.user_agent_patterns.first()?;
        let re = Regex::new(pattern).ok()?;
        let caps = re.captures(user_agent)?;
        caps.iter()
            .skip(1)
            .find_map(|c| c.map(|m| m.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> ChainProfile {
        ChainProfile {
            name: "Bitcoin".into(),
            ticker: "BTC".into(),
            p2p_port: 8333,
            rpc_port: 8332,
            protocol_version: 70016,
            fallback_protocol_versions: vec![70001, 60001],
            magic: 0xD9B4BEF9,
            minimum_version: 70001,
            dns_seeds: vec!["seed.bitcoin.sipa.be".into()],
            seed_nodes: vec![],
            user_agent_patterns: vec![r"/Satoshi:([0-9.]+)/".into()],
        }
    }

    #[test]
    fn protocol_version_falls_back_in_order() {
        let p = profile();
        assert_eq!(p.protocol_version_for_attempt(0), 70016);
        assert_eq!(p.protocol_version_for_attempt(1), 70001);
        assert_eq!(p.protocol_version_for_attempt(2), 60001);
        // beyond the configured list, stick with the native version
        assert_eq!(p.protocol_version_for_attempt(3), 70016);
    }

    #[test]
    fn extracts_version_from_user_agent() {
        let p = profile();
        assert_eq!(
            p.extract_user_agent_version("/Satoshi:25.0.0/"),
            Some("25.0.0".to_string())
        );
        assert_eq!(p.extract_user_agent_version("/unknown/"), None);
    }
}
