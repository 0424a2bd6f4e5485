//! Configuration loading: YAML file + environment overrides + defaults,
//! precedence `env > file > defaults`, per §10.3.
//!
//! Grounded in `original_source/apps/crawler/src/config.py`
//! (`load_chain_config_from_yaml`/`load_crawler_config_from_yaml`), which
//! reads a `config/project.config.yaml` with `chainConfig`/`crawlerConfig`
//! sections and layers `os.getenv(...)` overrides on top; translated here
//! into a `serde`-deserialized all-`Option` mirror (`PartialCrawlerConfig`)
//! merged field-by-field in favor of explicit, small, directly-readable
//! structs over generic merge machinery.

use crate::error::CliError;
use crawler_net::ChainProfile;
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ChainConfigFile {
    name: String,
    ticker: Option<String>,
    #[serde(rename = "p2pPort")]
    p2p_port: u16,
    #[serde(rename = "rpcPort")]
    rpc_port: Option<u16>,
    #[serde(rename = "protocolVersion")]
    protocol_version: i32,
    #[serde(rename = "magicBytes")]
    magic_bytes: String,
    #[serde(rename = "minimumVersion")]
    minimum_version: i32,
    #[serde(rename = "dnsSeeds", default)]
    dns_seeds: Vec<String>,
    #[serde(rename = "seedNodes", default)]
    seed_nodes: Vec<String>,
    #[serde(rename = "userAgentPatterns", default)]
    user_agent_patterns: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PartialCrawlerConfig {
    #[serde(rename = "scanIntervalMinutes")]
    scan_interval_minutes: Option<u64>,
    #[serde(rename = "maxConcurrentConnections")]
    max_concurrent_connections: Option<usize>,
    #[serde(rename = "connectionTimeoutSeconds")]
    connection_timeout_seconds: Option<u64>,
    #[serde(rename = "extendedTimeoutSeconds")]
    extended_timeout_seconds: Option<u64>,
    #[serde(rename = "maxRetries")]
    max_retries: Option<u32>,
    #[serde(rename = "initialRetryDelaySeconds")]
    initial_retry_delay_seconds: Option<f64>,
    #[serde(rename = "retryBackoffMultiplier")]
    retry_backoff_multiplier: Option<f64>,
    #[serde(rename = "fallbackProtocolVersions", default)]
    fallback_protocol_versions: Option<Vec<i32>>,
    #[serde(rename = "requireVersionForSave")]
    require_version_for_save: Option<bool>,
    #[serde(rename = "pruneAfterHours")]
    prune_after_hours: Option<u32>,
    #[serde(rename = "getaddrDelayMs")]
    getaddr_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ProjectConfigFile {
    #[serde(rename = "chainConfig")]
    chain_config: ChainConfigFile,
    #[serde(rename = "crawlerConfig", default)]
    crawler_config: PartialCrawlerConfig,
}

pub struct CrawlerConfig {
    pub chain: ChainProfile,
    pub scan_interval: Duration,
    pub max_concurrent: usize,
    pub connection_timeout: Duration,
    pub extended_timeout: Duration,
    pub max_retries: u32,
    pub initial_retry_delay: Duration,
    pub retry_backoff_multiplier: f64,
    pub require_version_for_save: bool,
    pub prune_after_hours: u32,
    pub getaddr_delay: Duration,
}

/// Loads configuration from `path`, then applies the same-named
/// environment variables as the Python original, then fills in defaults.
pub fn load(path: &std::path::Path, chain_override: Option<&str>) -> Result<CrawlerConfig, CliError> {
    let raw = std::fs::read_to_string(path)?;
    let file: ProjectConfigFile = serde_yaml::from_str(&raw)
        .map_err(|e| CliError::Config(format!("invalid config YAML: {e}")))?;

    let chain_name = chain_override
        .map(str::to_string)
        .or_else(|| std::env::var("CHAIN").ok())
        .unwrap_or_else(|| file.chain_config.name.to_lowercase());

    let crawler = file.crawler_config;
    let fallback_protocol_versions = crawler.fallback_protocol_versions.clone().unwrap_or_default();
    let chain = build_chain_profile(file.chain_config, &chain_name, fallback_protocol_versions)?;

    let max_concurrent = env_override_usize("MAX_CONCURRENT_CONNECTIONS")
        .or(crawler.max_concurrent_connections)
        .unwrap_or(100);
    let connection_timeout_secs = env_override_u64("CONNECTION_TIMEOUT_SECONDS")
        .or(crawler.connection_timeout_seconds)
        .unwrap_or(10);
    let extended_timeout_secs = env_override_u64("EXTENDED_TIMEOUT_SECONDS")
        .or(crawler.extended_timeout_seconds)
        .unwrap_or(30);
    let max_retries = env_override_u32("MAX_RETRIES").or(crawler.max_retries).unwrap_or(3);
    let initial_retry_delay_secs = env_override_f64("INITIAL_RETRY_DELAY_SECONDS")
        .or(crawler.initial_retry_delay_seconds)
        .unwrap_or(1.0);
    let retry_backoff_multiplier = env_override_f64("RETRY_BACKOFF_MULTIPLIER")
        .or(crawler.retry_backoff_multiplier)
        .unwrap_or(2.0);
    let require_version_for_save = env_override_bool("REQUIRE_VERSION_FOR_SAVE")
        .or(crawler.require_version_for_save)
        .unwrap_or(true);
    let prune_after_hours = env_override_u32("PRUNE_AFTER_HOURS")
        .or(crawler.prune_after_hours)
        .unwrap_or(168);
    let getaddr_delay_ms = env_override_u64("GETADDR_DELAY_MS")
        .or(crawler.getaddr_delay_ms)
        .unwrap_or(1_000);
    let scan_interval_minutes = env_override_u64("SCAN_INTERVAL_MINUTES")
        .or(crawler.scan_interval_minutes)
        .unwrap_or(5);

    let config = CrawlerConfig {
        chain,
        scan_interval: Duration::from_secs(scan_interval_minutes * 60),
        max_concurrent,
        connection_timeout: Duration::from_secs(connection_timeout_secs),
        extended_timeout: Duration::from_secs(extended_timeout_secs),
        max_retries,
        initial_retry_delay: Duration::from_secs_f64(initial_retry_delay_secs),
        retry_backoff_multiplier,
        require_version_for_save,
        prune_after_hours,
        getaddr_delay: Duration::from_millis(getaddr_delay_ms),
    };

    validate(&config)?;
    Ok(config)
}

fn build_chain_profile(
    file: ChainConfigFile,
    chain_name: &str,
    fallback_protocol_versions: Vec<i32>,
) -> Result<ChainProfile, CliError> {
    let magic_bytes = hex::decode(file.magic_bytes.trim()).map_err(|e| {
        CliError::Config(format!("invalid magicBytes hex string: {e}"))
    })?;
    if magic_bytes.len() != 4 {
        return Err(CliError::Config(
            "magicBytes must be exactly 4 bytes (8 hex chars)".to_string(),
        ));
    }
    let magic = u32::from_le_bytes(magic_bytes.try_into().unwrap());

    let seed_nodes: Vec<SocketAddr> = file
        .seed_nodes
        .iter()
        .filter_map(|s| match s.parse() {
            Ok(addr) => Some(addr),
            Err(e) => {
                log::warn!("ignoring malformed seedNodes entry {s}: {e}");
                None
            }
        })
        .collect();

    if file.dns_seeds.is_empty() && seed_nodes.is_empty() {
        return Err(CliError::Config(
            "no seed sources configured: provide dnsSeeds or seedNodes".to_string(),
        ));
    }

    Ok(ChainProfile {
        name: chain_name.to_string(),
        ticker: file.ticker.unwrap_or_else(|| file.name.to_uppercase()),
        p2p_port: file.p2p_port,
        rpc_port: file.rpc_port.unwrap_or(file.p2p_port),
        protocol_version: file.protocol_version,
        fallback_protocol_versions,
        magic,
        minimum_version: file.minimum_version,
        dns_seeds: file.dns_seeds,
        seed_nodes,
        user_agent_patterns: file.user_agent_patterns,
    })
}

fn validate(config: &CrawlerConfig) -> Result<(), CliError> {
    if config.max_retries > 10 {
        return Err(CliError::Config("maxRetries must be in 0..=10".to_string()));
    }
    if config.connection_timeout.is_zero() {
        return Err(CliError::Config("connectionTimeoutSeconds must be > 0".to_string()));
    }
    if config.extended_timeout < config.connection_timeout {
        return Err(CliError::Config(
            "extendedTimeoutSeconds must be >= connectionTimeoutSeconds".to_string(),
        ));
    }
    if config.initial_retry_delay.is_zero() {
        return Err(CliError::Config(
            "initialRetryDelaySeconds must be > 0".to_string(),
        ));
    }
    if config.retry_backoff_multiplier < 1.0 {
        return Err(CliError::Config(
            "retryBackoffMultiplier must be >= 1.0".to_string(),
        ));
    }
    Ok(())
}

fn env_override_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
fn env_override_u32(key: &str) -> Option<u32> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
fn env_override_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
fn env_override_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
fn env_override_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const MINIMAL_YAML: &str = r#"
chainConfig:
  name: Bitcoin
  p2pPort: 8333
  protocolVersion: 70016
  magicBytes: f9beb4d9
  minimumVersion: 70001
  dnsSeeds:
    - seed.bitcoin.sipa.be
"#;

    #[test]
    fn loads_minimal_config_with_defaults() {
        let file = write_config(MINIMAL_YAML);
        let config = load(file.path(), None).unwrap();
        assert_eq!(config.chain.p2p_port, 8333);
        assert_eq!(config.max_concurrent, 100);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn rejects_missing_seeds() {
        let file = write_config(
            r#"
chainConfig:
  name: Bitcoin
  p2pPort: 8333
  protocolVersion: 70016
  magicBytes: f9beb4d9
  minimumVersion: 70001
"#,
        );
        assert!(load(file.path(), None).is_err());
    }

    #[test]
    fn rejects_malformed_magic_bytes() {
        let file = write_config(
            r#"
chainConfig:
  name: Bitcoin
  p2pPort: 8333
  protocolVersion: 70016
  magicBytes: not-hex
  minimumVersion: 70001
  dnsSeeds: [seed.example.com]
"#,
        );
        assert!(load(file.path(), None).is_err());
    }

    #[test]
    fn chain_override_takes_precedence_over_file_name() {
        let file = write_config(MINIMAL_YAML);
        let config = load(file.path(), Some("regtest")).unwrap();
        assert_eq!(config.chain.name, "regtest");
    }
}
