//! The binary's own error type, mapped onto the CLI exit codes in §10.4.
//!
//! Grounded in `net::error::PeerError`'s pattern of one small enum per
//! boundary; `crawler-net` already owns `CodecError`/`ErrorKind` for the
//! protocol layer, so this one is scoped to configuration and the outer
//! driver.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("no seed candidates available for chain {0}")]
    NoSeeds(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Exit code per §10.4: `1` for configuration errors, `2` for
    /// `no-seeds`, everything else falls back to `1`.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::NoSeeds(_) => 2,
            CliError::Config(_) | CliError::Io(_) => 1,
        }
    }
}
