//! Error taxonomies for the codec and for the session/scheduler layer.
//!
//! A single stringly-typed `PeerError` is split in two here: a
//! `CodecError` for the pure, I/O-free frame parser (§4.1's five failure
//! modes), and an `ErrorKind` for everything above it that needs to decide
//! whether an outcome is retryable, terminal-unreachable, or terminal-stale.

use std::fmt;

/// The five ways `wire::frame::parse_frame` can fail, per the wire contract.
///
/// `ShortHeader` and `ShortPayload` are not protocol violations: they mean
/// "not enough bytes yet". `PeerSession`'s streaming reader treats them as a
/// signal to wait for more data rather than as a session failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("short header")]
    ShortHeader,
    #[error("bad magic")]
    BadMagic,
    #[error("oversize payload ({len} bytes > cap)")]
    OversizePayload { len: u32 },
    #[error("short payload")]
    ShortPayload,
    #[error("bad checksum")]
    BadChecksum,
}

impl CodecError {
    /// True for the two "need more bytes" outcomes that are not protocol
    /// violations.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, CodecError::ShortHeader | CodecError::ShortPayload)
    }
}

/// The session/scheduler error taxonomy from §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ConnectRefused,
    ConnectTimeout,
    ReadTimeout,
    BadMagic,
    BadChecksum,
    OversizePayload,
    HandshakeTimeout,
    BelowMinimumVersion,
    Cancelled,
    SinkError,
}

impl ErrorKind {
    /// Whether this failure should be retried with backoff, subject to
    /// `max_retries`.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::ConnectRefused
                | ErrorKind::ConnectTimeout
                | ErrorKind::ReadTimeout
                | ErrorKind::HandshakeTimeout
        )
    }

    /// Whether exhausting retries (or an immediate terminal failure) should
    /// classify the candidate as `unreachable` rather than `stale`.
    pub fn is_unreachable_terminal(&self) -> bool {
        matches!(
            self,
            ErrorKind::ConnectRefused
                | ErrorKind::ConnectTimeout
                | ErrorKind::ReadTimeout
                | ErrorKind::BadMagic
                | ErrorKind::BadChecksum
                | ErrorKind::OversizePayload
                | ErrorKind::HandshakeTimeout
                | ErrorKind::Cancelled
        )
    }
}

impl From<CodecError> for ErrorKind {
    /// Maps a hard (non-incomplete) codec failure onto the session taxonomy.
    ///
    /// Panics if given an "incomplete" codec error, since those never reach
    /// the session outcome layer — the reader just waits for more bytes.
    fn from(value: CodecError) -> Self {
        match value {
            CodecError::BadMagic => ErrorKind::BadMagic,
            CodecError::BadChecksum => ErrorKind::BadChecksum,
            CodecError::OversizePayload { .. } => ErrorKind::OversizePayload,
            CodecError::ShortHeader | CodecError::ShortPayload => {
                unreachable!("incomplete codec errors never become session errors")
            }
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::ConnectRefused => "connect-refused",
            ErrorKind::ConnectTimeout => "connect-timeout",
            ErrorKind::ReadTimeout => "read-timeout",
            ErrorKind::BadMagic => "bad-magic",
            ErrorKind::BadChecksum => "bad-checksum",
            ErrorKind::OversizePayload => "oversize-payload",
            ErrorKind::HandshakeTimeout => "handshake-timeout",
            ErrorKind::BelowMinimumVersion => "below-minimum-version",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::SinkError => "sink-error",
        };
        f.write_str(s)
    }
}
