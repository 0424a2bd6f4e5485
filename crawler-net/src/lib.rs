//! Crawl engine for a Bitcoin-derived P2P network.
//!
//! Structured along the same seam a one-shot handshake demo once drew
//! between its wire codec and its connection logic: a pure, I/O-free
//! protocol layer (`wire`, `error`) underneath the stateful pieces that
//! drive real sockets (`session`, `scheduler`).

pub mod address_book;
pub mod candidate;
pub mod chain;
pub mod error;
pub mod scheduler;
pub mod seeder;
pub mod session;
pub mod sinks;
pub mod wire;

pub use address_book::{AddressBook, SessionOutcome};
pub use candidate::{Candidate, Classification};
pub use chain::ChainProfile;
pub use error::{CodecError, ErrorKind};
pub use scheduler::{PassMetrics, SchedulerConfig};
pub use seeder::{seed_candidates, SeederError};
pub use session::SessionConfig;
