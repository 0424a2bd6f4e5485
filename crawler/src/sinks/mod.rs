//! Concrete sinks wired up by the binary: an in-memory node table standing
//! in for the relational backend, a capped local GeoIP cache with an empty
//! backing lookup (no MaxMind `.mmdb` reader — out of scope), and an HTTP
//! alert webhook.

mod alert;
mod geoip;
mod node_table;

pub use alert::HttpAlertSink;
pub use geoip::CachingGeoIpSink;
pub use node_table::InMemoryNodeSink;
