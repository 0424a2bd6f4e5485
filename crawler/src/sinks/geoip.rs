//! Local GeoIP cache, grounded in `original_source/apps/crawler/src/geoip.py`:
//! a dict capped at 10,000 entries that, on overflow, evicts the oldest
//! half (the first 5,000 insertion-ordered keys) rather than maintaining a
//! true LRU ordering.
//!
//! Resolving a MaxMind `.mmdb` database is out of scope (§6 Non-goals);
//! `resolve` always returns an all-`None` record, so this sink exists to
//! carry the caching shape forward for whichever backing lookup is wired
//! in later without touching the caller.

use crawler_net::sinks::{GeoIpRecord, GeoIpSink};
use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::Mutex;

const CACHE_CAP: usize = 10_000;
const EVICT_COUNT: usize = 5_000;

struct Cache {
    entries: HashMap<IpAddr, GeoIpRecord>,
    order: VecDeque<IpAddr>,
}

pub struct CachingGeoIpSink {
    cache: Mutex<Cache>,
}

impl CachingGeoIpSink {
    pub fn new() -> Self {
        CachingGeoIpSink {
            cache: Mutex::new(Cache {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    fn resolve(&self, _ip: IpAddr) -> GeoIpRecord {
        GeoIpRecord::default()
    }
}

impl Default for CachingGeoIpSink {
    fn default() -> Self {
        Self::new()
    }
}

impl GeoIpSink for CachingGeoIpSink {
    fn lookup(&self, ip: IpAddr) -> GeoIpRecord {
        let mut cache = self.cache.lock().unwrap();
        if let Some(record) = cache.entries.get(&ip) {
            return record.clone();
        }
        let record = self.resolve(ip);
        if cache.entries.len() >= CACHE_CAP {
            for _ in 0..EVICT_COUNT {
                if let Some(oldest) = cache.order.pop_front() {
                    cache.entries.remove(&oldest);
                } else {
                    break;
                }
            }
        }
        cache.order.push_back(ip);
        cache.entries.insert(ip, record.clone());
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_ip_resolves_to_empty_record_without_error() {
        let sink = CachingGeoIpSink::new();
        let record = sink.lookup("8.8.8.8".parse().unwrap());
        assert_eq!(record, GeoIpRecord::default());
    }

    #[test]
    fn cache_evicts_oldest_half_on_overflow() {
        let sink = CachingGeoIpSink::new();
        for i in 0..CACHE_CAP {
            let ip: IpAddr = format!("10.{}.{}.{}", (i >> 16) & 0xff, (i >> 8) & 0xff, i & 0xff)
                .parse()
                .unwrap();
            sink.lookup(ip);
        }
        assert_eq!(sink.cache.lock().unwrap().entries.len(), CACHE_CAP);

        let overflow_ip: IpAddr = "172.16.0.1".parse().unwrap();
        sink.lookup(overflow_ip);

        let cache = sink.cache.lock().unwrap();
        assert_eq!(cache.entries.len(), CACHE_CAP - EVICT_COUNT + 1);
        assert!(cache.entries.contains_key(&overflow_ip));
    }
}
