//! Atomically replaceable route table.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::routing::table::RouteTable;

/// Shared handle to the route table currently in service.
///
/// Readers take a snapshot and keep it for the whole request; reloads
/// publish a complete new table with a single pointer swap.
#[derive(Debug, Clone)]
pub struct SharedRouteTable {
    current: Arc<ArcSwap<RouteTable>>,
}

impl SharedRouteTable {
    pub fn new(table: RouteTable) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(table)),
        }
    }

    /// The table in service right now.
    pub fn snapshot(&self) -> Arc<RouteTable> {
        self.current.load_full()
    }

    /// Replace the table for all subsequent snapshots.
    pub fn publish(&self, table: RouteTable) {
        let prefixes: Vec<String> = table.routes().map(|r| r.prefix.clone()).collect();
        self.current.store(Arc::new(table));
        tracing::info!(routes = prefixes.len(), prefixes = ?prefixes, "Route table published");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EndpointEntry, ProxyConfig};

    fn table(target: &str) -> RouteTable {
        let mut config = ProxyConfig::default();
        config
            .endpoints
            .insert("/svc".into(), EndpointEntry::Target(target.into()));
        RouteTable::from_config(&config).unwrap()
    }

    #[test]
    fn snapshots_survive_publish() {
        let shared = SharedRouteTable::new(table("http://old.local"));
        let before = shared.snapshot();

        shared.publish(table("http://new.local"));

        let in_flight = before.lookup("/svc/x").unwrap();
        assert_eq!(in_flight.route.target.host_str(), Some("old.local"));

        let fresh = shared.snapshot().lookup("/svc/x").unwrap();
        assert_eq!(fresh.route.target.host_str(), Some("new.local"));
    }

    #[test]
    fn clones_observe_the_same_table() {
        let shared = SharedRouteTable::new(RouteTable::default());
        let clone = shared.clone();
        clone.publish(table("http://new.local"));
        assert_eq!(shared.snapshot().len(), 1);
    }
}
