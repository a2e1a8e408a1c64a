//! Usage monitor: network bytes and per-module tuple counters.
//!
//! Lives next to the [`TimeTracker`](crate::tracker::TimeTracker) in the
//! simulation and is lent to handlers the same way. Devices report what
//! they move and process; the orchestrator turns the totals into rates
//! when the run ends.

use std::collections::BTreeMap;

/// Tuple counts for one module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModuleCounters {
    /// Tuples that arrived at the module.
    pub received: u64,
    /// Tuples the module finished executing.
    pub processed: u64,
    /// Tuples the module emitted.
    pub sent: u64,
}

#[derive(Debug, Clone, Default)]
pub struct UsageMonitor {
    network_bytes: u64,
    transfers: u64,
    modules: BTreeMap<String, ModuleCounters>,
}

impl UsageMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = UsageMonitor::new();
    }

    /// Record `bytes` put on a link.
    pub fn record_transfer(&mut self, bytes: u64) {
        self.network_bytes += bytes;
        self.transfers += 1;
    }

    /// Total bytes moved over links so far.
    pub fn network_bytes(&self) -> u64 {
        self.network_bytes
    }

    /// Number of link transfers so far.
    pub fn transfers(&self) -> u64 {
        self.transfers
    }

    pub fn tuple_received(&mut self, module: &str) {
        self.counters_mut(module).received += 1;
    }

    pub fn tuple_processed(&mut self, module: &str) {
        self.counters_mut(module).processed += 1;
    }

    pub fn tuple_sent(&mut self, module: &str) {
        self.counters_mut(module).sent += 1;
    }

    /// Counters for `module`, all zero if it never saw a tuple.
    pub fn module(&self, module: &str) -> ModuleCounters {
        self.modules.get(module).copied().unwrap_or_default()
    }

    fn counters_mut(&mut self, module: &str) -> &mut ModuleCounters {
        self.modules.entry(module.to_string()).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfers_accumulate() {
        let mut m = UsageMonitor::new();
        m.record_transfer(100);
        m.record_transfer(250);
        assert_eq!(m.network_bytes(), 350);
        assert_eq!(m.transfers(), 2);
    }

    #[test]
    fn test_module_counters() {
        let mut m = UsageMonitor::new();
        m.tuple_received("filter");
        m.tuple_received("filter");
        m.tuple_processed("filter");
        m.tuple_sent("filter");
        assert_eq!(
            m.module("filter"),
            ModuleCounters { received: 2, processed: 1, sent: 1 }
        );
        assert_eq!(m.module("unknown"), ModuleCounters::default());
    }

    #[test]
    fn test_reset() {
        let mut m = UsageMonitor::new();
        m.record_transfer(1);
        m.tuple_processed("x");
        m.reset();
        assert_eq!(m.network_bytes(), 0);
        assert_eq!(m.module("x").processed, 0);
    }
}
