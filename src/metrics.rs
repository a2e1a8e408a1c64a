//! End-of-run statistics.
//!
//! A [`MetricsSnapshot`] is built exactly once, when the run terminates,
//! from live simulation state. After construction it is read-only: the
//! fields are crate-private and only accessors are public. Per-entity
//! breakdowns are keyed by human-readable names.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::FogResult;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Module → names of the devices hosting it.
    pub(crate) placement: BTreeMap<String, Vec<String>>,
    /// Wall-clock duration of the run.
    pub(crate) execution_time_ms: u64,
    /// Virtual ticks between start and termination.
    pub(crate) simulation_time: u64,
    pub(crate) latency_per_tuple_type: BTreeMap<String, f64>,
    pub(crate) latency_per_app_loop: BTreeMap<String, f64>,
    pub(crate) loop_qos_success: BTreeMap<String, u64>,
    pub(crate) energy_consumption_per_device: BTreeMap<String, f64>,
    /// Bytes moved over links per tick.
    pub(crate) network_usage: f64,
    pub(crate) tuples_sent_by_sensors: u64,
    pub(crate) tuples_processed_per_module: BTreeMap<String, u64>,
    pub(crate) throughput_per_module: BTreeMap<String, f64>,
    pub(crate) recs_in_per_module: BTreeMap<String, f64>,
    pub(crate) recs_out_per_module: BTreeMap<String, f64>,
    /// Payload bytes still waiting, per addressed module.
    pub(crate) remaining_data_per_module: BTreeMap<String, u64>,
    pub(crate) pending_event_count: usize,
}

impl MetricsSnapshot {
    pub fn placement(&self) -> &BTreeMap<String, Vec<String>> {
        &self.placement
    }

    pub fn execution_time_ms(&self) -> u64 {
        self.execution_time_ms
    }

    pub fn simulation_time(&self) -> u64 {
        self.simulation_time
    }

    /// Average CPU latency per tuple type. Types never executed are absent.
    pub fn latency_per_tuple_type(&self) -> &BTreeMap<String, f64> {
        &self.latency_per_tuple_type
    }

    /// Average latency per loop, keyed by loop name. Loops that never
    /// completed are absent.
    pub fn latency_per_app_loop(&self) -> &BTreeMap<String, f64> {
        &self.latency_per_app_loop
    }

    pub fn loop_qos_success(&self) -> &BTreeMap<String, u64> {
        &self.loop_qos_success
    }

    pub fn energy_consumption_per_device(&self) -> &BTreeMap<String, f64> {
        &self.energy_consumption_per_device
    }

    pub fn network_usage(&self) -> f64 {
        self.network_usage
    }

    pub fn tuples_sent_by_sensors(&self) -> u64 {
        self.tuples_sent_by_sensors
    }

    pub fn tuples_processed_per_module(&self) -> &BTreeMap<String, u64> {
        &self.tuples_processed_per_module
    }

    pub fn throughput_per_module(&self) -> &BTreeMap<String, f64> {
        &self.throughput_per_module
    }

    pub fn recs_in_per_module(&self) -> &BTreeMap<String, f64> {
        &self.recs_in_per_module
    }

    pub fn recs_out_per_module(&self) -> &BTreeMap<String, f64> {
        &self.recs_out_per_module
    }

    /// Unexecuted work per module. Every module of the application has
    /// an entry, zero when nothing is waiting.
    pub fn remaining_data_per_module(&self) -> &BTreeMap<String, u64> {
        &self.remaining_data_per_module
    }

    pub fn pending_event_count(&self) -> usize {
        self.pending_event_count
    }

    pub fn to_json_pretty(&self) -> FogResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_keys_are_camel_case() {
        let mut snapshot = MetricsSnapshot::default();
        snapshot.remaining_data_per_module.insert("filter".into(), 42);
        snapshot.network_usage = 1.5;

        let json: serde_json::Value = serde_json::from_str(&snapshot.to_json_pretty().unwrap()).unwrap();
        assert_eq!(json["remainingDataPerModule"]["filter"], 42);
        assert_eq!(json["networkUsage"], 1.5);
        assert!(json.get("latencyPerAppLoop").is_some());
        assert!(json.get("pendingEventCount").is_some());
        assert!(json.get("remaining_data_per_module").is_none());
    }
}
