//! End-of-run snapshot assembly.
//!
//! Runs inside the terminating handler, while the pending queue is
//! still intact.

use std::collections::BTreeMap;

use tracing::debug;

use crate::application::Application;
use crate::device::{DeviceId, FogDevice};
use crate::event::Event;
use crate::metrics::MetricsSnapshot;
use crate::simulation::SimulationContext;
use crate::tuple::Tuple;

use super::Orchestrator;

/// Payload bytes still waiting, per module of `app`.
///
/// Every module starts at zero. Three sources add to it: tuple arrivals
/// still in the pending queue (sensor tuples excluded), and every
/// device's north and south queues. A tuple counts toward the module it
/// is addressed to, once per source it appears in. Tuples addressed to a
/// name that is not a module of `app` are skipped.
pub fn backlog_report<'a>(
    app: &Application,
    pending: impl Iterator<Item = &'a Event>,
    devices: &BTreeMap<DeviceId, Box<dyn FogDevice>>,
) -> BTreeMap<String, u64> {
    let mut report: BTreeMap<String, u64> =
        app.module_names().map(|m| (m.to_string(), 0)).collect();

    let mut add = |tuple: &Tuple, source: &str| match report.get_mut(&tuple.dest_module) {
        Some(total) => *total += tuple.size,
        None => debug!(tuple = %tuple, source, "backlog tuple for unknown module skipped"),
    };

    for tuple in pending
        .filter_map(|e| e.payload.arriving_tuple())
        .filter(|t| !t.is_from_sensor())
    {
        add(tuple, "pending");
    }
    for device in devices.values() {
        for tuple in device.north_queue() {
            add(tuple, "north");
        }
        for tuple in device.south_queue() {
            add(tuple, "south");
        }
    }
    report
}

/// `count / elapsed`, or zero when no time has passed.
fn rate(count: u64, elapsed: u64) -> f64 {
    if elapsed == 0 {
        0.0
    } else {
        count as f64 / elapsed as f64
    }
}

impl Orchestrator {
    pub(super) fn assemble_snapshot(&self, ctx: &SimulationContext) -> MetricsSnapshot {
        let now = ctx.now();
        let elapsed = self
            .started_at
            .and_then(|start| now.duration_since(start))
            .unwrap_or(now.ticks());
        let tracker = ctx.tracker();
        let usage = ctx.usage();

        let mut snapshot = MetricsSnapshot {
            execution_time_ms: self
                .wall_clock
                .map(|t| t.elapsed().as_millis() as u64)
                .unwrap_or(0),
            simulation_time: elapsed,
            network_usage: rate(usage.network_bytes(), elapsed),
            tuples_sent_by_sensors: self.sensors.values().map(|s| s.tuples_sent()).sum(),
            pending_event_count: ctx.pending_count(),
            ..MetricsSnapshot::default()
        };

        snapshot.latency_per_tuple_type = tracker
            .tuple_type_averages()
            .map(|(ty, avg)| (ty.to_string(), avg.mean()))
            .collect();
        snapshot.energy_consumption_per_device = self
            .devices
            .values()
            .map(|d| (d.name().to_string(), d.energy_consumption()))
            .collect();

        let Some(active) = &self.active else {
            return snapshot;
        };
        let app = active.app.as_ref();

        for (device, modules) in active.placement.iter() {
            let Some(name) = self.devices.get(&device).map(|d| d.name().to_string()) else {
                continue;
            };
            for module in modules {
                snapshot
                    .placement
                    .entry(module.clone())
                    .or_default()
                    .push(name.clone());
            }
        }

        for app_loop in app.loops() {
            let name = app_loop.name();
            if let Some(mean) = tracker.loop_average(app_loop.id) {
                snapshot.latency_per_app_loop.insert(name.clone(), mean);
            }
            let qos = tracker.loop_stats(app_loop.id).map_or(0, |s| s.qos_success());
            snapshot.loop_qos_success.insert(name, qos);
        }

        for module in app.module_names() {
            let counters = usage.module(module);
            let key = module.to_string();
            snapshot.tuples_processed_per_module.insert(key.clone(), counters.processed);
            snapshot
                .throughput_per_module
                .insert(key.clone(), rate(counters.processed, elapsed));
            snapshot
                .recs_in_per_module
                .insert(key.clone(), rate(counters.received, elapsed));
            snapshot
                .recs_out_per_module
                .insert(key, rate(counters.sent, elapsed));
        }

        snapshot.remaining_data_per_module =
            backlog_report(app, ctx.pending_events(), &self.devices);
        snapshot
    }
}
