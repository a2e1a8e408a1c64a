//! Time Tracker: run-scoped timing registry.
//!
//! Maintains two families of incremental means (CPU time per tuple type,
//! end-to-end latency per loop) plus the tuple bookkeeping that feeds
//! them. Means are updated in O(1) per sample with
//! `mean' = (mean·count + x) / (count + 1)` and never recomputed from
//! stored samples, so a given sequence of updates always yields the same
//! bits.
//!
//! The tracker is owned by the [`Simulation`](crate::simulation::Simulation)
//! and lent to handlers through
//! [`SimulationContext::tracker_mut`](crate::simulation::SimulationContext::tracker_mut).
//! Its compound read-modify-write updates are not atomic; it relies on
//! single-threaded dispatch.

use std::collections::BTreeMap;

use tracing::trace;

use crate::application::LoopId;
use crate::time::VirtualTime;
use crate::tuple::Tuple;

// ── RunningAverage ────────────────────────────────────────────────────

/// Count and mean of the samples seen so far.
///
/// There is no empty state: a `RunningAverage` is created from its first
/// sample, so `count >= 1` always holds and the mean is always defined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningAverage {
    count: u64,
    mean: f64,
}

impl RunningAverage {
    pub fn from_sample(sample: f64) -> Self {
        RunningAverage {
            count: 1,
            mean: sample,
        }
    }

    /// Fold one more sample into the mean.
    pub fn push(&mut self, sample: f64) {
        let count = self.count as f64;
        self.mean = (self.mean * count + sample) / (count + 1.0);
        self.count += 1;
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Feed `sample` into `slot`'s average. Returns the new average when
/// there was none yet, for the caller to store.
fn fold(slot: Option<&mut RunningAverage>, sample: f64) -> Option<RunningAverage> {
    match slot {
        Some(avg) => {
            avg.push(sample);
            None
        }
        None => Some(RunningAverage::from_sample(sample)),
    }
}

// ── LoopStats ─────────────────────────────────────────────────────────

/// Per-loop latency state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopStats {
    /// Tuples currently travelling the loop → time they entered it.
    members: BTreeMap<u64, VirtualTime>,
    latency: Option<RunningAverage>,
    qos_success: u64,
}

impl LoopStats {
    /// Latency average, absent until the first completion.
    pub fn latency(&self) -> Option<&RunningAverage> {
        self.latency.as_ref()
    }

    /// Completions whose latency was within the caller's deadline.
    pub fn qos_success(&self) -> u64 {
        self.qos_success
    }

    /// Ids of tuples that entered the loop and have not completed it.
    pub fn members(&self) -> impl Iterator<Item = u64> + '_ {
        self.members.keys().copied()
    }
}

// ── TimeTracker ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TimeTracker {
    next_id: u64,
    cpu_start: BTreeMap<u64, VirtualTime>,
    tuple_types: BTreeMap<String, RunningAverage>,
    loops: BTreeMap<LoopId, LoopStats>,
}

impl TimeTracker {
    pub fn new() -> Self {
        TimeTracker {
            next_id: 1,
            cpu_start: BTreeMap::new(),
            tuple_types: BTreeMap::new(),
            loops: BTreeMap::new(),
        }
    }

    /// Discard all state, as if freshly constructed.
    pub fn reset(&mut self) {
        *self = TimeTracker::new();
    }

    /// Mint a unique id for a tuple.
    pub fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // ── Tuple CPU time ────────────────────────────────────────

    /// Record that `tuple` started executing at `now`.
    ///
    /// Calling this twice for the same tuple keeps the later time.
    pub fn on_execution_start(&mut self, tuple: &Tuple, now: VirtualTime) {
        self.cpu_start.insert(tuple.id, now);
    }

    /// Record that `tuple` finished executing at `now`.
    ///
    /// Without a recorded start this does nothing and returns `None`.
    /// Otherwise the start is consumed, the elapsed time is folded into
    /// the tuple type's average and returned.
    pub fn on_execution_end(&mut self, tuple: &Tuple, now: VirtualTime) -> Option<f64> {
        let Some(start) = self.cpu_start.remove(&tuple.id) else {
            trace!(tuple = tuple.id, "execution end without start; dropped");
            return None;
        };
        let elapsed = now.as_f64() - start.as_f64();
        if let Some(first) = fold(self.tuple_types.get_mut(&tuple.tuple_type), elapsed) {
            self.tuple_types.insert(tuple.tuple_type.clone(), first);
        }
        Some(elapsed)
    }

    /// Number of tuples with a recorded start and no end yet.
    pub fn executions_in_progress(&self) -> usize {
        self.cpu_start.len()
    }

    pub fn tuple_type_stats(&self, tuple_type: &str) -> Option<&RunningAverage> {
        self.tuple_types.get(tuple_type)
    }

    /// Mean CPU time of `tuple_type`; `None` until a sample exists.
    pub fn tuple_type_average(&self, tuple_type: &str) -> Option<f64> {
        self.tuple_types.get(tuple_type).map(RunningAverage::mean)
    }

    /// Every tuple type with at least one sample, sorted by name.
    pub fn tuple_type_averages(&self) -> impl Iterator<Item = (&str, &RunningAverage)> {
        self.tuple_types.iter().map(|(k, v)| (k.as_str(), v))
    }

    // ── Loop latency ──────────────────────────────────────────

    /// Fold one end-to-end latency sample into `loop_id`'s average.
    ///
    /// The QoS counter increases when `elapsed <= deadline`.
    pub fn record_loop_latency(&mut self, loop_id: LoopId, elapsed: f64, deadline: Option<f64>) {
        let stats = self.loops.entry(loop_id).or_default();
        if let Some(first) = fold(stats.latency.as_mut(), elapsed) {
            stats.latency = Some(first);
        }
        if deadline.is_some_and(|d| elapsed <= d) {
            stats.qos_success += 1;
        }
    }

    /// Register `tuple_id` as travelling `loop_id`, entered at `now`.
    ///
    /// A tuple already in the loop keeps its original entry time.
    pub fn mark_loop_start(&mut self, loop_id: LoopId, tuple_id: u64, now: VirtualTime) {
        self.loops
            .entry(loop_id)
            .or_default()
            .members
            .entry(tuple_id)
            .or_insert(now);
    }

    /// Complete `tuple_id`'s trip around `loop_id` at `now`.
    ///
    /// Returns the elapsed latency, or `None` when the tuple never
    /// entered the loop (or already completed it).
    pub fn complete_loop(
        &mut self,
        loop_id: LoopId,
        tuple_id: u64,
        now: VirtualTime,
        deadline: Option<f64>,
    ) -> Option<f64> {
        let start = self.loops.get_mut(&loop_id)?.members.remove(&tuple_id)?;
        let elapsed = now.as_f64() - start.as_f64();
        self.record_loop_latency(loop_id, elapsed, deadline);
        Some(elapsed)
    }

    pub fn loop_stats(&self, loop_id: LoopId) -> Option<&LoopStats> {
        self.loops.get(&loop_id)
    }

    /// Mean latency of `loop_id`; `None` until a loop completes.
    pub fn loop_average(&self, loop_id: LoopId) -> Option<f64> {
        self.loops
            .get(&loop_id)
            .and_then(LoopStats::latency)
            .map(RunningAverage::mean)
    }
}

impl Default for TimeTracker {
    fn default() -> Self {
        Self::new()
    }
}
