/// Simulation execution loop.
///
/// Drives the scheduler: pops events, advances virtual time, dispatches
/// to a handler. The loop is synchronous and single-threaded. It also
/// owns the run-scoped registries (the [`TimeTracker`] and the
/// [`UsageMonitor`]) and lends them to the handler on every dispatch.
///
/// Termination is one-shot: a handler calls
/// [`SimulationContext::terminate`], finishes whatever it needs to read
/// from the live queue, and when it returns the pending queue is torn
/// down and no further events are admitted.

use tracing::{debug, info};

use crate::event::{Event, EventId, EventType};
use crate::monitor::UsageMonitor;
use crate::scheduler::Scheduler;
use crate::time::VirtualTime;
use crate::tracker::TimeTracker;

// ── Handler trait ─────────────────────────────────────────────────────

/// Reacts to dispatched events.
pub trait EventHandler {
    /// Called for every dispatched event.
    fn handle(&mut self, ctx: &mut SimulationContext, event: &Event);
}

/// A handler backed by a closure.
impl<F> EventHandler for F
where
    F: FnMut(&mut SimulationContext, &Event),
{
    fn handle(&mut self, ctx: &mut SimulationContext, event: &Event) {
        (self)(ctx, event);
    }
}

// ── Simulation Context ───────────────────────────────────────────────

/// Mutable context passed to the handler on every event dispatch.
///
/// Gives the handler the current virtual time, scheduling, read access
/// to the pending queue, and the run-scoped tracker and usage monitor.
pub struct SimulationContext<'a> {
    pub(crate) scheduler: &'a mut Scheduler,
    pub(crate) tracker: &'a mut TimeTracker,
    pub(crate) usage: &'a mut UsageMonitor,
    pub(crate) halted: &'a mut bool,
    pub(crate) now: VirtualTime,
}

impl<'a> SimulationContext<'a> {
    /// Current virtual time.
    #[inline]
    pub fn now(&self) -> VirtualTime {
        self.now
    }

    /// Schedule an event at an absolute virtual time.
    ///
    /// After termination the event is discarded; the returned id is
    /// never dispatched.
    ///
    /// # Panics
    /// Panics if `at` is before the current time (non-causal scheduling).
    pub fn schedule_at(&mut self, at: VirtualTime, payload: EventType) -> EventId {
        assert!(
            at >= self.now,
            "Cannot schedule event in the past: now={}, at={}",
            self.now,
            at
        );
        if *self.halted {
            debug!(event = %payload, "simulation terminated; event not admitted");
            return self.scheduler.next_event_id();
        }
        self.scheduler.schedule(at, payload)
    }

    /// Schedule an event `delay` ticks after now.
    ///
    /// # Panics
    /// Panics on virtual-time overflow.
    pub fn schedule_after(&mut self, delay: u64, payload: EventType) -> EventId {
        let at = self
            .now
            .plus(delay)
            .expect("VirtualTime overflow when scheduling");
        self.schedule_at(at, payload)
    }

    /// Schedule an event at the current time, behind everything already
    /// queued for now.
    pub fn schedule_now(&mut self, payload: EventType) -> EventId {
        self.schedule_at(self.now, payload)
    }

    /// Number of pending events.
    pub fn pending_count(&self) -> usize {
        self.scheduler.len()
    }

    /// Every pending event, in unspecified order.
    pub fn pending_events(&self) -> impl Iterator<Item = &Event> {
        self.scheduler.iter()
    }

    pub fn tracker(&self) -> &TimeTracker {
        self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut TimeTracker {
        self.tracker
    }

    pub fn usage(&self) -> &UsageMonitor {
        self.usage
    }

    pub fn usage_mut(&mut self) -> &mut UsageMonitor {
        self.usage
    }

    /// Stop the run. The pending queue stays readable until the current
    /// handler returns, then it is discarded.
    pub fn terminate(&mut self) {
        *self.halted = true;
    }

    /// Whether [`terminate`](Self::terminate) has been called.
    pub fn is_terminated(&self) -> bool {
        *self.halted
    }
}

// ── Simulation ────────────────────────────────────────────────────────

/// Top-level simulation driver.
///
/// Owns the scheduler, the registries and the current virtual time.
/// Call `run` to execute until termination or an empty queue, or `step`
/// to advance by exactly one event.
#[derive(Debug, Clone, Default)]
pub struct Simulation {
    scheduler: Scheduler,
    tracker: TimeTracker,
    usage: UsageMonitor,
    current_time: VirtualTime,
    events_processed: u64,
    halted: bool,
}

impl Simulation {
    /// Create a new simulation starting at time zero.
    pub fn new() -> Self {
        Simulation {
            scheduler: Scheduler::new(),
            tracker: TimeTracker::new(),
            usage: UsageMonitor::new(),
            current_time: VirtualTime::ZERO,
            events_processed: 0,
            halted: false,
        }
    }

    /// A context at the current time, for seeding events and for
    /// entities that act before the first dispatch.
    pub fn context(&mut self) -> SimulationContext<'_> {
        SimulationContext {
            scheduler: &mut self.scheduler,
            tracker: &mut self.tracker,
            usage: &mut self.usage,
            halted: &mut self.halted,
            now: self.current_time,
        }
    }

    pub fn current_time(&self) -> VirtualTime {
        self.current_time
    }

    /// Total events processed so far.
    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    pub fn pending_count(&self) -> usize {
        self.scheduler.len()
    }

    pub fn tracker(&self) -> &TimeTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut TimeTracker {
        &mut self.tracker
    }

    pub fn usage(&self) -> &UsageMonitor {
        &self.usage
    }

    /// Schedule an event from outside a handler.
    pub fn schedule(&mut self, at: VirtualTime, payload: EventType) -> EventId {
        self.context().schedule_at(at, payload)
    }

    /// Execute a single step: pop one event, advance time, dispatch.
    ///
    /// Returns `None` when the queue is empty or the run has terminated.
    pub fn step(&mut self, handler: &mut dyn EventHandler) -> Option<Event> {
        if self.halted {
            return None;
        }
        let event = self.scheduler.pop_next()?;

        // Virtual time must never go backward.
        assert!(
            event.scheduled_at >= self.current_time,
            "Time went backward! current={}, event={}",
            self.current_time,
            event.scheduled_at
        );
        self.current_time = event.scheduled_at;
        self.events_processed += 1;

        let mut ctx = self.context();
        handler.handle(&mut ctx, &event);

        if self.halted {
            info!(
                time = %self.current_time,
                discarded = self.scheduler.len(),
                "simulation terminated"
            );
            self.scheduler.clear();
        }

        Some(event)
    }

    /// Run until termination or an empty queue.
    ///
    /// Returns the number of events processed during this call.
    pub fn run(&mut self, handler: &mut dyn EventHandler) -> u64 {
        let start = self.events_processed;
        while self.step(handler).is_some() {}
        self.events_processed - start
    }

    /// Run until termination, an empty queue, or `max_steps` events.
    pub fn run_for(&mut self, max_steps: u64, handler: &mut dyn EventHandler) -> u64 {
        let start = self.events_processed;
        let mut steps = 0u64;
        while steps < max_steps {
            if self.step(handler).is_none() {
                break;
            }
            steps += 1;
        }
        self.events_processed - start
    }

    /// `true` once terminated or when no events remain.
    pub fn is_finished(&self) -> bool {
        self.halted || self.scheduler.is_empty()
    }

    /// Whether the run was terminated by a handler.
    pub fn is_terminated(&self) -> bool {
        self.halted
    }

    /// Return to time zero with empty queue and registries, ready for an
    /// independent run.
    pub fn reset(&mut self) {
        *self = Simulation::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceId;

    fn launch(id: &str) -> EventType {
        EventType::AppLaunch { app_id: id.into() }
    }

    fn launched_id(event: &Event) -> Option<String> {
        match &event.payload {
            EventType::AppLaunch { app_id } => Some(app_id.clone()),
            _ => None,
        }
    }

    #[test]
    fn test_basic_execution_loop() {
        let mut sim = Simulation::new();
        sim.schedule(VirtualTime::new(10), launch("a"));
        sim.schedule(VirtualTime::new(20), launch("b"));
        sim.schedule(VirtualTime::new(30), launch("c"));

        let mut log: Vec<String> = Vec::new();
        let processed = sim.run(&mut |_ctx: &mut SimulationContext, event: &Event| {
            log.extend(launched_id(event));
        });

        assert_eq!(processed, 3);
        assert_eq!(log, vec!["a", "b", "c"]);
        assert_eq!(sim.current_time(), VirtualTime::new(30));
    }

    #[test]
    fn test_self_rearming_tick() {
        let mut sim = Simulation::new();
        sim.schedule(VirtualTime::ZERO, EventType::ControllerTick);

        let mut ticks: Vec<u64> = Vec::new();
        sim.run(&mut |ctx: &mut SimulationContext, _event: &Event| {
            ticks.push(ctx.now().ticks());
            if ctx.now().ticks() < 30 {
                ctx.schedule_after(10, EventType::ControllerTick);
            }
        });

        assert_eq!(ticks, vec![0, 10, 20, 30]);
    }

    #[test]
    fn test_time_monotonicity() {
        let mut sim = Simulation::new();
        for t in [100, 50, 75, 10] {
            sim.schedule(VirtualTime::new(t), EventType::ControllerTick);
        }

        let mut times: Vec<u64> = Vec::new();
        sim.run(&mut |ctx: &mut SimulationContext, _event: &Event| {
            times.push(ctx.now().ticks());
        });
        assert_eq!(times, vec![10, 50, 75, 100]);
    }

    #[test]
    fn test_run_for_limits_steps() {
        let mut sim = Simulation::new();
        for i in 0..100 {
            sim.schedule(VirtualTime::new(i), EventType::ControllerTick);
        }
        let mut noop = |_ctx: &mut SimulationContext, _event: &Event| {};
        assert_eq!(sim.run_for(10, &mut noop), 10);
        assert_eq!(sim.events_processed(), 10);
        assert!(!sim.is_finished());
    }

    #[test]
    fn test_terminate_sees_queue_then_tears_it_down() {
        let mut sim = Simulation::new();
        sim.schedule(VirtualTime::new(5), EventType::StopSimulation);
        sim.schedule(VirtualTime::new(6), EventType::ControllerTick);
        sim.schedule(VirtualTime::new(7), EventType::ControllerTick);

        let mut seen_pending = None;
        let processed = sim.run(&mut |ctx: &mut SimulationContext, event: &Event| {
            if event.payload == EventType::StopSimulation {
                ctx.terminate();
                // Still readable inside the terminating handler.
                seen_pending = Some(ctx.pending_count());
                ctx.schedule_after(1, EventType::ControllerTick);
            }
        });

        assert_eq!(processed, 1);
        assert_eq!(seen_pending, Some(2));
        assert!(sim.is_terminated());
        assert!(sim.is_finished());
        assert_eq!(sim.pending_count(), 0);
        assert_eq!(sim.current_time(), VirtualTime::new(5));
    }

    #[test]
    fn test_no_admission_after_termination() {
        let mut sim = Simulation::new();
        sim.schedule(VirtualTime::ZERO, EventType::StopSimulation);
        sim.run(&mut |ctx: &mut SimulationContext, _event: &Event| ctx.terminate());

        sim.schedule(VirtualTime::new(10), EventType::ControllerTick);
        assert_eq!(sim.pending_count(), 0);
        let mut noop = |_ctx: &mut SimulationContext, _event: &Event| {};
        assert!(sim.step(&mut noop).is_none());
    }

    #[test]
    fn test_context_lends_registries() {
        let mut sim = Simulation::new();
        sim.schedule(
            VirtualTime::new(3),
            EventType::ResourceManagement { device: DeviceId::new(0) },
        );
        sim.run(&mut |ctx: &mut SimulationContext, _event: &Event| {
            ctx.tracker_mut().next_id();
            ctx.usage_mut().record_transfer(64);
        });
        assert_eq!(sim.tracker_mut().next_id(), 2);
        assert_eq!(sim.usage().network_bytes(), 64);
    }

    #[test]
    fn test_reset_for_independent_runs() {
        let mut sim = Simulation::new();
        sim.schedule(VirtualTime::new(4), EventType::StopSimulation);
        sim.run(&mut |ctx: &mut SimulationContext, _event: &Event| ctx.terminate());
        sim.reset();
        assert!(!sim.is_terminated());
        assert_eq!(sim.current_time(), VirtualTime::ZERO);
        assert_eq!(sim.tracker_mut().next_id(), 1);
    }

    #[test]
    fn test_default_starts_at_zero() {
        let mut sim = Simulation::default();
        assert_eq!(sim.current_time(), VirtualTime::ZERO);
        assert!(sim.is_finished());
        assert!(!sim.is_terminated());
        assert_eq!(sim.tracker_mut().next_id(), 1);
    }

    #[test]
    fn test_deterministic_replay() {
        fn run_trace() -> Vec<(u64, u64, String)> {
            let mut sim = Simulation::new();
            sim.schedule(VirtualTime::new(5), launch("alpha"));
            sim.schedule(VirtualTime::new(5), launch("beta"));
            sim.schedule(VirtualTime::new(3), launch("gamma"));
            sim.schedule(VirtualTime::new(10), launch("delta"));

            let mut trace = Vec::new();
            sim.run(&mut |ctx: &mut SimulationContext, event: &Event| {
                if let Some(id) = launched_id(event) {
                    trace.push((event.id.raw(), ctx.now().ticks(), id));
                }
            });
            trace
        }

        assert_eq!(run_trace(), run_trace(), "Simulation is not deterministic!");
    }
}
