/// Deterministic event scheduler.
///
/// Uses a `BinaryHeap` with reversed `Ord` on `Event` to act as a
/// min-heap keyed by `(scheduled_at, event_id)`. Event IDs are strictly
/// increasing, so events at the same time dispatch in arrival order.

use std::collections::BinaryHeap;

use crate::event::{Event, EventId, EventIdGen, EventType};
use crate::time::VirtualTime;

/// The global pending-event queue.
///
/// Owns the queue and the ID generator. All scheduling goes through this
/// struct to keep IDs monotonic.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    queue: BinaryHeap<Event>,
    id_gen: EventIdGen,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            queue: BinaryHeap::new(),
            id_gen: EventIdGen::new(),
        }
    }

    /// Schedule a new event at the given virtual time.
    pub fn schedule(&mut self, at: VirtualTime, payload: EventType) -> EventId {
        let id = self.id_gen.next_id();
        self.queue.push(Event::new(id, at, payload));
        id
    }

    /// Pop the next event (earliest time, lowest ID).
    pub fn pop_next(&mut self) -> Option<Event> {
        self.queue.pop()
    }

    /// Iterate over every pending event in unspecified order.
    ///
    /// Inspection only; used for end-of-run accounting where order does
    /// not matter.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.queue.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns the next event ID that will be assigned.
    pub fn next_event_id(&self) -> EventId {
        self.id_gen.peek()
    }

    /// Discard every pending event. IDs keep increasing afterwards.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Drain all events in dispatch order into a `Vec`.
    pub fn drain_ordered(&mut self) -> Vec<Event> {
        let mut events = Vec::with_capacity(self.queue.len());
        while let Some(e) = self.queue.pop() {
            events.push(e);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceId;

    fn app_launch(id: &str) -> EventType {
        EventType::AppLaunch { app_id: id.into() }
    }

    #[test]
    fn test_fifo_at_same_time() {
        let mut sched = Scheduler::new();

        sched.schedule(VirtualTime::new(10), app_launch("first"));
        sched.schedule(VirtualTime::new(10), app_launch("second"));
        sched.schedule(VirtualTime::new(10), app_launch("third"));

        let e1 = sched.pop_next().unwrap();
        let e2 = sched.pop_next().unwrap();
        let e3 = sched.pop_next().unwrap();

        assert!(e1.id < e2.id && e2.id < e3.id);
        assert_eq!(e1.payload, app_launch("first"));
        assert_eq!(e2.payload, app_launch("second"));
        assert_eq!(e3.payload, app_launch("third"));
    }

    #[test]
    fn test_time_ordering() {
        let mut sched = Scheduler::new();

        sched.schedule(VirtualTime::new(30), EventType::StopSimulation);
        sched.schedule(VirtualTime::new(10), EventType::ControllerTick);
        sched.schedule(
            VirtualTime::new(20),
            EventType::ResourceManagement { device: DeviceId::new(1) },
        );

        let times: Vec<u64> = sched
            .drain_ordered()
            .into_iter()
            .map(|e| e.scheduled_at.ticks())
            .collect();
        assert_eq!(times, vec![10, 20, 30]);
    }

    #[test]
    fn test_mixed_ordering() {
        let mut sched = Scheduler::new();
        for t in [50, 10, 10, 30, 10] {
            sched.schedule(VirtualTime::new(t), EventType::ControllerTick);
        }

        let events = sched.drain_ordered();
        for window in events.windows(2) {
            let (a, b) = (&window[0], &window[1]);
            assert!(
                (a.scheduled_at, a.id) <= (b.scheduled_at, b.id),
                "Events out of order: {:?} vs {:?}",
                a,
                b
            );
        }
    }

    #[test]
    fn test_iter_sees_all_pending() {
        let mut sched = Scheduler::new();
        sched.schedule(VirtualTime::new(5), EventType::ControllerTick);
        sched.schedule(VirtualTime::new(1), EventType::StopSimulation);
        assert_eq!(sched.iter().count(), 2);
        assert_eq!(sched.len(), 2);
    }

    #[test]
    fn test_clear_keeps_ids_monotonic() {
        let mut sched = Scheduler::new();
        let a = sched.schedule(VirtualTime::new(1), EventType::ControllerTick);
        sched.clear();
        assert!(sched.is_empty());
        assert!(sched.pop_next().is_none());
        let b = sched.schedule(VirtualTime::new(1), EventType::ControllerTick);
        assert!(b > a);
    }
}
