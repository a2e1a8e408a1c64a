/// Event system for the fog simulation kernel.
///
/// Every effect is modeled as an `Event`: an immutable record placed on
/// the scheduler's priority queue and dispatched in deterministic order.
/// The set of event kinds is closed; each variant carries its own typed
/// payload and names its recipient.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::application::{AppModule, Application};
use crate::device::{ActuatorId, DeviceId, SensorId};
use crate::time::VirtualTime;
use crate::tuple::Tuple;

// ── Event ID ──────────────────────────────────────────────────────────

/// A globally unique, strictly-increasing event identifier.
///
/// Two events scheduled at the same `VirtualTime` are ordered by their
/// `EventId`, which corresponds to creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u64);

impl EventId {
    #[inline]
    pub fn new(raw: u64) -> Self {
        EventId(raw)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E#{}", self.0)
    }
}

// ── Event ID Generator ───────────────────────────────────────────────

/// Deterministic, strictly-increasing event-ID generator.
///
/// Each scheduler owns exactly one of these.
#[derive(Debug, Clone, Default)]
pub struct EventIdGen {
    next: u64,
}

impl EventIdGen {
    pub fn new() -> Self {
        EventIdGen { next: 0 }
    }

    /// Mint the next event ID.
    pub fn next_id(&mut self) -> EventId {
        let id = EventId(self.next);
        self.next += 1;
        id
    }

    /// Peek at the next ID without consuming it.
    pub fn peek(&self) -> EventId {
        EventId(self.next)
    }
}

// ── Recipient ─────────────────────────────────────────────────────────

/// The entity an event is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recipient {
    Orchestrator,
    Device(DeviceId),
    Sensor(SensorId),
    Actuator(ActuatorId),
}

impl std::fmt::Display for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recipient::Orchestrator => write!(f, "orchestrator"),
            Recipient::Device(id) => write!(f, "{}", id),
            Recipient::Sensor(id) => write!(f, "{}", id),
            Recipient::Actuator(id) => write!(f, "{}", id),
        }
    }
}

// ── Event Type ────────────────────────────────────────────────────────

/// The payload of an event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventType {
    // Orchestrator-addressed.

    /// Deferred activation of a submitted application.
    AppLaunch { app_id: String },

    /// Periodic orchestrator resource-management tick. Re-arms itself.
    ControllerTick,

    /// A tuple finished executing somewhere. Reserved: the orchestrator
    /// accepts it and does nothing.
    TupleFinished { tuple: Tuple },

    /// End of run: freeze the engine and assemble the snapshot.
    StopSimulation,

    // Device-addressed.

    /// "Application active": every device learns the full application.
    ActiveAppUpdate { device: DeviceId, app: Arc<Application> },

    /// "Receive application": sent to devices that host a module.
    ReceiveApplication { device: DeviceId, app: Arc<Application> },

    /// "Instantiate module" with the module definition.
    LaunchModule { device: DeviceId, module: AppModule },

    /// "Manage resources now".
    ResourceManagement { device: DeviceId },

    /// A tuple reaches a device.
    TupleArrival { device: DeviceId, tuple: Tuple },

    // Sensor- and actuator-addressed.

    /// A sensor's transmit timer fired.
    SensorTransmit { sensor: SensorId },

    /// A tuple reaches an actuator.
    ActuatorArrival { actuator: ActuatorId, tuple: Tuple },
}

impl EventType {
    /// Who handles this event.
    pub fn recipient(&self) -> Recipient {
        match self {
            EventType::AppLaunch { .. }
            | EventType::ControllerTick
            | EventType::TupleFinished { .. }
            | EventType::StopSimulation => Recipient::Orchestrator,
            EventType::ActiveAppUpdate { device, .. }
            | EventType::ReceiveApplication { device, .. }
            | EventType::LaunchModule { device, .. }
            | EventType::ResourceManagement { device }
            | EventType::TupleArrival { device, .. } => Recipient::Device(*device),
            EventType::SensorTransmit { sensor } => Recipient::Sensor(*sensor),
            EventType::ActuatorArrival { actuator, .. } => Recipient::Actuator(*actuator),
        }
    }

    /// Short, stable name of the event kind.
    pub fn tag(&self) -> &'static str {
        match self {
            EventType::AppLaunch { .. } => "APP_LAUNCH",
            EventType::ControllerTick => "CONTROLLER_TICK",
            EventType::TupleFinished { .. } => "TUPLE_FINISHED",
            EventType::StopSimulation => "STOP_SIMULATION",
            EventType::ActiveAppUpdate { .. } => "ACTIVE_APP_UPDATE",
            EventType::ReceiveApplication { .. } => "RECEIVE_APPLICATION",
            EventType::LaunchModule { .. } => "LAUNCH_MODULE",
            EventType::ResourceManagement { .. } => "RESOURCE_MANAGEMENT",
            EventType::TupleArrival { .. } => "TUPLE_ARRIVAL",
            EventType::SensorTransmit { .. } => "SENSOR_TRANSMIT",
            EventType::ActuatorArrival { .. } => "ACTUATOR_ARRIVAL",
        }
    }

    /// The tuple carried by a tuple-arrival event, if this is one.
    pub fn arriving_tuple(&self) -> Option<&Tuple> {
        match self {
            EventType::TupleArrival { tuple, .. } => Some(tuple),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::AppLaunch { app_id } => write!(f, "AppLaunch({})", app_id),
            EventType::TupleFinished { tuple } => write!(f, "TupleFinished({})", tuple),
            EventType::LaunchModule { device, module } => {
                write!(f, "LaunchModule({} ← {})", device, module.name)
            }
            EventType::ActiveAppUpdate { device, app }
            | EventType::ReceiveApplication { device, app } => {
                write!(f, "{}({} ← {})", self.tag(), device, app.id())
            }
            EventType::TupleArrival { device, tuple } => {
                write!(f, "TupleArrival({} ← {})", device, tuple)
            }
            EventType::ActuatorArrival { actuator, tuple } => {
                write!(f, "ActuatorArrival({} ← {})", actuator, tuple)
            }
            other => write!(f, "{}({})", other.tag(), other.recipient()),
        }
    }
}

// ── Event ─────────────────────────────────────────────────────────────

/// A single simulation event.
///
/// The scheduler orders events by `(scheduled_at, id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Unique identifier (monotonically increasing).
    pub id: EventId,
    /// The virtual time at which this event should be dispatched.
    pub scheduled_at: VirtualTime,
    pub payload: EventType,
}

impl Event {
    pub fn new(id: EventId, scheduled_at: VirtualTime, payload: EventType) -> Self {
        Event {
            id,
            scheduled_at,
            payload,
        }
    }

    pub fn recipient(&self) -> Recipient {
        self.payload.recipient()
    }
}

impl Eq for Event {}

/// Ordering: smallest `(scheduled_at, id)` first.
///
/// `BinaryHeap` is a max-heap, so the natural ordering is reversed here
/// to turn it into a min-heap.
impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .scheduled_at
            .cmp(&self.scheduled_at)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id_monotonic() {
        let mut gen = EventIdGen::new();
        let a = gen.next_id();
        let b = gen.next_id();
        assert_eq!(a.raw(), 0);
        assert_eq!(b.raw(), 1);
        assert_eq!(gen.peek().raw(), 2);
    }

    #[test]
    fn test_event_ordering_by_time() {
        let e1 = Event::new(EventId::new(0), VirtualTime::new(10), EventType::ControllerTick);
        let e2 = Event::new(EventId::new(1), VirtualTime::new(20), EventType::ControllerTick);
        // e1 comes first, so it is "greater" in the reversed ordering.
        assert!(e1 > e2);
    }

    #[test]
    fn test_event_ordering_tiebreak_by_id() {
        let e1 = Event::new(EventId::new(0), VirtualTime::new(10), EventType::StopSimulation);
        let e2 = Event::new(EventId::new(1), VirtualTime::new(10), EventType::ControllerTick);
        assert!(e1 > e2);
    }

    #[test]
    fn test_recipients() {
        assert_eq!(EventType::ControllerTick.recipient(), Recipient::Orchestrator);
        let d = DeviceId::new(4);
        assert_eq!(
            EventType::ResourceManagement { device: d }.recipient(),
            Recipient::Device(d)
        );
        let s = SensorId::new(1);
        assert_eq!(EventType::SensorTransmit { sensor: s }.recipient(), Recipient::Sensor(s));
    }

    #[test]
    fn test_display_uses_tag() {
        let e = EventType::ResourceManagement { device: DeviceId::new(2) };
        assert_eq!(e.to_string(), "RESOURCE_MANAGEMENT(D2)");
        assert_eq!(EventType::StopSimulation.to_string(), "STOP_SIMULATION(orchestrator)");
    }
}
