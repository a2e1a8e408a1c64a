//! `FogDevice` trait and `SimulationContext` extensions for devices.

use std::collections::VecDeque;

use crate::device::{ActuatorId, DeviceId};
use crate::event::{EventId, EventType};
use crate::simulation::SimulationContext;
use crate::tuple::Tuple;

use super::payload::DeviceEvent;
use super::topology::{DeviceLinks, ParentLink};

// ── FogDevice ─────────────────────────────────────────────────────────

/// Trait implemented by every simulated processing device.
///
/// Devices react to [`DeviceEvent`]s via `on_event` and may schedule
/// follow-up events through the provided [`SimulationContext`]. The
/// orchestrator reads the rest of the trait when the run ends.
///
/// # Contract
///
/// Implementations **must**:
/// - Not use global mutable state.
/// - Route all side effects through `ctx`.
/// - Be deterministic for equal inputs.
///
/// # Example
///
/// ```rust
/// use std::collections::VecDeque;
/// use fogsim::device::{DeviceEvent, DeviceId, DeviceLinks, FogDevice};
/// use fogsim::simulation::SimulationContext;
/// use fogsim::tuple::Tuple;
///
/// struct Counter { id: DeviceId, links: DeviceLinks, ticks: u32, queue: VecDeque<Tuple> }
///
/// impl FogDevice for Counter {
///     fn id(&self) -> DeviceId { self.id }
///     fn name(&self) -> &str { "counter" }
///     fn links(&self) -> &DeviceLinks { &self.links }
///     fn links_mut(&mut self) -> &mut DeviceLinks { &mut self.links }
///     fn north_queue(&self) -> &VecDeque<Tuple> { &self.queue }
///     fn south_queue(&self) -> &VecDeque<Tuple> { &self.queue }
///     fn on_event(&mut self, _ctx: &mut SimulationContext, event: DeviceEvent) {
///         if matches!(event, DeviceEvent::ResourceManagement) {
///             self.ticks += 1;
///         }
///     }
///     fn as_any(&self) -> &dyn std::any::Any { self }
///     fn as_any_mut(&mut self) -> &mut dyn std::any::Any { self }
/// }
/// ```
pub trait FogDevice {
    fn id(&self) -> DeviceId;

    /// Human-readable name, used as the key in reports.
    fn name(&self) -> &str;

    /// Parent links and the derived child table.
    fn links(&self) -> &DeviceLinks;
    fn links_mut(&mut self) -> &mut DeviceLinks;

    /// Declared parents with their uplink latencies.
    fn parent_links(&self) -> &[ParentLink] {
        self.links().parents()
    }

    /// Energy consumed so far. The default is a device that reports none.
    fn energy_consumption(&self) -> f64 {
        0.0
    }

    /// Tuples waiting to be executed on this device.
    fn north_queue(&self) -> &VecDeque<Tuple>;

    /// Tuples waiting to leave this device.
    fn south_queue(&self) -> &VecDeque<Tuple>;

    /// React to a dispatched event.
    fn on_event(&mut self, ctx: &mut SimulationContext, event: DeviceEvent);

    /// Downcast support for `Orchestrator::device::<T>()`.
    fn as_any(&self) -> &dyn std::any::Any;
    /// Mutable downcast support.
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

// ── SimulationContext device extensions ───────────────────────────────

/// Extension methods on `SimulationContext` for device-level scheduling.
impl SimulationContext<'_> {
    /// Put `tuple` on a link towards `device`, arriving after `latency`
    /// ticks. The payload size is counted as network usage.
    pub fn send_tuple(&mut self, device: DeviceId, latency: u64, tuple: Tuple) -> EventId {
        self.usage_mut().record_transfer(tuple.size);
        self.schedule_after(latency, EventType::TupleArrival { device, tuple })
    }

    /// Deliver `tuple` to an actuator after `latency` ticks.
    pub fn send_to_actuator(&mut self, actuator: ActuatorId, latency: u64, tuple: Tuple) -> EventId {
        self.usage_mut().record_transfer(tuple.size);
        self.schedule_after(latency, EventType::ActuatorArrival { actuator, tuple })
    }

    /// Ask `device` to manage its resources after `delay` ticks.
    pub fn schedule_resource_management(&mut self, device: DeviceId, delay: u64) -> EventId {
        self.schedule_after(delay, EventType::ResourceManagement { device })
    }
}
