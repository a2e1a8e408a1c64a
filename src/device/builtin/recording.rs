//! `RecordingDevice`: records every event it receives for test assertions.

use std::collections::VecDeque;

use crate::simulation::SimulationContext;
use crate::time::VirtualTime;
use crate::tuple::Tuple;

use crate::device::id::DeviceId;
use crate::device::payload::DeviceEvent;
use crate::device::topology::DeviceLinks;
use crate::device::traits::FogDevice;

/// A device that records every event it receives.
///
/// `RecordingDevice` has no active behavior: it never executes or
/// forwards anything. Its queues and energy reading are set directly,
/// which makes it the natural stand-in when a test needs to control
/// exactly what the orchestrator finds at the end of a run.
#[derive(Debug, Clone)]
pub struct RecordingDevice {
    pub id: DeviceId,
    pub name: String,
    pub links: DeviceLinks,
    /// All events received, in dispatch order.
    pub received: Vec<(VirtualTime, DeviceEvent)>,
    pub north: VecDeque<Tuple>,
    pub south: VecDeque<Tuple>,
    pub energy: f64,
}

impl RecordingDevice {
    pub fn new(id: DeviceId, name: &str) -> Self {
        RecordingDevice {
            id,
            name: name.to_string(),
            links: DeviceLinks::new(),
            received: Vec::new(),
            north: VecDeque::new(),
            south: VecDeque::new(),
            energy: 0.0,
        }
    }

    pub fn with_parent(mut self, parent: DeviceId, latency: u64) -> Self {
        self.links.add_parent(parent, latency);
        self
    }

    /// Number of received events matching `pred`.
    pub fn count(&self, pred: impl Fn(&DeviceEvent) -> bool) -> usize {
        self.received.iter().filter(|(_, e)| pred(e)).count()
    }

    /// Names of launched modules, in launch order.
    pub fn launched_modules(&self) -> Vec<&str> {
        self.received
            .iter()
            .filter_map(|(_, e)| match e {
                DeviceEvent::LaunchModule(m) => Some(m.name.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl FogDevice for RecordingDevice {
    fn id(&self) -> DeviceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn links(&self) -> &DeviceLinks {
        &self.links
    }

    fn links_mut(&mut self) -> &mut DeviceLinks {
        &mut self.links
    }

    fn energy_consumption(&self) -> f64 {
        self.energy
    }

    fn north_queue(&self) -> &VecDeque<Tuple> {
        &self.north
    }

    fn south_queue(&self) -> &VecDeque<Tuple> {
        &self.south
    }

    fn on_event(&mut self, ctx: &mut SimulationContext, event: DeviceEvent) {
        self.received.push((ctx.now(), event));
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
