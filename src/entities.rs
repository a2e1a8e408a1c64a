//! Sensors and actuators: the edges of the dataflow.
//!
//! A sensor periodically emits tuples of one type into a gateway device.
//! An actuator receives tuples of its declared type. Both are owned by
//! the orchestrator, which routes their events to them.

use tracing::{debug, warn};

use crate::application::Application;
use crate::device::{ActuatorId, DeviceId, SensorId};
use crate::event::EventType;
use crate::simulation::SimulationContext;
use crate::tuple::Tuple;

// ── Sensor ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Sensor {
    pub id: SensorId,
    pub name: String,
    /// Application this sensor feeds.
    pub app_id: String,
    /// Emitted tuple type; the source of a SENSOR edge.
    pub tuple_type: String,
    pub gateway: DeviceId,
    /// Link latency to the gateway, in ticks.
    pub latency: u64,
    /// Ticks between emissions.
    pub interval: u64,
    tuples_sent: u64,
}

impl Sensor {
    pub fn new(id: SensorId, name: &str, tuple_type: &str, app_id: &str) -> Self {
        Sensor {
            id,
            name: name.to_string(),
            app_id: app_id.to_string(),
            tuple_type: tuple_type.to_string(),
            gateway: DeviceId::new(0),
            latency: 1,
            interval: 5,
            tuples_sent: 0,
        }
    }

    pub fn attached_to(mut self, gateway: DeviceId, latency: u64) -> Self {
        self.gateway = gateway;
        self.latency = latency;
        self
    }

    pub fn every(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Total tuples emitted.
    pub fn tuples_sent(&self) -> u64 {
        self.tuples_sent
    }

    /// Arm the first emission, one interval from now.
    pub fn start(&self, ctx: &mut SimulationContext) {
        ctx.schedule_after(self.interval, EventType::SensorTransmit { sensor: self.id });
    }

    /// Emit one tuple towards the gateway and re-arm.
    ///
    /// A sensor whose type feeds no edge of `app` stops transmitting.
    pub fn transmit(&mut self, ctx: &mut SimulationContext, app: &Application) {
        let Some(edge) = app.sensor_edge(&self.tuple_type) else {
            warn!(sensor = %self.id, tuple_type = %self.tuple_type, "no sensor edge; sensor stops");
            return;
        };
        let now = ctx.now();
        let id = ctx.tracker_mut().next_id();
        let tuple = Tuple::from_sensor(id, app.id(), edge);
        for app_loop in app.loops().iter().filter(|l| l.starts_with(&self.tuple_type)) {
            ctx.tracker_mut().mark_loop_start(app_loop.id, id, now);
        }
        self.tuples_sent += 1;
        ctx.send_tuple(self.gateway, self.latency, tuple);
        ctx.schedule_after(self.interval, EventType::SensorTransmit { sensor: self.id });
    }
}

// ── Actuator ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Actuator {
    pub id: ActuatorId,
    pub name: String,
    /// Declared type, matched case-insensitively against ACTUATOR edges.
    pub actuator_type: String,
    pub gateway: DeviceId,
    pub latency: u64,
    received: u64,
}

impl Actuator {
    pub fn new(id: ActuatorId, name: &str, actuator_type: &str) -> Self {
        Actuator {
            id,
            name: name.to_string(),
            actuator_type: actuator_type.to_string(),
            gateway: DeviceId::new(0),
            latency: 1,
            received: 0,
        }
    }

    pub fn attached_to(mut self, gateway: DeviceId, latency: u64) -> Self {
        self.gateway = gateway;
        self.latency = latency;
        self
    }

    /// Whether this actuator serves edges ending at `destination`.
    pub fn matches(&self, destination: &str) -> bool {
        self.actuator_type.eq_ignore_ascii_case(destination)
    }

    /// Tuples received so far.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Take delivery of `tuple`, closing any loop that ends at this
    /// actuator's type.
    pub fn receive(&mut self, ctx: &mut SimulationContext, app: Option<&Application>, tuple: &Tuple) {
        self.received += 1;
        debug!(actuator = %self.id, tuple = %tuple, "tuple delivered");
        let Some(app) = app else {
            return;
        };
        let now = ctx.now();
        for app_loop in app.loops() {
            if app_loop.members.last().is_some_and(|m| self.matches(m)) {
                ctx.tracker_mut()
                    .complete_loop(app_loop.id, tuple.root_id, now, app_loop.deadline);
            }
        }
    }
}
