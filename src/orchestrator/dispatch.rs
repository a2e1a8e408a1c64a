//! Event routing: the orchestrator as the run's `EventHandler`.

use tracing::{debug, error, info, trace, warn};

use crate::device::{DeviceEvent, DeviceId};
use crate::event::{Event, EventType};
use crate::simulation::{EventHandler, SimulationContext};

use super::Orchestrator;

impl Orchestrator {
    fn deliver(&mut self, ctx: &mut SimulationContext, device: DeviceId, event: DeviceEvent) {
        match self.devices.get_mut(&device) {
            Some(target) => target.on_event(ctx, event),
            None => warn!(device = %device, event = %event, "event for unknown device dropped"),
        }
    }

    /// Freeze the run and build the snapshot from the live queue.
    fn stop(&mut self, ctx: &mut SimulationContext) {
        if self.snapshot.is_some() {
            debug!("duplicate termination ignored");
            return;
        }
        ctx.terminate();
        let snapshot = self.assemble_snapshot(ctx);
        info!(
            time = %ctx.now(),
            pending = snapshot.pending_event_count(),
            "simulation stopped"
        );
        if let Err(e) = self.exporter.export(&snapshot) {
            error!(error = %e, "metrics export failed");
        }
        self.snapshot = Some(snapshot);
    }
}

impl EventHandler for Orchestrator {
    fn handle(&mut self, ctx: &mut SimulationContext, event: &Event) {
        trace!(id = %event.id, time = %ctx.now(), event = %event.payload, "dispatch");
        match &event.payload {
            // ── Orchestrator-addressed ────────────────────────
            EventType::AppLaunch { app_id } => match &self.active {
                Some(active) if active.app.id() == app_id => self.activate(ctx),
                _ => warn!(app = %app_id, "launch for an application that is not held"),
            },
            EventType::ControllerTick => self.manage_resources(ctx),
            EventType::TupleFinished { tuple } => {
                trace!(tuple = %tuple, "tuple finished");
            }
            EventType::StopSimulation => self.stop(ctx),

            // ── Device-addressed ──────────────────────────────
            EventType::ActiveAppUpdate { device, app } => {
                self.deliver(ctx, *device, DeviceEvent::ActiveAppUpdate(app.clone()))
            }
            EventType::ReceiveApplication { device, app } => {
                self.deliver(ctx, *device, DeviceEvent::ReceiveApplication(app.clone()))
            }
            EventType::LaunchModule { device, module } => {
                self.deliver(ctx, *device, DeviceEvent::LaunchModule(module.clone()))
            }
            EventType::ResourceManagement { device } => {
                self.deliver(ctx, *device, DeviceEvent::ResourceManagement)
            }
            EventType::TupleArrival { device, tuple } => {
                self.deliver(ctx, *device, DeviceEvent::TupleArrival(tuple.clone()))
            }

            // ── Sensors and actuators ─────────────────────────
            EventType::SensorTransmit { sensor } => {
                let app = self.active.as_ref().map(|a| a.app.clone());
                match (self.sensors.get_mut(sensor), app) {
                    (Some(s), Some(app)) if s.app_id == app.id() => s.transmit(ctx, &app),
                    (Some(_), _) => debug!(sensor = %sensor, "sensor's application is not active"),
                    (None, _) => warn!(sensor = %sensor, "event for unknown sensor dropped"),
                }
            }
            EventType::ActuatorArrival { actuator, tuple } => {
                let app = self.active.as_ref().map(|a| a.app.clone());
                match self.actuators.get_mut(actuator) {
                    Some(a) => a.receive(ctx, app.as_deref(), tuple),
                    None => warn!(actuator = %actuator, "event for unknown actuator dropped"),
                }
            }
        }
    }
}
