//! The simulation orchestrator.
//!
//! Owns the device topology, sensors and actuators, holds the one active
//! application with its placement, drives the run lifecycle and builds
//! the end-of-run [`MetricsSnapshot`].
//!
//! # Lifecycle
//!
//! 1. [`register_topology`](Orchestrator::register_topology) derives the
//!    child tables.
//! 2. [`submit`](Orchestrator::submit) validates and stores the
//!    application, recording actuator subscriptions.
//! 3. [`start`](Orchestrator::start) activates the application (now or
//!    after its delay), arms the control tick and the termination timer,
//!    and starts every device's resource management.
//! 4. The orchestrator is the [`EventHandler`](crate::simulation::EventHandler)
//!    of the run. On termination it assembles the snapshot and hands it
//!    to the exporter.
//!
//! | Sub-module | Contents |
//! |---|---|
//! | `dispatch` | `EventHandler` impl, event routing |
//! | `snapshot` | snapshot assembly, backlog report |

mod dispatch;
mod snapshot;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::application::{Application, EdgeKind, GeoCoverage};
use crate::config::SimulationConfig;
use crate::device::{connect_with_latencies, ActuatorId, DeviceId, FogDevice, SensorId};
use crate::entities::{Actuator, Sensor};
use crate::error::{FogError, FogResult};
use crate::event::EventType;
use crate::export::{MetricsExporter, NoopExporter};
use crate::metrics::MetricsSnapshot;
use crate::placement::Placement;
use crate::simulation::SimulationContext;
use crate::time::VirtualTime;

pub use snapshot::backlog_report;

/// The submitted application, its placement and launch delay.
#[derive(Debug, Clone)]
pub struct ActiveApplication {
    pub app: Arc<Application>,
    pub placement: Placement,
    pub delay: u64,
}

pub struct Orchestrator {
    config: SimulationConfig,
    devices: BTreeMap<DeviceId, Box<dyn FogDevice>>,
    sensors: BTreeMap<SensorId, Sensor>,
    actuators: BTreeMap<ActuatorId, Actuator>,
    exporter: Box<dyn MetricsExporter>,
    active: Option<ActiveApplication>,
    geo_coverage: BTreeMap<String, GeoCoverage>,
    started_at: Option<VirtualTime>,
    wall_clock: Option<Instant>,
    control_ticks: u64,
    snapshot: Option<MetricsSnapshot>,
}

impl Orchestrator {
    pub fn new(config: SimulationConfig) -> Self {
        Orchestrator {
            config,
            devices: BTreeMap::new(),
            sensors: BTreeMap::new(),
            actuators: BTreeMap::new(),
            exporter: Box::new(NoopExporter),
            active: None,
            geo_coverage: BTreeMap::new(),
            started_at: None,
            wall_clock: None,
            control_ticks: 0,
            snapshot: None,
        }
    }

    pub fn with_exporter(mut self, exporter: Box<dyn MetricsExporter>) -> Self {
        self.exporter = exporter;
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    // ── Topology ──────────────────────────────────────────────

    /// Register devices, sensors and actuators, then derive every
    /// device's child table from the declared parent links.
    ///
    /// Links to unknown parents are dropped with a warning. Fails on a
    /// duplicate device id.
    pub fn register_topology(
        &mut self,
        devices: Vec<Box<dyn FogDevice>>,
        sensors: Vec<Sensor>,
        actuators: Vec<Actuator>,
    ) -> FogResult<()> {
        for device in devices {
            let id = device.id();
            if self.devices.contains_key(&id) {
                return Err(FogError::DeviceAlreadyRegistered(id));
            }
            self.devices.insert(id, device);
        }
        connect_with_latencies(&mut self.devices);

        for sensor in sensors {
            self.sensors.insert(sensor.id, sensor);
        }
        for actuator in actuators {
            self.actuators.insert(actuator.id, actuator);
        }
        info!(
            devices = self.devices.len(),
            sensors = self.sensors.len(),
            actuators = self.actuators.len(),
            "topology registered"
        );
        Ok(())
    }

    // ── Submission ────────────────────────────────────────────

    /// Submit `app` with its placement, activated `delay` ticks after
    /// [`start`](Self::start).
    ///
    /// Resubmitting the held application replaces it. Actuators whose
    /// type matches an ACTUATOR edge's destination (ignoring case) are
    /// subscribed to the edge's source module.
    pub fn submit(&mut self, mut app: Application, placement: Placement, delay: u64) -> FogResult<()> {
        if self.started_at.is_some() {
            return Err(FogError::AlreadyStarted {
                app_id: app.id().to_string(),
            });
        }
        if let Some(active) = &self.active {
            if active.app.id() != app.id() {
                return Err(FogError::ApplicationAlreadyActive {
                    active: active.app.id().to_string(),
                    submitted: app.id().to_string(),
                });
            }
        }
        placement.validate(&app)?;
        if let Some((device, _)) = placement.iter().find(|(d, _)| !self.devices.contains_key(d)) {
            return Err(FogError::DeviceNotFound(device));
        }

        if let Some(coverage) = app.geo_coverage() {
            self.geo_coverage.insert(app.id().to_string(), coverage);
        }
        self.subscribe_actuators(&mut app);

        info!(app = %app.id(), delay, "application submitted");
        self.active = Some(ActiveApplication {
            app: Arc::new(app),
            placement,
            delay,
        });
        Ok(())
    }

    /// [`submit`](Self::submit) with no launch delay.
    pub fn submit_now(&mut self, app: Application, placement: Placement) -> FogResult<()> {
        self.submit(app, placement, 0)
    }

    fn subscribe_actuators(&self, app: &mut Application) {
        let edges: Vec<(String, String, String)> = app
            .edges()
            .iter()
            .filter(|e| e.kind == EdgeKind::Actuator)
            .map(|e| (e.source.clone(), e.destination.clone(), e.tuple_type.clone()))
            .collect();

        for (source, destination, tuple_type) in edges {
            let matching: Vec<ActuatorId> = self
                .actuators
                .values()
                .filter(|a| a.matches(&destination))
                .map(|a| a.id)
                .collect();
            if matching.is_empty() {
                warn!(app = %app.id(), actuator_type = %destination, "no actuator matches edge");
                continue;
            }
            if !app.has_module(&source) {
                warn!(app = %app.id(), module = %source, "actuator edge from unknown module");
                continue;
            }
            if let Some(module) = app.module_mut(&source) {
                for actuator in matching {
                    module.subscribe_actuator(actuator, &tuple_type);
                }
            }
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Begin the run at `ctx.now()`.
    ///
    /// Fails on an invalid configuration, or when the launch delay, the
    /// tick interval or the run length cannot be reached from now.
    pub fn start(&mut self, ctx: &mut SimulationContext) -> FogResult<()> {
        if self.started_at.is_some() {
            return Err(FogError::StartedTwice);
        }
        self.config.validate()?;
        let now = ctx.now();
        let launch_delay = self.active.as_ref().map_or(0, |a| a.delay);
        for delay in [
            launch_delay,
            self.config.resource_manage_interval,
            self.config.max_simulation_time,
        ] {
            if now.plus(delay).is_none() {
                return Err(FogError::TimeOverflow { now, delay });
            }
        }
        self.started_at = Some(now);
        self.wall_clock = Some(Instant::now());

        let launch = self.active.as_ref().map(|a| (a.delay, a.app.id().to_string()));
        match launch {
            Some((0, _)) => self.activate(ctx),
            Some((delay, app_id)) => {
                ctx.schedule_after(delay, EventType::AppLaunch { app_id });
            }
            None => warn!("starting with no application"),
        }

        ctx.schedule_after(self.config.resource_manage_interval, EventType::ControllerTick);
        ctx.schedule_after(self.config.max_simulation_time, EventType::StopSimulation);
        for device in self.devices.keys() {
            ctx.schedule_resource_management(*device, 0);
        }
        info!(time = %ctx.now(), max_time = self.config.max_simulation_time, "simulation started");
        Ok(())
    }

    /// Tell every device about the application, then hand each placed
    /// module to its device. The application's sensors start emitting.
    fn activate(&self, ctx: &mut SimulationContext) {
        let Some(active) = &self.active else {
            return;
        };
        let app = active.app.clone();

        for device in self.devices.keys() {
            ctx.schedule_now(EventType::ActiveAppUpdate {
                device: *device,
                app: app.clone(),
            });
        }
        for (device, modules) in active.placement.iter() {
            for name in modules {
                let Some(module) = app.module(name) else {
                    continue;
                };
                ctx.schedule_now(EventType::ReceiveApplication {
                    device,
                    app: app.clone(),
                });
                ctx.schedule_now(EventType::LaunchModule {
                    device,
                    module: module.clone(),
                });
            }
        }
        for sensor in self.sensors.values().filter(|s| s.app_id == app.id()) {
            sensor.start(ctx);
        }
        info!(app = %app.id(), time = %ctx.now(), "application activated");
    }

    fn manage_resources(&mut self, ctx: &mut SimulationContext) {
        self.control_ticks += 1;
        debug!(time = %ctx.now(), tick = self.control_ticks, "control tick");
        match ctx.now().plus(self.config.resource_manage_interval) {
            Some(at) => {
                ctx.schedule_at(at, EventType::ControllerTick);
            }
            None => debug!("next control tick is past the end of virtual time"),
        }
    }

    // ── Inspection ────────────────────────────────────────────

    /// The end-of-run snapshot. Fails until the run has terminated.
    pub fn snapshot(&self) -> FogResult<&MetricsSnapshot> {
        self.snapshot.as_ref().ok_or(FogError::NotTerminated)
    }

    pub fn application(&self) -> Option<&Application> {
        self.active.as_ref().map(|a| a.app.as_ref())
    }

    pub fn placement(&self) -> Option<&Placement> {
        self.active.as_ref().map(|a| &a.placement)
    }

    pub fn geo_coverage(&self, app_id: &str) -> Option<GeoCoverage> {
        self.geo_coverage.get(app_id).copied()
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    /// Number of control ticks handled.
    pub fn control_ticks(&self) -> u64 {
        self.control_ticks
    }

    /// Downcast a device reference for inspection.
    ///
    /// Returns `None` if the device is not registered or has a wrong type.
    pub fn device<T: FogDevice + 'static>(&self, id: DeviceId) -> Option<&T> {
        self.devices.get(&id)?.as_any().downcast_ref::<T>()
    }

    /// Downcast a mutable device reference.
    pub fn device_mut<T: FogDevice + 'static>(&mut self, id: DeviceId) -> Option<&mut T> {
        self.devices.get_mut(&id)?.as_any_mut().downcast_mut::<T>()
    }

    pub fn devices(&self) -> &BTreeMap<DeviceId, Box<dyn FogDevice>> {
        &self.devices
    }

    pub fn sensor(&self, id: SensorId) -> Option<&Sensor> {
        self.sensors.get(&id)
    }

    pub fn actuator(&self, id: ActuatorId) -> Option<&Actuator> {
        self.actuators.get(&id)
    }
}
