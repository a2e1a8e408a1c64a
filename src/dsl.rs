/// Fluent builder DSL for fog scenarios.
///
/// Hides the boilerplate of registering a topology, resolving a
/// name-based module mapping and wiring relay devices to each other and
/// to actuators. Produces a ready-to-run [`Scenario`].

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use crate::api::Scenario;
use crate::application::Application;
use crate::config::SimulationConfig;
use crate::device::{path_latency, ActuatorId, DeviceId, FogDevice, RelayDevice};
use crate::entities::{Actuator, Sensor};
use crate::error::FogResult;
use crate::export::MetricsExporter;
use crate::orchestrator::Orchestrator;
use crate::placement::{ModuleMapping, Placement};

// ── ScenarioBuilder ───────────────────────────────────────────────────

/// Fluent builder for constructing a [`Scenario`].
///
/// # Example
/// ```rust
/// use fogsim::application::{AppEdge, Application, EdgeKind};
/// use fogsim::device::{DeviceId, RelayDevice, SensorId};
/// use fogsim::dsl::ScenarioBuilder;
/// use fogsim::entities::Sensor;
/// use fogsim::placement::ModuleMapping;
///
/// let mut app = Application::new("demo");
/// app.add_module("count", 10);
/// app.add_edge(AppEdge::new("PING", "count", "PING", EdgeKind::Sensor));
///
/// let mut scenario = ScenarioBuilder::new()
///     .max_simulation_time(200)
///     .relay(RelayDevice::new(DeviceId::new(0), "edge"))
///     .sensor(Sensor::new(SensorId::new(0), "s", "PING", "demo").attached_to(DeviceId::new(0), 1))
///     .application(app.clone(), ModuleMapping::all_on("edge", &app))
///     .build()
///     .unwrap();
/// let snapshot = scenario.run().unwrap();
/// assert!(snapshot.tuples_sent_by_sensors() > 0);
/// ```
pub struct ScenarioBuilder {
    config: SimulationConfig,
    devices: Vec<Box<dyn FogDevice>>,
    relays: Vec<RelayDevice>,
    sensors: Vec<Sensor>,
    actuators: Vec<Actuator>,
    submission: Option<Submission>,
    exporter: Option<Box<dyn MetricsExporter>>,
}

struct Submission {
    app: Application,
    mapping: ModuleMapping,
    delay: u64,
}

/// A connection made on a relay once placement is known.
enum Wire {
    Route { module: String, device: DeviceId, latency: u64 },
    Actuator { actuator: ActuatorId, latency: u64 },
}

impl ScenarioBuilder {
    pub fn new() -> Self {
        ScenarioBuilder {
            config: SimulationConfig::default(),
            devices: Vec::new(),
            relays: Vec::new(),
            sensors: Vec::new(),
            actuators: Vec::new(),
            submission: None,
            exporter: None,
        }
    }

    // ── Configuration ─────────────────────────────────────────

    pub fn config(mut self, config: SimulationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_simulation_time(mut self, ticks: u64) -> Self {
        self.config.max_simulation_time = ticks;
        self
    }

    pub fn resource_manage_interval(mut self, ticks: u64) -> Self {
        self.config.resource_manage_interval = ticks;
        self
    }

    pub fn exporter(mut self, exporter: Box<dyn MetricsExporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    // ── Topology ──────────────────────────────────────────────

    /// Register a custom device. It is not wired automatically.
    pub fn device(mut self, device: Box<dyn FogDevice>) -> Self {
        self.devices.push(device);
        self
    }

    /// Register a relay. Once placement is known it gets a route to
    /// the nearest host of every module it does not host itself, and a
    /// link to every actuator it can reach.
    pub fn relay(mut self, relay: RelayDevice) -> Self {
        self.relays.push(relay);
        self
    }

    pub fn sensor(mut self, sensor: Sensor) -> Self {
        self.sensors.push(sensor);
        self
    }

    pub fn actuator(mut self, actuator: Actuator) -> Self {
        self.actuators.push(actuator);
        self
    }

    // ── Application ───────────────────────────────────────────

    pub fn application(self, app: Application, mapping: ModuleMapping) -> Self {
        self.application_delayed(app, mapping, 0)
    }

    pub fn application_delayed(mut self, app: Application, mapping: ModuleMapping, delay: u64) -> Self {
        self.submission = Some(Submission { app, mapping, delay });
        self
    }

    // ── Build ─────────────────────────────────────────────────

    /// Register everything with a fresh orchestrator and submit the
    /// application.
    pub fn build(self) -> FogResult<Scenario> {
        self.config.validate()?;
        let mut orchestrator = Orchestrator::new(self.config);
        if let Some(exporter) = self.exporter {
            orchestrator = orchestrator.with_exporter(exporter);
        }

        let relay_ids: Vec<DeviceId> = self.relays.iter().map(|r| r.id).collect();
        let actuator_links: Vec<(ActuatorId, DeviceId, u64)> = self
            .actuators
            .iter()
            .map(|a| (a.id, a.gateway, a.latency))
            .collect();

        let mut devices = self.devices;
        devices.extend(
            self.relays
                .into_iter()
                .map(|r| Box::new(r) as Box<dyn FogDevice>),
        );
        orchestrator.register_topology(devices, self.sensors, self.actuators)?;

        if let Some(Submission { app, mapping, delay }) = self.submission {
            let placement = mapping.resolve(orchestrator.devices())?;
            let wires = relay_wiring(orchestrator.devices(), &relay_ids, &placement, &actuator_links);
            orchestrator.submit(app, placement, delay)?;
            for (relay, wire) in wires {
                let Some(device) = orchestrator.device_mut::<RelayDevice>(relay) else {
                    continue;
                };
                match wire {
                    Wire::Route { module, device: target, latency } => {
                        device.route(&module, target, latency)
                    }
                    Wire::Actuator { actuator, latency } => device.attach_actuator(actuator, latency),
                }
            }
        }

        Ok(Scenario::new(orchestrator))
    }
}

impl Default for ScenarioBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn relay_wiring(
    devices: &BTreeMap<DeviceId, Box<dyn FogDevice>>,
    relays: &[DeviceId],
    placement: &Placement,
    actuators: &[(ActuatorId, DeviceId, u64)],
) -> Vec<(DeviceId, Wire)> {
    let placed: BTreeSet<&str> = placement
        .iter()
        .flat_map(|(_, modules)| modules.iter().map(String::as_str))
        .collect();

    let mut wires = Vec::new();
    for &relay in relays {
        let hosted = placement.modules_on(relay);
        for &module in &placed {
            if hosted.iter().any(|h| h == module) {
                continue;
            }
            let nearest = placement
                .devices_for(module)
                .filter_map(|d| path_latency(devices, relay, d).map(|latency| (latency, d)))
                .min();
            match nearest {
                Some((latency, device)) => wires.push((
                    relay,
                    Wire::Route {
                        module: module.to_string(),
                        device,
                        latency,
                    },
                )),
                None => warn!(relay = %relay, module, "no path to any host of module"),
            }
        }
        for &(actuator, gateway, link) in actuators {
            if let Some(latency) = path_latency(devices, relay, gateway) {
                wires.push((relay, Wire::Actuator { actuator, latency: latency + link }));
            }
        }
    }
    wires
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{AppEdge, EdgeKind};
    use crate::device::{RecordingDevice, SensorId};
    use crate::error::FogError;

    fn app() -> Application {
        let mut app = Application::new("wf");
        app.add_module("ingest", 10).add_module("store", 10);
        app.add_edge(AppEdge::new("RAW", "ingest", "RAW", EdgeKind::Sensor).data_size(10))
            .add_edge(AppEdge::new("ingest", "store", "ROW", EdgeKind::Module).data_size(5))
            .add_edge(AppEdge::new("store", "LED", "ACK", EdgeKind::Actuator));
        app
    }

    fn topology() -> ScenarioBuilder {
        let cloud = DeviceId::new(0);
        let gateway = DeviceId::new(1);
        ScenarioBuilder::new()
            .relay(RelayDevice::new(cloud, "cloud"))
            .relay(RelayDevice::new(gateway, "gateway").with_parent(cloud, 50))
            .relay(RelayDevice::new(DeviceId::new(2), "edge").with_parent(gateway, 2))
    }

    #[test]
    fn test_relays_get_routes_to_nearest_host() {
        let mut mapping = ModuleMapping::new();
        mapping.add("edge", "ingest").add("cloud", "store");
        let scenario = topology()
            .actuator(Actuator::new(ActuatorId::new(0), "led", "led").attached_to(DeviceId::new(2), 1))
            .application(app(), mapping)
            .build()
            .unwrap();

        let orch = scenario.orchestrator();
        let edge = orch.device::<RelayDevice>(DeviceId::new(2)).unwrap();
        let route = edge.routes()["store"];
        assert_eq!(route.device, DeviceId::new(0));
        assert_eq!(route.latency, 52);
        assert!(!edge.routes().contains_key("ingest"));

        let gateway = orch.device::<RelayDevice>(DeviceId::new(1)).unwrap();
        assert_eq!(gateway.routes()["ingest"].latency, 2);
        assert_eq!(gateway.routes()["store"].latency, 50);
    }

    #[test]
    fn test_unknown_device_name_fails_build() {
        let mut mapping = ModuleMapping::new();
        mapping.add("nowhere", "ingest").add("cloud", "store");
        let result = topology().application(app(), mapping).build();
        assert!(matches!(result, Err(FogError::DeviceNameNotFound(_))));
    }

    #[test]
    fn test_invalid_config_fails_build() {
        let result = ScenarioBuilder::new().resource_manage_interval(0).build();
        assert!(matches!(result, Err(FogError::InvalidConfig(_))));
    }

    #[test]
    fn test_custom_devices_are_not_wired() {
        let app = app();
        let scenario = ScenarioBuilder::new()
            .device(Box::new(RecordingDevice::new(DeviceId::new(7), "recorder")))
            .sensor(Sensor::new(SensorId::new(0), "s", "RAW", "wf").attached_to(DeviceId::new(7), 1))
            .application(app.clone(), ModuleMapping::all_on("recorder", &app))
            .build()
            .unwrap();
        let recorder = scenario.orchestrator().device::<RecordingDevice>(DeviceId::new(7)).unwrap();
        assert!(recorder.received.is_empty());
        assert_eq!(scenario.orchestrator().placement().unwrap().modules_on(DeviceId::new(7)).len(), 2);
    }
}
