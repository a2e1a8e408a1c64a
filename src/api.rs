/// Step-by-step driver for a built scenario.
///
/// Pairs the engine with the orchestrator, starts the run on first use
/// and exposes stepping, state inspection and the final snapshot.

use serde::Serialize;

use crate::error::FogResult;
use crate::metrics::MetricsSnapshot;
use crate::orchestrator::Orchestrator;
use crate::simulation::Simulation;

// ── StepResult ────────────────────────────────────────────────────────

/// Result of a single simulation step.
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    /// The event that was dispatched.
    pub event_id: u64,
    /// Virtual time of the event.
    pub time: u64,
    pub description: String,
    /// Total events processed so far.
    pub total_events: u64,
}

// ── Scenario ──────────────────────────────────────────────────────────

pub struct Scenario {
    sim: Simulation,
    orchestrator: Orchestrator,
}

impl Scenario {
    /// Wrap an orchestrator whose topology and application are already
    /// registered. The run starts on the first step.
    pub fn new(orchestrator: Orchestrator) -> Self {
        Scenario {
            sim: Simulation::new(),
            orchestrator,
        }
    }

    /// Start the orchestrator at the current time. A no-op once started.
    pub fn start(&mut self) -> FogResult<()> {
        if self.orchestrator.is_started() {
            return Ok(());
        }
        let mut ctx = self.sim.context();
        self.orchestrator.start(&mut ctx)
    }

    /// Execute a single step. Returns `None` once the run is over.
    pub fn step(&mut self) -> FogResult<Option<StepResult>> {
        self.start()?;
        let Some(event) = self.sim.step(&mut self.orchestrator) else {
            return Ok(None);
        };
        Ok(Some(StepResult {
            event_id: event.id.raw(),
            time: event.scheduled_at.ticks(),
            description: event.payload.to_string(),
            total_events: self.sim.events_processed(),
        }))
    }

    /// Run to termination and return the snapshot.
    pub fn run(&mut self) -> FogResult<&MetricsSnapshot> {
        self.start()?;
        self.sim.run(&mut self.orchestrator);
        self.orchestrator.snapshot()
    }

    /// Run up to `n` steps. Returns number actually processed.
    pub fn run_steps(&mut self, n: u64) -> FogResult<u64> {
        self.start()?;
        Ok(self.sim.run_for(n, &mut self.orchestrator))
    }

    pub fn is_finished(&self) -> bool {
        self.orchestrator.is_started() && self.sim.is_finished()
    }

    pub fn current_time(&self) -> u64 {
        self.sim.current_time().ticks()
    }

    pub fn events_processed(&self) -> u64 {
        self.sim.events_processed()
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut Orchestrator {
        &mut self.orchestrator
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    // ── JSON Export ───────────────────────────────────────────

    /// The current run state as a pretty-printed JSON document.
    pub fn state_json(&self) -> FogResult<String> {
        #[derive(Serialize)]
        struct DeviceState<'a> {
            id: u64,
            name: &'a str,
            north_queue: usize,
            south_queue: usize,
            energy: f64,
        }

        #[derive(Serialize)]
        struct ScenarioState<'a> {
            current_time: u64,
            events_processed: u64,
            pending_events: usize,
            is_finished: bool,
            application: Option<&'a str>,
            devices: Vec<DeviceState<'a>>,
        }

        let devices = self
            .orchestrator
            .devices()
            .values()
            .map(|d| DeviceState {
                id: d.id().raw(),
                name: d.name(),
                north_queue: d.north_queue().len(),
                south_queue: d.south_queue().len(),
                energy: d.energy_consumption(),
            })
            .collect();

        let state = ScenarioState {
            current_time: self.current_time(),
            events_processed: self.events_processed(),
            pending_events: self.sim.pending_count(),
            is_finished: self.is_finished(),
            application: self.orchestrator.application().map(|a| a.id()),
            devices,
        };
        Ok(serde_json::to_string_pretty(&state)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{AppEdge, Application, EdgeKind};
    use crate::device::{ActuatorId, DeviceId, RelayDevice, SensorId};
    use crate::dsl::ScenarioBuilder;
    use crate::entities::{Actuator, Sensor};
    use crate::error::FogError;
    use crate::export::CollectingExporter;
    use crate::placement::ModuleMapping;

    fn pipeline() -> Application {
        let mut app = Application::new("pipeline");
        app.add_module("filter", 10).add_module("aggregate", 10);
        app.add_edge(AppEdge::new("TEMP", "filter", "TEMP", EdgeKind::Sensor).cpu_length(100).data_size(20))
            .add_edge(AppEdge::new("filter", "aggregate", "CLEAN", EdgeKind::Module).cpu_length(200).data_size(8))
            .add_edge(AppEdge::new("aggregate", "FAN", "SET", EdgeKind::Actuator).data_size(1));
        app.add_loop(&["TEMP", "filter", "aggregate", "FAN"]).unwrap();
        app
    }

    fn builder(exporter: &CollectingExporter) -> ScenarioBuilder {
        let cloud = DeviceId::new(0);
        let gateway = DeviceId::new(1);
        let edge = DeviceId::new(2);
        let mut mapping = ModuleMapping::new();
        mapping.add("edge", "filter").add("cloud", "aggregate");

        ScenarioBuilder::new()
            .max_simulation_time(500)
            .resource_manage_interval(50)
            .relay(RelayDevice::new(cloud, "cloud").with_mips(10_000))
            .relay(RelayDevice::new(gateway, "gateway").with_parent(cloud, 20))
            .relay(RelayDevice::new(edge, "edge").with_parent(gateway, 2).with_power(1.0, 0.01))
            .sensor(Sensor::new(SensorId::new(0), "thermo", "TEMP", "pipeline").attached_to(edge, 1))
            .actuator(Actuator::new(ActuatorId::new(0), "fan", "fan").attached_to(edge, 1))
            .application(pipeline(), mapping)
            .exporter(Box::new(exporter.clone()))
    }

    #[test]
    fn test_step_by_step() {
        let mut scenario = builder(&CollectingExporter::new()).build().unwrap();
        assert!(!scenario.is_finished());

        let first = scenario.step().unwrap().unwrap();
        assert_eq!(first.time, 0);
        assert_eq!(first.total_events, 1);

        let second = scenario.step().unwrap().unwrap();
        assert!(second.time >= first.time);
        assert_eq!(scenario.events_processed(), 2);
    }

    #[test]
    fn test_full_pipeline_run() {
        let exporter = CollectingExporter::new();
        let mut scenario = builder(&exporter).build().unwrap();
        let snapshot = scenario.run().unwrap().clone();

        assert_eq!(snapshot.simulation_time(), 500);
        assert!(snapshot.tuples_sent_by_sensors() > 0);
        assert!(snapshot.tuples_processed_per_module()["filter"] > 0);
        assert!(snapshot.tuples_processed_per_module()["aggregate"] > 0);
        assert!(snapshot.latency_per_tuple_type().contains_key("TEMP"));
        assert!(snapshot.latency_per_app_loop()["TEMP->filter->aggregate->FAN"] > 0.0);
        assert!(snapshot.network_usage() > 0.0);
        assert!(snapshot.energy_consumption_per_device()["edge"] > 0.0);
        assert_eq!(snapshot.placement()["aggregate"], vec!["cloud".to_string()]);

        assert!(scenario.is_finished());
        assert_eq!(scenario.current_time(), 500);
        assert_eq!(exporter.len(), 1);
        assert!(scenario.orchestrator().actuator(ActuatorId::new(0)).unwrap().received() > 0);
    }

    #[test]
    fn test_step_after_finish_returns_none() {
        let mut scenario = builder(&CollectingExporter::new()).build().unwrap();
        scenario.run().unwrap();
        assert!(scenario.step().unwrap().is_none());
        assert_eq!(scenario.run_steps(10).unwrap(), 0);
    }

    #[test]
    fn test_snapshot_requires_termination() {
        let mut scenario = builder(&CollectingExporter::new()).build().unwrap();
        scenario.run_steps(5).unwrap();
        assert!(matches!(
            scenario.orchestrator().snapshot(),
            Err(FogError::NotTerminated)
        ));
    }

    #[test]
    fn test_state_json() {
        let mut scenario = builder(&CollectingExporter::new()).build().unwrap();
        scenario.run_steps(3).unwrap();
        let json: serde_json::Value = serde_json::from_str(&scenario.state_json().unwrap()).unwrap();
        assert_eq!(json["events_processed"], 3);
        assert_eq!(json["application"], "pipeline");
        assert_eq!(json["devices"].as_array().unwrap().len(), 3);
        assert_eq!(json["devices"][2]["name"], "edge");
    }
}
