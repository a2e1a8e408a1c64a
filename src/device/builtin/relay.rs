//! `RelayDevice`: hosts modules, executes tuples and forwards results.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::application::{AppModule, Application, EdgeKind};
use crate::simulation::SimulationContext;
use crate::time::VirtualTime;
use crate::tuple::Tuple;

use crate::device::id::{ActuatorId, DeviceId};
use crate::device::payload::DeviceEvent;
use crate::device::topology::DeviceLinks;
use crate::device::traits::FogDevice;

/// Where tuples for a module hosted elsewhere are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub device: DeviceId,
    pub latency: u64,
}

/// A processing device with a simple tick-driven execution model.
///
/// Tuples addressed to a hosted module wait in the north queue. On every
/// resource-management tick the device executes as much of the queue as
/// its `mips × interval` budget allows (always at least one tuple), then
/// emits the results along the application's edges. Results for locally
/// hosted modules join the queue and run on a later tick. Tuples for
/// modules it does not host are forwarded along a configured [`Route`];
/// with no route they stay in the south queue.
#[derive(Debug, Clone)]
pub struct RelayDevice {
    pub id: DeviceId,
    pub name: String,
    pub links: DeviceLinks,
    /// Cpu length executed per tick.
    pub mips: u64,
    /// Ticks between resource-management rounds.
    pub interval: u64,
    /// Energy per idle tick.
    pub idle_power: f64,
    /// Energy per unit of executed cpu length.
    pub busy_power: f64,
    app: Option<Arc<Application>>,
    hosted: BTreeMap<String, AppModule>,
    routes: BTreeMap<String, Route>,
    actuators: BTreeMap<ActuatorId, u64>,
    north: VecDeque<Tuple>,
    south: VecDeque<Tuple>,
    energy: f64,
    next_tick: Option<VirtualTime>,
    last_managed: VirtualTime,
    executed: u64,
}

impl RelayDevice {
    pub fn new(id: DeviceId, name: &str) -> Self {
        RelayDevice {
            id,
            name: name.to_string(),
            links: DeviceLinks::new(),
            mips: 1000,
            interval: 10,
            idle_power: 0.0,
            busy_power: 0.0,
            app: None,
            hosted: BTreeMap::new(),
            routes: BTreeMap::new(),
            actuators: BTreeMap::new(),
            north: VecDeque::new(),
            south: VecDeque::new(),
            energy: 0.0,
            next_tick: None,
            last_managed: VirtualTime::ZERO,
            executed: 0,
        }
    }

    pub fn with_parent(mut self, parent: DeviceId, latency: u64) -> Self {
        self.links.add_parent(parent, latency);
        self
    }

    pub fn with_mips(mut self, mips: u64) -> Self {
        self.mips = mips;
        self
    }

    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    pub fn with_power(mut self, idle: f64, busy: f64) -> Self {
        self.idle_power = idle;
        self.busy_power = busy;
        self
    }

    /// Send tuples addressed to `module` to `device`.
    pub fn route(&mut self, module: &str, device: DeviceId, latency: u64) {
        self.routes.insert(module.to_string(), Route { device, latency });
    }

    pub fn routes(&self) -> &BTreeMap<String, Route> {
        &self.routes
    }

    /// Reach `actuator` over a link of `latency` ticks.
    pub fn attach_actuator(&mut self, actuator: ActuatorId, latency: u64) {
        self.actuators.insert(actuator, latency);
    }

    pub fn hosts(&self, module: &str) -> bool {
        self.hosted.contains_key(module)
    }

    pub fn application(&self) -> Option<&Arc<Application>> {
        self.app.as_ref()
    }

    /// Tuples executed so far.
    pub fn executed(&self) -> u64 {
        self.executed
    }

    // ── Event handling ────────────────────────────────────────

    fn accept(&mut self, ctx: &mut SimulationContext, tuple: Tuple) {
        if self.hosts(&tuple.dest_module) {
            let now = ctx.now();
            ctx.usage_mut().tuple_received(&tuple.dest_module);
            ctx.tracker_mut().on_execution_start(&tuple, now);
            self.north.push_back(tuple);
            return;
        }
        match self.routes.get(&tuple.dest_module) {
            Some(route) => {
                trace!(device = %self.id, to = %route.device, tuple = %tuple, "forwarding");
                ctx.send_tuple(route.device, route.latency, tuple);
            }
            None => {
                debug!(device = %self.id, tuple = %tuple, "no route; tuple parked south");
                self.south.push_back(tuple);
            }
        }
    }

    fn manage(&mut self, ctx: &mut SimulationContext) {
        let now = ctx.now();
        if self.next_tick.map_or(true, |at| at <= now) {
            ctx.schedule_resource_management(self.id, self.interval);
            self.next_tick = now.plus(self.interval);
        }
        let idle = now.duration_since(self.last_managed).unwrap_or(0);
        self.energy += self.idle_power * idle as f64;
        self.last_managed = now;

        // Tuples derived during this round wait for the next tick.
        let queued = self.north.len();
        let mut budget = self.mips.saturating_mul(self.interval);
        let mut first = true;
        for _ in 0..queued {
            let Some(tuple) = self.north.pop_front() else {
                break;
            };
            if !first && tuple.cpu_length > budget {
                self.north.push_front(tuple);
                break;
            }
            first = false;
            budget = budget.saturating_sub(tuple.cpu_length);
            self.execute(ctx, tuple);
        }
    }

    fn execute(&mut self, ctx: &mut SimulationContext, tuple: Tuple) {
        let now = ctx.now();
        let module = tuple.dest_module.clone();
        ctx.tracker_mut().on_execution_end(&tuple, now);
        ctx.usage_mut().tuple_processed(&module);
        self.energy += self.busy_power * tuple.cpu_length as f64;
        self.executed += 1;

        let Some(app) = self.app.clone() else {
            warn!(device = %self.id, module = %module, "executed a tuple with no application");
            return;
        };

        for app_loop in app.loops() {
            if app_loop.ends_with(&module) {
                ctx.tracker_mut()
                    .complete_loop(app_loop.id, tuple.root_id, now, app_loop.deadline);
            }
            if app_loop.starts_with(&module) {
                ctx.tracker_mut().mark_loop_start(app_loop.id, tuple.root_id, now);
            }
        }

        for edge in app.edges_from(&module) {
            match edge.kind {
                EdgeKind::Module => {
                    let id = ctx.tracker_mut().next_id();
                    ctx.usage_mut().tuple_sent(&module);
                    self.accept(ctx, Tuple::derived(id, &tuple, edge));
                }
                EdgeKind::Actuator => {
                    let targets: Vec<ActuatorId> = self
                        .hosted
                        .get(&module)
                        .map(|m| {
                            m.actuator_subscriptions()
                                .iter()
                                .filter(|s| s.tuple_type == edge.tuple_type)
                                .map(|s| s.actuator)
                                .collect()
                        })
                        .unwrap_or_default();
                    for actuator in targets {
                        let id = ctx.tracker_mut().next_id();
                        ctx.usage_mut().tuple_sent(&module);
                        let latency = self.actuators.get(&actuator).copied().unwrap_or(0);
                        ctx.send_to_actuator(actuator, latency, Tuple::derived(id, &tuple, edge));
                    }
                }
                EdgeKind::Sensor => {}
            }
        }
    }
}

impl FogDevice for RelayDevice {
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
        match event {
            DeviceEvent::ActiveAppUpdate(app) | DeviceEvent::ReceiveApplication(app) => {
                self.app = Some(app);
            }
            DeviceEvent::LaunchModule(module) => {
                debug!(device = %self.id, module = %module.name, "module launched");
                self.hosted.insert(module.name.clone(), module);
            }
            DeviceEvent::ResourceManagement => self.manage(ctx),
            DeviceEvent::TupleArrival(tuple) => self.accept(ctx, tuple),
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::AppEdge;
    use crate::event::{Event, EventType};
    use crate::simulation::Simulation;

    fn pipeline() -> Arc<Application> {
        let mut app = Application::new("pipe");
        app.add_module("filter", 100).add_module("sink", 100);
        app.add_edge(AppEdge::new("reading", "filter", "RAW", EdgeKind::Sensor).cpu_length(50).data_size(10));
        app.add_edge(AppEdge::new("filter", "sink", "CLEAN", EdgeKind::Module).cpu_length(20).data_size(4));
        Arc::new(app)
    }

    /// Feed device-addressed events to `relay`, stopping the run at `stop`.
    fn drive(sim: &mut Simulation, relay: &mut RelayDevice, stop: u64) {
        sim.run(&mut |ctx: &mut SimulationContext, event: &Event| {
            if ctx.now().ticks() > stop {
                ctx.terminate();
                return;
            }
            let device_event = match &event.payload {
                EventType::ResourceManagement { .. } => DeviceEvent::ResourceManagement,
                EventType::TupleArrival { tuple, .. } => DeviceEvent::TupleArrival(tuple.clone()),
                _ => return,
            };
            relay.on_event(ctx, device_event);
        });
    }

    fn launched(app: &Arc<Application>, modules: &[&str]) -> (Simulation, RelayDevice) {
        let mut sim = Simulation::new();
        let mut relay = RelayDevice::new(DeviceId::new(1), "edge").with_interval(10);
        let mut ctx = sim.context();
        relay.on_event(&mut ctx, DeviceEvent::ActiveAppUpdate(app.clone()));
        for name in modules {
            let module = app.module(name).cloned().unwrap();
            relay.on_event(&mut ctx, DeviceEvent::LaunchModule(module));
        }
        (sim, relay)
    }

    #[test]
    fn test_executes_and_chains_locally() {
        let app = pipeline();
        let (mut sim, mut relay) = launched(&app, &["filter", "sink"]);
        let edge = app.sensor_edge("reading").cloned().unwrap();
        sim.schedule(
            VirtualTime::new(3),
            EventType::TupleArrival { device: relay.id, tuple: Tuple::from_sensor(1, "pipe", &edge) },
        );
        sim.schedule(VirtualTime::ZERO, EventType::ResourceManagement { device: relay.id });

        drive(&mut sim, &mut relay, 50);

        assert_eq!(relay.executed(), 2);
        assert!(relay.north_queue().is_empty());
        assert_eq!(sim.usage().module("filter").processed, 1);
        assert_eq!(sim.usage().module("filter").sent, 1);
        assert_eq!(sim.usage().module("sink").received, 1);
        // Arrived at 3, executed on the tick at 10.
        assert_eq!(sim.tracker().tuple_type_average("RAW"), Some(7.0));
    }

    #[test]
    fn test_forwards_along_route() {
        let app = pipeline();
        let (mut sim, mut relay) = launched(&app, &["filter"]);
        relay.route("sink", DeviceId::new(9), 4);
        let edge = app.sensor_edge("reading").cloned().unwrap();
        sim.schedule(
            VirtualTime::ZERO,
            EventType::TupleArrival { device: relay.id, tuple: Tuple::from_sensor(1, "pipe", &edge) },
        );
        sim.schedule(VirtualTime::ZERO, EventType::ResourceManagement { device: relay.id });

        let mut forwarded = Vec::new();
        sim.run(&mut |ctx: &mut SimulationContext, event: &Event| match &event.payload {
            EventType::TupleArrival { device, tuple } if *device != relay.id => {
                forwarded.push((ctx.now().ticks(), tuple.tuple_type.clone()));
                ctx.terminate();
            }
            EventType::TupleArrival { tuple, .. } => {
                relay.on_event(ctx, DeviceEvent::TupleArrival(tuple.clone()))
            }
            EventType::ResourceManagement { .. } => relay.on_event(ctx, DeviceEvent::ResourceManagement),
            _ => {}
        });

        assert_eq!(forwarded, vec![(4, "CLEAN".to_string())]);
        assert_eq!(sim.usage().network_bytes(), 4);
    }

    #[test]
    fn test_unroutable_tuples_park_south() {
        let app = pipeline();
        let (mut sim, mut relay) = launched(&app, &["filter"]);
        let edge = app.sensor_edge("reading").cloned().unwrap();
        sim.schedule(
            VirtualTime::ZERO,
            EventType::TupleArrival { device: relay.id, tuple: Tuple::from_sensor(1, "pipe", &edge) },
        );
        sim.schedule(VirtualTime::new(1), EventType::ResourceManagement { device: relay.id });

        drive(&mut sim, &mut relay, 30);

        assert_eq!(relay.south_queue().len(), 1);
        assert_eq!(relay.south_queue()[0].dest_module, "sink");
    }

    #[test]
    fn test_budget_limits_work_per_tick() {
        let app = pipeline();
        let (mut sim, mut relay) = launched(&app, &["filter"]);
        relay.mips = 5; // 50 per tick: exactly one RAW tuple
        let edge = app.sensor_edge("reading").cloned().unwrap();
        for id in 1..=3 {
            sim.schedule(
                VirtualTime::ZERO,
                EventType::TupleArrival { device: relay.id, tuple: Tuple::from_sensor(id, "pipe", &edge) },
            );
        }
        sim.schedule(VirtualTime::new(1), EventType::ResourceManagement { device: relay.id });

        drive(&mut sim, &mut relay, 5);

        assert_eq!(relay.executed(), 1);
        assert_eq!(relay.north_queue().len(), 2);
    }

    #[test]
    fn test_local_cycle_runs_one_hop_per_tick() {
        let mut app = Application::new("ring");
        app.add_module("a", 10).add_module("b", 10);
        app.add_edge(AppEdge::new("S", "a", "S", EdgeKind::Sensor))
            .add_edge(AppEdge::new("a", "b", "AB", EdgeKind::Module))
            .add_edge(AppEdge::new("b", "a", "BA", EdgeKind::Module));
        let app = Arc::new(app);
        let (mut sim, mut relay) = launched(&app, &["a", "b"]);
        let edge = app.sensor_edge("S").cloned().unwrap();
        sim.schedule(
            VirtualTime::ZERO,
            EventType::TupleArrival { device: relay.id, tuple: Tuple::from_sensor(1, "ring", &edge) },
        );
        sim.schedule(VirtualTime::new(1), EventType::ResourceManagement { device: relay.id });

        // Ticks at 1, 11 and 21.
        drive(&mut sim, &mut relay, 25);

        assert_eq!(relay.executed(), 3);
        assert_eq!(relay.north_queue().len(), 1);
        assert_eq!(relay.north_queue()[0].tuple_type, "AB");
        assert_eq!(sim.usage().module("a").processed, 2);
        assert_eq!(sim.usage().module("b").processed, 1);
    }

    #[test]
    fn test_extra_management_does_not_double_arm() {
        let app = pipeline();
        let (mut sim, mut relay) = launched(&app, &[]);
        sim.schedule(VirtualTime::ZERO, EventType::ResourceManagement { device: relay.id });
        sim.schedule(VirtualTime::new(5), EventType::ResourceManagement { device: relay.id });

        let mut ticks = Vec::new();
        sim.run(&mut |ctx: &mut SimulationContext, event: &Event| {
            if ctx.now().ticks() > 30 {
                ctx.terminate();
                return;
            }
            if let EventType::ResourceManagement { .. } = event.payload {
                ticks.push(ctx.now().ticks());
                relay.on_event(ctx, DeviceEvent::ResourceManagement);
            }
        });

        assert_eq!(ticks, vec![0, 5, 10, 20, 30]);
    }
}
