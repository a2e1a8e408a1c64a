//! Application graph: modules, edges and loops.
//!
//! An application is consumed as data. The orchestrator only mutates it
//! once, at submission, to record actuator subscriptions; after that it
//! is shared read-only behind an `Arc` with every device.

use serde::{Deserialize, Serialize};

use crate::device::ActuatorId;
use crate::error::{FogError, FogResult};
use crate::tuple::Direction;

// ── Edges ─────────────────────────────────────────────────────────────

/// What sits at the ends of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Sensor → module. `source` is the sensor tuple type.
    Sensor,
    /// Module → actuator. `destination` is the actuator type.
    Actuator,
    /// Module → module.
    Module,
}

/// A directed dataflow edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppEdge {
    pub source: String,
    pub destination: String,
    pub tuple_type: String,
    pub cpu_length: u64,
    pub data_size: u64,
    pub direction: Direction,
    pub kind: EdgeKind,
}

impl AppEdge {
    /// Create an edge with zero sizes. Direction defaults to `Up`, or
    /// `Actuator` for actuator edges.
    pub fn new(source: &str, destination: &str, tuple_type: &str, kind: EdgeKind) -> Self {
        AppEdge {
            source: source.to_string(),
            destination: destination.to_string(),
            tuple_type: tuple_type.to_string(),
            cpu_length: 0,
            data_size: 0,
            direction: match kind {
                EdgeKind::Actuator => Direction::Actuator,
                _ => Direction::Up,
            },
            kind,
        }
    }

    pub fn cpu_length(mut self, cpu_length: u64) -> Self {
        self.cpu_length = cpu_length;
        self
    }

    pub fn data_size(mut self, data_size: u64) -> Self {
        self.data_size = data_size;
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }
}

// ── Modules ───────────────────────────────────────────────────────────

/// A module's promise to deliver `tuple_type` to an actuator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorSubscription {
    pub actuator: ActuatorId,
    pub tuple_type: String,
}

/// A unit of application logic assignable to a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppModule {
    pub name: String,
    /// Required compute capacity.
    pub capacity: u64,
    subscriptions: Vec<ActuatorSubscription>,
}

impl AppModule {
    pub fn new(name: &str, capacity: u64) -> Self {
        AppModule {
            name: name.to_string(),
            capacity,
            subscriptions: Vec::new(),
        }
    }

    /// Subscribe this module to deliver `tuple_type` to `actuator`.
    pub fn subscribe_actuator(&mut self, actuator: ActuatorId, tuple_type: &str) {
        self.subscriptions.push(ActuatorSubscription {
            actuator,
            tuple_type: tuple_type.to_string(),
        });
    }

    /// Actuator subscriptions, in subscription order.
    pub fn actuator_subscriptions(&self) -> &[ActuatorSubscription] {
        &self.subscriptions
    }
}

// ── Loops ─────────────────────────────────────────────────────────────

/// Identifier of a loop within its application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LoopId(u64);

impl LoopId {
    #[inline]
    pub fn new(id: u64) -> Self {
        LoopId(id)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for LoopId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// A named end-to-end path used to measure round-trip latency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppLoop {
    pub id: LoopId,
    pub members: Vec<String>,
    /// Latency at or under which a completion counts as a QoS success.
    pub deadline: Option<f64>,
}

impl AppLoop {
    /// Human-readable loop name, e.g. `source->filter->sink`.
    pub fn name(&self) -> String {
        self.members.join("->")
    }

    /// Whether `name` is the first member.
    pub fn starts_with(&self, name: &str) -> bool {
        self.members.first().is_some_and(|m| m == name)
    }

    /// Whether `name` is the last member.
    pub fn ends_with(&self, name: &str) -> bool {
        self.members.last().is_some_and(|m| m == name)
    }
}

// ── Geo coverage ──────────────────────────────────────────────────────

/// Rectangular area an application serves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoverage {
    pub lat_min: f64,
    pub lat_max: f64,
    pub long_min: f64,
    pub long_max: f64,
}

// ── Application ───────────────────────────────────────────────────────

/// An application as a dataflow graph of modules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    id: String,
    modules: Vec<AppModule>,
    edges: Vec<AppEdge>,
    loops: Vec<AppLoop>,
    geo_coverage: Option<GeoCoverage>,
}

impl Application {
    pub fn new(id: &str) -> Self {
        Application {
            id: id.to_string(),
            modules: Vec::new(),
            edges: Vec::new(),
            loops: Vec::new(),
            geo_coverage: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Declare a module. Re-declaring a name updates its capacity.
    pub fn add_module(&mut self, name: &str, capacity: u64) -> &mut Self {
        match self.modules.iter_mut().find(|m| m.name == name) {
            Some(existing) => existing.capacity = capacity,
            None => self.modules.push(AppModule::new(name, capacity)),
        }
        self
    }

    pub fn add_edge(&mut self, edge: AppEdge) -> &mut Self {
        self.edges.push(edge);
        self
    }

    /// Declare a loop over already-declared names.
    ///
    /// Members must be module names, sensor tuple types (sources of
    /// SENSOR edges) or actuator types (destinations of ACTUATOR edges).
    pub fn add_loop<S: AsRef<str>>(&mut self, members: &[S]) -> FogResult<LoopId> {
        if members.is_empty() {
            return Err(FogError::EmptyLoop {
                app_id: self.id.clone(),
            });
        }
        if let Some(unknown) = members.iter().find(|m| !self.knows_name(m.as_ref())) {
            return Err(FogError::UnknownLoopMember {
                app_id: self.id.clone(),
                name: unknown.as_ref().to_string(),
            });
        }
        let id = LoopId::new(self.loops.len() as u64);
        self.loops.push(AppLoop {
            id,
            members: members.iter().map(|m| m.as_ref().to_string()).collect(),
            deadline: None,
        });
        Ok(id)
    }

    /// Set the QoS deadline of a declared loop. Unknown ids are ignored.
    pub fn set_loop_deadline(&mut self, id: LoopId, deadline: f64) -> &mut Self {
        if let Some(app_loop) = self.loops.iter_mut().find(|l| l.id == id) {
            app_loop.deadline = Some(deadline);
        }
        self
    }

    pub fn set_geo_coverage(&mut self, coverage: GeoCoverage) -> &mut Self {
        self.geo_coverage = Some(coverage);
        self
    }

    pub fn geo_coverage(&self) -> Option<GeoCoverage> {
        self.geo_coverage
    }

    pub fn modules(&self) -> &[AppModule] {
        &self.modules
    }

    pub fn module(&self, name: &str) -> Option<&AppModule> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn module_mut(&mut self, name: &str) -> Option<&mut AppModule> {
        self.modules.iter_mut().find(|m| m.name == name)
    }

    pub fn has_module(&self, name: &str) -> bool {
        self.module(name).is_some()
    }

    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(|m| m.name.as_str())
    }

    pub fn edges(&self) -> &[AppEdge] {
        &self.edges
    }

    /// Edges leaving `module`.
    pub fn edges_from<'a>(&'a self, module: &'a str) -> impl Iterator<Item = &'a AppEdge> + 'a {
        self.edges.iter().filter(move |e| e.source == module)
    }

    /// The SENSOR edge fed by sensors emitting `tuple_type`.
    pub fn sensor_edge(&self, tuple_type: &str) -> Option<&AppEdge> {
        self.edges
            .iter()
            .find(|e| e.kind == EdgeKind::Sensor && e.source == tuple_type)
    }

    pub fn loops(&self) -> &[AppLoop] {
        &self.loops
    }

    pub fn app_loop(&self, id: LoopId) -> Option<&AppLoop> {
        self.loops.iter().find(|l| l.id == id)
    }

    fn knows_name(&self, name: &str) -> bool {
        self.has_module(name)
            || self.edges.iter().any(|e| match e.kind {
                EdgeKind::Sensor => e.source == name,
                EdgeKind::Actuator => e.destination == name,
                EdgeKind::Module => false,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> Application {
        let mut app = Application::new("pipeline");
        app.add_module("filter", 10).add_module("store", 20);
        app.add_edge(AppEdge::new("TEMP", "filter", "TEMP", EdgeKind::Sensor))
            .add_edge(AppEdge::new("filter", "store", "FILTERED", EdgeKind::Module))
            .add_edge(AppEdge::new("store", "DISPLAY", "ALERT", EdgeKind::Actuator));
        app
    }

    #[test]
    fn test_loop_accepts_modules_sensors_and_actuators() {
        let mut app = pipeline();
        let id = app.add_loop(&["TEMP", "filter", "store", "DISPLAY"]).unwrap();
        assert_eq!(id, LoopId::new(0));
        let lp = app.app_loop(id).unwrap();
        assert_eq!(lp.name(), "TEMP->filter->store->DISPLAY");
        assert!(lp.starts_with("TEMP"));
        assert!(lp.ends_with("DISPLAY"));
        assert_eq!(lp.deadline, None);

        app.set_loop_deadline(id, 12.5);
        assert_eq!(app.app_loop(id).unwrap().deadline, Some(12.5));
    }

    #[test]
    fn test_loop_rejects_unknown_member() {
        let mut app = pipeline();
        let err = app.add_loop(&["filter", "nowhere"]).unwrap_err();
        assert!(matches!(err, FogError::UnknownLoopMember { ref name, .. } if name == "nowhere"));
        assert!(app.loops().is_empty());
    }

    #[test]
    fn test_empty_loop_rejected() {
        let mut app = pipeline();
        let empty: [&str; 0] = [];
        assert!(matches!(app.add_loop(&empty), Err(FogError::EmptyLoop { .. })));
    }

    #[test]
    fn test_redeclared_module_updates_capacity() {
        let mut app = pipeline();
        app.add_module("filter", 99);
        assert_eq!(app.modules().len(), 2);
        assert_eq!(app.module("filter").unwrap().capacity, 99);
    }

    #[test]
    fn test_sensor_edge_lookup() {
        let app = pipeline();
        assert_eq!(app.sensor_edge("TEMP").unwrap().destination, "filter");
        assert!(app.sensor_edge("HUMIDITY").is_none());
        assert_eq!(app.edges_from("filter").count(), 1);
    }

    #[test]
    fn test_actuator_edge_direction() {
        let edge = AppEdge::new("store", "DISPLAY", "ALERT", EdgeKind::Actuator);
        assert_eq!(edge.direction, Direction::Actuator);
    }
}
