//! # fogsim: Deterministic Fog Computing Simulator
//!
//! A discrete-event kernel for studying where the modules of an IoT
//! application should run across a cloud/fog/edge device hierarchy.
//! Sensors emit tuples, devices execute and forward them along the
//! application's dataflow graph, actuators close the loops, and the run
//! ends with a metrics snapshot. No async, no threads: every run is
//! driven by a virtual clock and replays identically.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────┐
//! │  Scenario / ScenarioBuilder   │ ← build, step, run, export
//! │  ┌─────────────────────────┐  │
//! │  │      Orchestrator        │  │ ← topology, placement, lifecycle
//! │  │  ┌───────────────────┐  │  │
//! │  │  │ FogDevice / Sensor │  │  │ ← execute and route tuples
//! │  │  └───────────────────┘  │  │
//! │  └─────────────────────────┘  │
//! │  ┌─────────────────────────┐  │
//! │  │       Simulation         │  │ ← execution loop
//! │  │  Scheduler   (min-heap)  │  │
//! │  │  TimeTracker (latency)   │  │
//! │  │  UsageMonitor (counters) │  │
//! │  └─────────────────────────┘  │
//! └───────────────────────────────┘
//! ```

pub mod api;
pub mod application;
pub mod config;
pub mod device;
pub mod dsl;
pub mod entities;
pub mod error;
pub mod event;
pub mod export;
pub mod metrics;
pub mod monitor;
pub mod orchestrator;
pub mod placement;
pub mod scheduler;
pub mod simulation;
pub mod time;
pub mod tracker;
pub mod tuple;

// Re-exports for convenience.
pub use api::{Scenario, StepResult};
pub use application::{AppEdge, AppLoop, AppModule, Application, EdgeKind, LoopId};
pub use config::SimulationConfig;
pub use device::{ActuatorId, DeviceEvent, DeviceId, FogDevice, RecordingDevice, RelayDevice, SensorId};
pub use dsl::ScenarioBuilder;
pub use entities::{Actuator, Sensor};
pub use error::{FogError, FogResult};
pub use event::{Event, EventId, EventIdGen, EventType};
pub use export::{CollectingExporter, FileExporter, JsonExporter, MetricsExporter, NoopExporter};
pub use metrics::MetricsSnapshot;
pub use orchestrator::Orchestrator;
pub use placement::{ModuleMapping, Placement};
pub use scheduler::Scheduler;
pub use simulation::{EventHandler, Simulation, SimulationContext};
pub use time::VirtualTime;
pub use tuple::{Direction, Tuple};
