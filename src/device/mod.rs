//! Processing devices and the hierarchy they form.
//!
//! Devices are consumed through the [`FogDevice`] trait: the orchestrator
//! delivers [`DeviceEvent`]s and, at the end of a run, reads each
//! device's energy and queues.
//!
//! # Module structure
//!
//! | Sub-module | Contents |
//! |---|---|
//! | [`id`] | [`DeviceId`], [`SensorId`], [`ActuatorId`] newtypes |
//! | [`payload`] | [`DeviceEvent`] |
//! | [`traits`] | [`FogDevice`] trait + [`SimulationContext`](crate::simulation::SimulationContext) extensions |
//! | [`topology`] | [`DeviceLinks`], [`ParentLink`], child-table derivation |
//! | [`builtin`] | [`RecordingDevice`], [`RelayDevice`] |

pub mod builtin;
pub mod id;
pub mod payload;
pub mod topology;
pub mod traits;

// Flat re-exports so external callers can use `fogsim::device::DeviceId` etc.
pub use builtin::{RecordingDevice, RelayDevice, Route};
pub use id::{ActuatorId, DeviceId, SensorId};
pub use payload::DeviceEvent;
pub use topology::{connect_with_latencies, path_latency, DeviceLinks, ParentLink};
pub use traits::FogDevice;
