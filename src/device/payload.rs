//! Device event enumeration.

use std::sync::Arc;

use crate::application::{AppModule, Application};
use crate::tuple::Tuple;

// ── DeviceEvent ───────────────────────────────────────────────────────

/// The events that a device can receive via `FogDevice::on_event`.
///
/// These are *logical* events dispatched by the orchestrator. The
/// scheduler speaks `EventType`; the orchestrator translates the
/// device-addressed variants into `DeviceEvent` and delivers them to
/// the owning device.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// The application became active; every device receives it.
    ActiveAppUpdate(Arc<Application>),
    /// The device hosts at least one module of this application.
    ReceiveApplication(Arc<Application>),
    /// Instantiate a module on this device.
    LaunchModule(AppModule),
    /// Manage resources now.
    ResourceManagement,
    /// A tuple reached this device.
    TupleArrival(Tuple),
}

impl std::fmt::Display for DeviceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceEvent::ActiveAppUpdate(app) => write!(f, "ActiveAppUpdate({})", app.id()),
            DeviceEvent::ReceiveApplication(app) => {
                write!(f, "ReceiveApplication({})", app.id())
            }
            DeviceEvent::LaunchModule(module) => write!(f, "LaunchModule({})", module.name),
            DeviceEvent::ResourceManagement => write!(f, "ResourceManagement"),
            DeviceEvent::TupleArrival(tuple) => write!(f, "TupleArrival({})", tuple),
        }
    }
}
