//! Structured error types for the fog simulator.
//!
//! All fallible public APIs return `Result<T, FogError>`. Only fatal
//! conditions are errors: soft failures (an actuator edge with no
//! matching actuator, a parent id nobody registered, an execution end
//! without a start) are skipped and logged instead.

use crate::device::DeviceId;
use crate::time::VirtualTime;

/// The top-level error type for the fog simulator.
#[derive(Debug, thiserror::Error)]
pub enum FogError {
    // ── Application / placement errors ────────────────────

    /// The placement does not assign every module of the application.
    #[error("placement for application {app_id} does not cover modules {missing:?}")]
    PlacementIncomplete { app_id: String, missing: Vec<String> },

    /// The placement names a module the application does not declare.
    #[error("placement assigns unknown module {module} of application {app_id}")]
    UnknownModule { app_id: String, module: String },

    /// The orchestrator already holds a different application.
    #[error("application {active} is already active; cannot submit {submitted}")]
    ApplicationAlreadyActive { active: String, submitted: String },

    /// An application was submitted after the simulation started.
    #[error("simulation already started; cannot submit {app_id}")]
    AlreadyStarted { app_id: String },

    /// `start` was called twice.
    #[error("orchestrator was already started")]
    StartedTwice,

    /// A loop names something that is neither a module, a sensor nor an actuator.
    #[error("loop of application {app_id} references unknown name {name}")]
    UnknownLoopMember { app_id: String, name: String },

    /// A loop with no members.
    #[error("loop of application {app_id} is empty")]
    EmptyLoop { app_id: String },

    // ── Topology errors ───────────────────────────────────

    /// A device ID was referenced but is not registered.
    #[error("device {0} not found")]
    DeviceNotFound(DeviceId),

    /// A device name was referenced but is not registered.
    #[error("device named {0:?} not found")]
    DeviceNameNotFound(String),

    /// Attempted to register a device with an ID that is already in use.
    #[error("device {0} is already registered")]
    DeviceAlreadyRegistered(DeviceId),

    // ── Run / snapshot errors ─────────────────────────────

    /// A delay would move virtual time past its maximum.
    #[error("a delay of {delay} ticks from {now} overflows virtual time")]
    TimeOverflow { now: VirtualTime, delay: u64 },

    /// The snapshot was requested before termination.
    #[error("simulation has not terminated; no snapshot yet")]
    NotTerminated,

    // ── Config / export errors ────────────────────────────

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for `Result<T, FogError>`.
pub type FogResult<T> = Result<T, FogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_placement() {
        let e = FogError::PlacementIncomplete {
            app_id: "app".into(),
            missing: vec!["sink".into()],
        };
        let s = e.to_string();
        assert!(s.contains("app"));
        assert!(s.contains("sink"));
    }

    #[test]
    fn test_error_display_device_not_found() {
        let e = FogError::DeviceNotFound(DeviceId::new(5));
        assert_eq!(e.to_string(), "device D5 not found");
    }

    #[test]
    fn test_error_is_std_error() {
        let e: Box<dyn std::error::Error> = Box::new(FogError::NotTerminated);
        assert!(!e.to_string().is_empty());
    }

    #[test]
    fn test_io_error_converts() {
        fn fails() -> FogResult<()> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"))?;
            Ok(())
        }
        assert!(matches!(fails(), Err(FogError::Io(_))));
    }
}
