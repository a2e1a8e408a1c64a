//! Built-in devices: RecordingDevice and RelayDevice.
//!
//! `RecordingDevice` is a passive sink for tests; `RelayDevice` is a
//! small but complete processing device used by the demo scenario.

pub mod recording;
pub mod relay;

pub use recording::RecordingDevice;
pub use relay::{RelayDevice, Route};
