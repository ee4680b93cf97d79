//! Clipboard polling: change detection, upload, and the background loop.

pub mod controller;
pub mod cycle;
pub mod fingerprint;
pub mod loop_worker;
pub mod state;

pub use controller::MonitorController;
pub use cycle::{CaptureCycle, CycleConfig, CycleOutcome};
pub use fingerprint::Fingerprint;
pub use loop_worker::DEFAULT_POLL_INTERVAL;
pub use state::{MonitorPhase, MonitorSnapshot, MonitorState};
