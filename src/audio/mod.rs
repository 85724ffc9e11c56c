//! Microphone capture and device enumeration.

pub mod devices;
pub mod recorder;

pub use devices::list_input_devices;
pub use recorder::{CaptureError, CpalRecorder};
