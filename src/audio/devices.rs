//! Input device enumeration for the `devices` CLI command.

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait};

/// Names of input-capable audio devices on the default host.
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .context("no input devices available")?;
    let mut names = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            names.push(name);
        }
    }
    Ok(names)
}
