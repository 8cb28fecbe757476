//! Audio device lookup by name
//!
//! Virtual cables show up with long vendor names ("CABLE-A Output (VB-Audio
//! Cable A)"), so devices are matched by case-insensitive substring.

use cpal::Device;
use cpal::traits::{DeviceTrait, HostTrait};

use crate::{Error, Result};

/// A device as reported by the audio host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub is_input: bool,
    pub is_output: bool,
}

/// Whether `device_name` contains `query`, ignoring case
#[must_use]
pub fn name_matches(device_name: &str, query: &str) -> bool {
    let query = query.trim();
    !query.is_empty() && device_name.to_lowercase().contains(&query.to_lowercase())
}

/// Find an input device whose name contains `query`, or the default input
/// device when `query` is `None`
///
/// # Errors
///
/// Returns error if no matching device exists
pub fn find_input_device(query: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();

    let Some(query) = query else {
        return host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()));
    };

    host.input_devices()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|d| d.name().is_ok_and(|name| name_matches(&name, query)))
        .ok_or_else(|| Error::Audio(format!("no input device matching '{query}'")))
}

/// Find an output device whose name contains `query`, or the default output
/// device when `query` is `None`
///
/// # Errors
///
/// Returns error if no matching device exists
pub fn find_output_device(query: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();

    let Some(query) = query else {
        return host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()));
    };

    host.output_devices()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|d| d.name().is_ok_and(|name| name_matches(&name, query)))
        .ok_or_else(|| Error::Audio(format!("no output device matching '{query}'")))
}

/// Every device the default host knows about
///
/// # Errors
///
/// Returns error if the host cannot enumerate devices
pub fn list_devices() -> Result<Vec<DeviceInfo>> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    for device in host.devices().map_err(|e| Error::Audio(e.to_string()))? {
        let Ok(name) = device.name() else {
            continue;
        };
        let is_input = device
            .supported_input_configs()
            .is_ok_and(|mut configs| configs.next().is_some());
        let is_output = device
            .supported_output_configs()
            .is_ok_and(|mut configs| configs.next().is_some());

        devices.push(DeviceInfo {
            name,
            is_input,
            is_output,
        });
    }

    Ok(devices)
}
