//! Output Device Enumeration
//!
//! Lists the output devices the device sink can open, so a collaborator
//! can offer a choice for [`Pipeline::set_output_device`]. Only built with
//! the `device-output` feature.
//!
//! [`Pipeline::set_output_device`]: crate::Pipeline::set_output_device

use cpal::traits::{DeviceTrait, HostTrait};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Sample rates reported when a device supports them
const COMMON_RATES: [u32; 6] = [44100, 48000, 88200, 96000, 176400, 192000];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDevice {
    /// Name passed to `set_output_device`
    pub name: String,
    pub is_default: bool,
    /// Common rates the device supports (may be empty if querying failed)
    pub sample_rates: Vec<u32>,
    pub max_channels: u16,
}

impl OutputDevice {
    /// All output devices of the default host
    pub fn enumerate() -> PipelineResult<Vec<OutputDevice>> {
        let host = cpal::default_host();
        let default_name = host.default_output_device().and_then(|d| d.name().ok());

        let devices: Vec<OutputDevice> = host
            .output_devices()
            .map_err(|e| PipelineError::DeviceNotFound(e.to_string()))?
            .filter_map(|device| Self::from_cpal(&device, default_name.as_deref()).ok())
            .collect();

        if devices.is_empty() {
            return Err(PipelineError::NoDevicesFound);
        }
        Ok(devices)
    }

    pub fn default_device() -> PipelineResult<OutputDevice> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or(PipelineError::NoDevicesFound)?;
        let mut output = Self::from_cpal(&device, None)?;
        output.is_default = true;
        Ok(output)
    }

    /// Look a device up by name; an empty name means the default device
    pub fn find(name: &str) -> PipelineResult<OutputDevice> {
        if name.is_empty() {
            return Self::default_device();
        }
        Self::enumerate()?
            .into_iter()
            .find(|d| d.name == name)
            .ok_or_else(|| PipelineError::DeviceNotFound(name.to_string()))
    }

    fn from_cpal(device: &cpal::Device, default_name: Option<&str>) -> PipelineResult<Self> {
        let name = device
            .name()
            .map_err(|e| PipelineError::DeviceNotFound(e.to_string()))?;
        let is_default = default_name == Some(name.as_str());

        let (sample_rates, max_channels) = match device.supported_output_configs() {
            Ok(configs) => supported_rates(configs),
            Err(_) => (Vec::new(), 2),
        };

        Ok(OutputDevice {
            name,
            is_default,
            sample_rates,
            max_channels,
        })
    }
}

fn supported_rates(
    configs: impl Iterator<Item = cpal::SupportedStreamConfigRange>,
) -> (Vec<u32>, u16) {
    let mut rates = Vec::new();
    let mut max_channels = 0u16;

    for config in configs {
        max_channels = max_channels.max(config.channels());
        let (min, max) = (config.min_sample_rate().0, config.max_sample_rate().0);
        for rate in COMMON_RATES {
            if (min..=max).contains(&rate) && !rates.contains(&rate) {
                rates.push(rate);
            }
        }
    }

    rates.sort_unstable();
    if max_channels == 0 {
        max_channels = 2;
    }
    (rates, max_channels)
}
