//! Audio Sinks
//!
//! The sink is the last element of the audio bin:
//! - `Null` makes a `fakesink`, optionally synchronized to the clock so that
//!   positions advance as they would on a device.
//! - `Device` makes the named output plugin (`autoaudiosink` when none is
//!   given) and hands it the output device when the plugin takes one.

use gstreamer as gst;
use gstreamer::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{GraphError, GraphResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfig {
    /// Discard output; `sync` paces rendering to the pipeline clock
    Null { sync: bool },
    /// Output plugin by factory name, e.g. `pulsesink`; empty picks
    /// `autoaudiosink`. An empty `device` keeps the plugin's default.
    Device {
        #[serde(default)]
        plugin: String,
        #[serde(default)]
        device: String,
    },
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig::Device {
            plugin: String::new(),
            device: String::new(),
        }
    }
}

impl SinkConfig {
    /// Set the device name, keeping the sink type
    pub fn with_device(&self, name: &str) -> SinkConfig {
        match self {
            SinkConfig::Null { sync } => SinkConfig::Null { sync: *sync },
            SinkConfig::Device { plugin, .. } => SinkConfig::Device {
                plugin: plugin.clone(),
                device: name.to_string(),
            },
        }
    }

    pub fn factory_name(&self) -> &str {
        match self {
            SinkConfig::Null { .. } => "fakesink",
            SinkConfig::Device { plugin, .. } if plugin.is_empty() => "autoaudiosink",
            SinkConfig::Device { plugin, .. } => plugin,
        }
    }

    pub fn validate(&self) -> GraphResult<()> {
        match self {
            SinkConfig::Device { plugin, .. }
                if !plugin
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') =>
            {
                Err(GraphError::InvalidConfiguration(format!(
                    "Invalid output plugin name: {:?}",
                    plugin
                )))
            }
            _ => Ok(()),
        }
    }

    /// Create and configure the sink element
    pub(crate) fn make(&self, name: &str) -> GraphResult<gst::Element> {
        let factory = self.factory_name();
        let sink = gst::ElementFactory::make(factory)
            .name(name)
            .build()
            .map_err(|_| GraphError::ElementUnavailable(factory.to_string()))?;

        match self {
            SinkConfig::Null { sync } => sink.set_property("sync", *sync),
            SinkConfig::Device { device, .. } if !device.is_empty() => {
                let takes_string = sink
                    .find_property("device")
                    .is_some_and(|p| p.value_type() == String::static_type());
                if takes_string {
                    sink.set_property("device", device);
                } else {
                    warn!("{} has no device setting, {} ignored", factory, device);
                }
            }
            SinkConfig::Device { .. } => {}
        }
        Ok(sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_names() {
        assert_eq!(SinkConfig::Null { sync: true }.factory_name(), "fakesink");
        assert_eq!(SinkConfig::default().factory_name(), "autoaudiosink");
        let pulse = SinkConfig::Device {
            plugin: "pulsesink".into(),
            device: String::new(),
        };
        assert_eq!(pulse.factory_name(), "pulsesink");
        assert_eq!(
            pulse.with_device("USB DAC"),
            SinkConfig::Device {
                plugin: "pulsesink".into(),
                device: "USB DAC".into()
            }
        );
        assert_eq!(
            SinkConfig::Null { sync: false }.with_device("USB DAC"),
            SinkConfig::Null { sync: false }
        );
    }

    #[test]
    fn test_validate_plugin_name() {
        assert!(SinkConfig::default().validate().is_ok());
        let bad = SinkConfig::Device {
            plugin: "pulsesink ! filesink".into(),
            device: String::new(),
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_null_sink_sync() {
        gst::init().unwrap();
        let sink = SinkConfig::Null { sync: false }.make("audiosink-1").unwrap();
        assert_eq!(sink.name(), "audiosink-1");
        assert!(!sink.property::<bool>("sync"));
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&SinkConfig::Null { sync: true }).unwrap();
        assert_eq!(json, r#"{"type":"null","sync":true}"#);
        let parsed: SinkConfig = serde_json::from_str(r#"{"type":"device"}"#).unwrap();
        assert_eq!(parsed, SinkConfig::default());
    }
}
