//! Pipeline and Factory Configuration
//!
//! Every setting a pipeline reads at construction time lives here, so a
//! collaborator can build one [`PipelineConfig`], validate it once and hand
//! it over with `Pipeline::configure`.

use serde::{Deserialize, Serialize};
use sonance_graph::{SinkConfig, NSECONDS_PER_MSECOND};

use crate::error::{PipelineError, PipelineResult};

/// Which replaygain value to prefer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayGainMode {
    #[default]
    Track,
    Album,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayGainConfig {
    pub enabled: bool,
    pub mode: ReplayGainMode,
    /// Pre-amp in dB (-60..=60)
    pub preamp_db: f32,
    /// Enable the limiter after the replaygain volume
    pub compression: bool,
}

impl Default for ReplayGainConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: ReplayGainMode::Track,
            preamp_db: 0.0,
            compression: true,
        }
    }
}

/// Settings for one pipeline instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Sink implementation
    pub sink: SinkConfig,

    /// Output device name for device sinks; empty selects the default
    pub output_device: String,

    pub volume_enabled: bool,
    pub stereo_balancer_enabled: bool,
    pub equalizer_enabled: bool,
    pub replaygain: ReplayGainConfig,

    /// Queue length in nanoseconds; 0 disables buffering messages
    pub buffer_duration_ns: u64,

    /// Low watermark of the queue, in percent
    pub buffer_min_fill: u32,

    /// Device handed to device-backed sources (optical drives)
    pub source_device: Option<String>,

    /// User agent for network sources
    pub user_agent: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sink: SinkConfig::default(),
            output_device: String::new(),
            volume_enabled: true,
            stereo_balancer_enabled: false,
            equalizer_enabled: false,
            replaygain: ReplayGainConfig::default(),
            buffer_duration_ns: 4000 * NSECONDS_PER_MSECOND,
            buffer_min_fill: 33,
            source_device: None,
            user_agent: default_user_agent(),
        }
    }
}

pub fn default_user_agent() -> String {
    format!("sonance {}", env!("CARGO_PKG_VERSION"))
}

impl PipelineConfig {
    /// Local files: short queue, all processing stages available
    pub fn local_files() -> Self {
        Self {
            stereo_balancer_enabled: true,
            equalizer_enabled: true,
            buffer_duration_ns: 1000 * NSECONDS_PER_MSECOND,
            ..Self::default()
        }
    }

    /// Network streams: long queue, buffering messages on
    pub fn streaming() -> Self {
        Self {
            buffer_duration_ns: 8000 * NSECONDS_PER_MSECOND,
            buffer_min_fill: 50,
            ..Self::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> PipelineResult<()> {
        if self.buffer_min_fill > 100 {
            return Err(PipelineError::ConfigError(format!(
                "Invalid buffer min fill: {}%",
                self.buffer_min_fill
            )));
        }
        if !(-60.0..=60.0).contains(&self.replaygain.preamp_db) {
            return Err(PipelineError::ConfigError(format!(
                "Invalid replaygain pre-amp: {} dB",
                self.replaygain.preamp_db
            )));
        }
        if self.user_agent.is_empty() {
            return Err(PipelineError::ConfigError("Empty user agent".into()));
        }
        self.sink.validate()?;
        Ok(())
    }

    /// The sink configuration with the output device applied
    pub fn effective_sink(&self) -> SinkConfig {
        if self.output_device.is_empty() {
            self.sink.clone()
        } else {
            self.sink.with_device(&self.output_device)
        }
    }

    pub fn from_json(json: &str) -> PipelineResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> PipelineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Settings shared by every pipeline of a factory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    /// Threads running `set_state` requests
    pub set_state_workers: usize,

    /// Pending `set_state` requests before new ones are refused
    pub set_state_queue_depth: usize,

    pub discovery_timeout_ms: u64,

    /// Pending discovery requests per pipeline
    pub discovery_queue_depth: usize,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            set_state_workers: 2,
            set_state_queue_depth: 32,
            discovery_timeout_ms: 10_000,
            discovery_queue_depth: 8,
        }
    }
}

impl FactoryConfig {
    pub fn validate(&self) -> PipelineResult<()> {
        if self.set_state_workers == 0 || self.set_state_workers > 16 {
            return Err(PipelineError::ConfigError(format!(
                "Invalid set-state worker count: {}",
                self.set_state_workers
            )));
        }
        if self.set_state_queue_depth == 0 {
            return Err(PipelineError::ConfigError("Empty set-state queue".into()));
        }
        if self.discovery_timeout_ms == 0 {
            return Err(PipelineError::ConfigError("Zero discovery timeout".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert!(config.volume_enabled);
        assert!(!config.equalizer_enabled);
        assert_eq!(config.buffer_min_fill, 33);
        assert!(config.user_agent.starts_with("sonance "));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let invalid_fill = PipelineConfig {
            buffer_min_fill: 120,
            ..Default::default()
        };
        assert!(invalid_fill.validate().is_err());

        let mut invalid_preamp = PipelineConfig::default();
        invalid_preamp.replaygain.preamp_db = 90.0;
        assert!(invalid_preamp.validate().is_err());

        let invalid_workers = FactoryConfig {
            set_state_workers: 0,
            ..Default::default()
        };
        assert!(invalid_workers.validate().is_err());
    }

    #[test]
    fn test_preset_configs() {
        let local = PipelineConfig::local_files();
        let streaming = PipelineConfig::streaming();
        assert!(local.buffer_duration_ns < streaming.buffer_duration_ns);
        assert!(local.equalizer_enabled);
    }

    #[test]
    fn test_effective_sink() {
        let mut config = PipelineConfig {
            sink: SinkConfig::Device {
                plugin: "alsasink".into(),
                device: String::new(),
            },
            ..Default::default()
        };
        config.output_device = "hw:1,0".into();
        assert_eq!(
            config.effective_sink(),
            SinkConfig::Device {
                plugin: "alsasink".into(),
                device: "hw:1,0".into(),
            }
        );

        config.sink = SinkConfig::Null { sync: true };
        assert_eq!(config.effective_sink(), SinkConfig::Null { sync: true });
    }

    #[test]
    fn test_config_serialization() {
        let mut config = PipelineConfig::default();
        config.replaygain.mode = ReplayGainMode::Album;
        let json = config.to_json().unwrap();
        assert!(json.contains("\"album\""));
        let parsed = PipelineConfig::from_json(&json).unwrap();
        assert_eq!(parsed, config);

        // Missing fields fall back to defaults
        let partial = PipelineConfig::from_json(r#"{"buffer_min_fill": 50}"#).unwrap();
        assert_eq!(partial.buffer_min_fill, 50);
        assert!(partial.volume_enabled);
    }
}
