//! Command-line arguments
//!
//! Only the clap surface lives here; [`Args::pipeline_config`] maps it onto
//! the pipeline's own configuration.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use sonance_core::{
    find_preset, PipelineConfig, ReplayGainConfig, ReplayGainMode, SinkConfig, EQ_BAND_COUNT,
    NSECONDS_PER_MSECOND,
};

#[derive(Parser, Debug)]
#[command(name = "sonance-play", about = "Play files gaplessly through the sonance pipeline")]
pub struct Args {
    /// Files or URIs, played in order
    pub tracks: Vec<String>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Output plugin, e.g. pulsesink or alsasink; autoaudiosink when omitted
    #[arg(long)]
    pub sink: Option<String>,

    /// Output device name; default device when omitted
    #[arg(long)]
    pub device: Option<String>,

    /// Discard output instead of playing it
    #[arg(long)]
    pub null_sink: bool,

    /// Volume in percent
    #[arg(long, default_value_t = 100)]
    pub volume: u32,

    /// Stereo balance, -1.0 (left) to 1.0 (right)
    #[arg(long, allow_hyphen_values = true)]
    pub balance: Option<f32>,

    /// Equalizer preset name, e.g. "Rock"
    #[arg(long)]
    pub eq_preset: Option<String>,

    /// Apply replaygain with the given mode
    #[arg(long, value_enum)]
    pub replaygain: Option<GainMode>,

    /// Replaygain pre-amp in dB
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub preamp: f32,

    /// Queue length in milliseconds
    #[arg(long, default_value_t = 4000)]
    pub buffer_ms: u64,

    /// Fade in over this many milliseconds
    #[arg(long)]
    pub fade_in_ms: Option<u64>,

    /// Print a spectrum line while playing
    #[arg(long)]
    pub spectrum: bool,

    /// Print pipeline signals as JSON lines
    #[arg(long)]
    pub json: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainMode {
    Track,
    Album,
}

impl From<GainMode> for ReplayGainMode {
    fn from(mode: GainMode) -> Self {
        match mode {
            GainMode::Track => ReplayGainMode::Track,
            GainMode::Album => ReplayGainMode::Album,
        }
    }
}

impl Args {
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let sink = if self.null_sink {
            SinkConfig::Null { sync: true }
        } else {
            SinkConfig::Device {
                plugin: self.sink.clone().unwrap_or_default(),
                device: String::new(),
            }
        };

        let config = PipelineConfig {
            sink,
            output_device: self.device.clone().unwrap_or_default(),
            stereo_balancer_enabled: self.balance.is_some(),
            equalizer_enabled: self.eq_preset.is_some(),
            replaygain: ReplayGainConfig {
                enabled: self.replaygain.is_some(),
                mode: self.replaygain.map(Into::into).unwrap_or_default(),
                preamp_db: self.preamp,
                ..ReplayGainConfig::default()
            },
            buffer_duration_ns: self.buffer_ms * NSECONDS_PER_MSECOND,
            ..PipelineConfig::default()
        };
        config.validate().context("invalid playback settings")?;
        Ok(config)
    }

    /// Preamp and sliders of the selected equalizer preset
    pub fn equalizer(&self) -> Result<Option<(i32, [i32; EQ_BAND_COUNT])>> {
        let Some(name) = &self.eq_preset else {
            return Ok(None);
        };
        let (_, preamp, gains) =
            find_preset(name).ok_or_else(|| anyhow!("unknown equalizer preset: {}", name))?;
        Ok(Some((*preamp, *gains)))
    }
}

/// Turn a path into a `file://` URI; URIs pass through
pub fn track_uri(track: &str) -> Result<String> {
    if track.contains("://") {
        return Ok(track.to_string());
    }
    let path = Path::new(track)
        .canonicalize()
        .with_context(|| format!("cannot open {}", track))?;
    let uri = url::Url::from_file_path(&path)
        .map_err(|_| anyhow!("not an absolute path: {}", path.display()))?;
    Ok(uri.to_string())
}
