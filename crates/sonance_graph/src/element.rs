//! Elements and the Element Factory
//!
//! [`Element`] wraps a GStreamer element together with its [`ElementKind`]
//! and exposes typed setters for the properties the pipeline drives, so a
//! wrong property name or value type cannot reach `set_property`.
//!
//! | Kind               | Factory            | Typed settings              |
//! |--------------------|--------------------|-----------------------------|
//! | `Queue`            | `queue2`           | [`QueueConfig`]             |
//! | `ReplayGainVolume` | `rgvolume`         | [`ReplayGainSettings`]      |
//! | `ReplayGainLimiter`| `rglimiter`        | enabled                     |
//! | `Volume`           | `volume`           | linear volume               |
//! | `Equalizer`        | `equalizer-nbands` | `EqConfig` (12 bands)       |
//! | `Panorama`         | `audiopanorama`    | position -1.0..=1.0         |
//! | `Sink`             | from `SinkConfig`  |                             |

use std::collections::HashSet;

use gstreamer as gst;
use gstreamer::prelude::*;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sonance_dsp::{EqConfig, EQ_BAND_COUNT, EQ_FILTER_BANDS};

use crate::error::{GraphError, GraphResult};
use crate::sink::SinkConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Queue,
    ReplayGainVolume,
    ReplayGainLimiter,
    AudioConvert,
    Volume,
    Equalizer,
    Panorama,
    Sink,
}

impl ElementKind {
    pub const ALL: [ElementKind; 8] = [
        ElementKind::Queue,
        ElementKind::ReplayGainVolume,
        ElementKind::ReplayGainLimiter,
        ElementKind::AudioConvert,
        ElementKind::Volume,
        ElementKind::Equalizer,
        ElementKind::Panorama,
        ElementKind::Sink,
    ];

    /// Factory name, also the prefix of generated element names
    ///
    /// The sink's factory comes from its `SinkConfig`; `audiosink` only
    /// names it.
    pub fn factory_name(self) -> &'static str {
        match self {
            ElementKind::Queue => "queue2",
            ElementKind::ReplayGainVolume => "rgvolume",
            ElementKind::ReplayGainLimiter => "rglimiter",
            ElementKind::AudioConvert => "audioconvert",
            ElementKind::Volume => "volume",
            ElementKind::Equalizer => "equalizer-nbands",
            ElementKind::Panorama => "audiopanorama",
            ElementKind::Sink => "audiosink",
        }
    }

    pub fn from_factory_name(name: &str) -> Option<ElementKind> {
        Self::ALL.into_iter().find(|k| k.factory_name() == name)
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.factory_name())
    }
}

/// Time-based `queue2` settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    pub max_size_time_ns: u64,
    /// Low watermark in percent; buffering starts below it
    pub low_percent: u32,
    /// Post buffering messages
    pub use_buffering: bool,
}

impl QueueConfig {
    /// Only time limits the queue; buffering messages need a real duration
    pub fn time_based(duration_ns: u64, min_fill: u32) -> Self {
        Self {
            max_size_time_ns: duration_ns,
            low_percent: min_fill.min(100),
            use_buffering: duration_ns > 0,
        }
    }
}

/// `rgvolume` settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayGainSettings {
    /// Prefer album gain over track gain
    pub album_mode: bool,
    pub pre_amp_db: f64,
}

#[derive(Debug, Clone)]
pub struct Element {
    kind: ElementKind,
    element: gst::Element,
}

impl Element {
    pub fn name(&self) -> String {
        self.element.name().to_string()
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn as_gst(&self) -> &gst::Element {
        &self.element
    }

    pub fn src_pad(&self) -> Option<gst::Pad> {
        self.element.static_pad("src")
    }

    pub fn sink_pad(&self) -> Option<gst::Pad> {
        self.element.static_pad("sink")
    }

    fn check_kind(&self, expected: ElementKind) -> GraphResult<()> {
        if self.kind == expected {
            Ok(())
        } else {
            Err(GraphError::WrongElementKind {
                name: self.name(),
                expected,
            })
        }
    }

    pub fn set_queue_config(&self, config: &QueueConfig) -> GraphResult<()> {
        self.check_kind(ElementKind::Queue)?;
        self.element.set_property("max-size-buffers", 0u32);
        self.element.set_property("max-size-bytes", 0u32);
        self.element.set_property("max-size-time", config.max_size_time_ns);
        self.element.set_property("low-percent", config.low_percent as i32);
        self.element.set_property("use-buffering", config.use_buffering);
        Ok(())
    }

    pub fn queue_config(&self) -> GraphResult<QueueConfig> {
        self.check_kind(ElementKind::Queue)?;
        Ok(QueueConfig {
            max_size_time_ns: self.element.property::<u64>("max-size-time"),
            low_percent: self.element.property::<i32>("low-percent").max(0) as u32,
            use_buffering: self.element.property::<bool>("use-buffering"),
        })
    }

    pub fn set_replaygain(&self, settings: &ReplayGainSettings) -> GraphResult<()> {
        self.check_kind(ElementKind::ReplayGainVolume)?;
        self.element.set_property("album-mode", settings.album_mode);
        self.element.set_property("pre-amp", settings.pre_amp_db);
        Ok(())
    }

    pub fn replaygain(&self) -> GraphResult<ReplayGainSettings> {
        self.check_kind(ElementKind::ReplayGainVolume)?;
        Ok(ReplayGainSettings {
            album_mode: self.element.property::<bool>("album-mode"),
            pre_amp_db: self.element.property::<f64>("pre-amp"),
        })
    }

    pub fn set_limiter_enabled(&self, enabled: bool) -> GraphResult<()> {
        self.check_kind(ElementKind::ReplayGainLimiter)?;
        self.element.set_property("enabled", enabled);
        Ok(())
    }

    pub fn limiter_enabled(&self) -> GraphResult<bool> {
        self.check_kind(ElementKind::ReplayGainLimiter)?;
        Ok(self.element.property::<bool>("enabled"))
    }

    /// Linear volume; `volume` accepts 0.0..=10.0
    pub fn set_volume(&self, volume: f64) -> GraphResult<()> {
        self.check_kind(ElementKind::Volume)?;
        self.element.set_property("volume", volume.clamp(0.0, 10.0));
        Ok(())
    }

    pub fn volume(&self) -> GraphResult<f64> {
        self.check_kind(ElementKind::Volume)?;
        Ok(self.element.property::<f64>("volume"))
    }

    pub fn set_panorama(&self, position: f32) -> GraphResult<()> {
        self.check_kind(ElementKind::Panorama)?;
        if !(-1.0..=1.0).contains(&position) {
            return Err(GraphError::InvalidConfiguration(format!(
                "Stereo balance must be within -1.0..=1.0, got {}",
                position
            )));
        }
        self.element.set_property("panorama", position);
        Ok(())
    }

    pub fn panorama(&self) -> GraphResult<f32> {
        self.check_kind(ElementKind::Panorama)?;
        Ok(self.element.property::<f32>("panorama"))
    }

    fn band(&self, index: usize) -> GraphResult<gst::glib::Object> {
        self.check_kind(ElementKind::Equalizer)?;
        self.element
            .dynamic_cast_ref::<gst::ChildProxy>()
            .and_then(|proxy| proxy.child_by_index(index as u32))
            .ok_or_else(|| {
                GraphError::InvalidConfiguration(format!("{} has no band {}", self.name(), index))
            })
    }

    /// Lay out all bands, corners included
    pub fn set_equalizer_layout(&self, config: &EqConfig) -> GraphResult<()> {
        self.check_kind(ElementKind::Equalizer)?;
        self.element.set_property("num-bands", EQ_FILTER_BANDS as u32);
        for (i, band) in config.bands.iter().enumerate() {
            let child = self.band(i)?;
            child.set_property("freq", band.frequency as f64);
            child.set_property("bandwidth", band.bandwidth as f64);
            child.set_property("gain", band.gain_db as f64);
        }
        Ok(())
    }

    /// Update the gains of the user bands
    pub fn set_equalizer_gains(&self, config: &EqConfig) -> GraphResult<()> {
        for (i, gain) in config.gains().iter().enumerate() {
            self.band(i + 1)?.set_property("gain", *gain as f64);
        }
        Ok(())
    }

    /// Gains of the user bands in dB
    pub fn equalizer_gains(&self) -> GraphResult<[f64; EQ_BAND_COUNT]> {
        let mut gains = [0.0; EQ_BAND_COUNT];
        for (i, gain) in gains.iter_mut().enumerate() {
            *gain = self.band(i + 1)?.property::<f64>("gain");
        }
        Ok(gains)
    }
}

/// Creates elements by kind
///
/// Kinds can be marked unavailable on top of what the installed plugins
/// provide, which is how tests exercise a missing plugin.
#[derive(Debug, Default)]
pub struct ElementFactory {
    unavailable: Mutex<HashSet<ElementKind>>,
}

impl ElementFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory lacking the given element kinds
    pub fn without(kinds: &[ElementKind]) -> Self {
        let factory = Self::new();
        for kind in kinds {
            factory.set_available(*kind, false);
        }
        factory
    }

    pub fn set_available(&self, kind: ElementKind, available: bool) {
        let mut unavailable = self.unavailable.lock();
        if available {
            unavailable.remove(&kind);
        } else {
            unavailable.insert(kind);
        }
    }

    /// Not masked and the plugin is installed
    pub fn is_available(&self, kind: ElementKind) -> bool {
        if self.unavailable.lock().contains(&kind) {
            return false;
        }
        kind == ElementKind::Sink || gst::ElementFactory::find(kind.factory_name()).is_some()
    }

    /// Make a processing element; use [`ElementFactory::make_sink`] for sinks
    pub fn make(&self, kind: ElementKind, name: impl Into<String>) -> GraphResult<Element> {
        if kind == ElementKind::Sink || !self.is_available(kind) {
            return Err(GraphError::ElementUnavailable(kind.factory_name().to_string()));
        }
        let element = gst::ElementFactory::make(kind.factory_name())
            .name(name.into())
            .build()
            .map_err(|_| GraphError::ElementUnavailable(kind.factory_name().to_string()))?;
        Ok(Element { kind, element })
    }

    pub fn make_sink(&self, config: &SinkConfig, name: impl Into<String>) -> GraphResult<Element> {
        if !self.is_available(ElementKind::Sink) {
            return Err(GraphError::ElementUnavailable(config.factory_name().to_string()));
        }
        Ok(Element {
            kind: ElementKind::Sink,
            element: config.make(&name.into())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> ElementFactory {
        gst::init().unwrap();
        ElementFactory::new()
    }

    #[test]
    fn test_factory_names_round_trip() {
        for kind in ElementKind::ALL {
            assert_eq!(ElementKind::from_factory_name(kind.factory_name()), Some(kind));
        }
        assert_eq!(ElementKind::from_factory_name("pulsesink"), None);
    }

    #[test]
    fn test_unavailable_kind() {
        let factory = factory();
        factory.set_available(ElementKind::Volume, false);
        assert!(matches!(
            factory.make(ElementKind::Volume, "volume-1"),
            Err(GraphError::ElementUnavailable(name)) if name == "volume"
        ));
        factory.set_available(ElementKind::Volume, true);
        assert!(factory.make(ElementKind::Volume, "volume-1").is_ok());
    }

    #[test]
    fn test_typed_accessors() {
        let factory = factory();
        let volume = factory.make(ElementKind::Volume, "volume-2").unwrap();
        volume.set_volume(0.5).unwrap();
        assert_eq!(volume.volume().unwrap(), 0.5);
        assert!(volume.queue_config().is_err());
        assert_eq!(volume.name(), "volume-2");
        assert!(volume.src_pad().is_some());
    }

    #[test]
    fn test_queue_config() {
        let factory = factory();
        let queue = factory.make(ElementKind::Queue, "queue2-1").unwrap();
        let config = QueueConfig::time_based(4_000_000_000, 33);
        queue.set_queue_config(&config).unwrap();
        assert_eq!(queue.queue_config().unwrap(), config);

        assert!(!QueueConfig::time_based(0, 120).use_buffering);
        assert_eq!(QueueConfig::time_based(0, 120).low_percent, 100);
    }

    #[test]
    fn test_panorama_range() {
        let factory = factory();
        if !factory.is_available(ElementKind::Panorama) {
            return;
        }
        let panorama = factory.make(ElementKind::Panorama, "audiopanorama-1").unwrap();
        panorama.set_panorama(-0.5).unwrap();
        assert_eq!(panorama.panorama().unwrap(), -0.5);
        assert!(panorama.set_panorama(1.5).is_err());
    }

    #[test]
    fn test_equalizer_bands() {
        let factory = factory();
        if !factory.is_available(ElementKind::Equalizer) {
            return;
        }
        let eq = factory.make(ElementKind::Equalizer, "equalizer-nbands-1").unwrap();
        let mut config = EqConfig::default();
        eq.set_equalizer_layout(&config).unwrap();
        assert_eq!(eq.band(0).unwrap().property::<f64>("freq"), 20.0);
        assert_eq!(eq.band(11).unwrap().property::<f64>("freq"), 20000.0);
        assert_eq!(eq.band(2).unwrap().property::<f64>("bandwidth"), 110.0);

        config.set_slider_gains(&[100, 0, 0, 0, 0, 0, 0, 0, 0, -50]);
        eq.set_equalizer_gains(&config).unwrap();
        let gains = eq.equalizer_gains().unwrap();
        assert!((gains[0] - 12.0).abs() < 1e-4);
        assert!((gains[9] + 12.0).abs() < 1e-4);
    }
}
