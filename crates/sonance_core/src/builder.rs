//! Element Graph Builder
//!
//! Builds the audio bin a pipeline hands to its playbin:
//!
//! ```text
//! ghost "sink" ─▶ queue2 ─▶ [rgvolume ─▶ rglimiter ─▶ audioconvert]
//!   ─▶ [volume(preamp) ─▶ equalizer-nbands] ─▶ [audiopanorama] ─▶ [volume]
//!   ─▶ audioconvert ─(audio/x-raw)─▶ audiosink
//! ```
//!
//! Bracketed stages are optional. A stage that is disabled, or whose
//! element cannot be made, is left out and the link moves on to the next
//! real stage. The queue, the final converter and the sink are required.

use gstreamer as gst;
use gstreamer::prelude::*;
use sonance_dsp::EqConfig;
use sonance_graph::{
    Element, ElementFactory, ElementKind, GraphError, QueueConfig, ReplayGainSettings,
};
use tracing::{debug, warn};

use crate::config::{PipelineConfig, ReplayGainMode};
use crate::error::{PipelineError, PipelineResult};
use crate::factory::ElementNames;

/// Handles to the configurable elements of a built bin
#[derive(Debug, Clone)]
pub struct AudioStages {
    pub queue: Element,
    pub rg_volume: Option<Element>,
    pub rg_limiter: Option<Element>,
    pub eq_preamp: Option<Element>,
    pub equalizer: Option<Element>,
    pub panorama: Option<Element>,
    pub volume: Option<Element>,
    pub sink: Element,
    /// Element whose src pad reports the first segment
    pub segment_element: Element,
}

impl AudioStages {
    /// Name of the queue, the only element whose buffering is honored
    pub fn queue_name(&self) -> String {
        self.queue.name()
    }
}

struct Maker<'a> {
    elements: &'a ElementFactory,
    names: &'a ElementNames,
}

impl Maker<'_> {
    fn optional(&self, kind: ElementKind) -> Option<Element> {
        match self.elements.make(kind, self.names.next(kind)) {
            Ok(element) => Some(element),
            Err(e) => {
                warn!("Skipping {}: {}", kind, e);
                None
            }
        }
    }

    fn required(&self, kind: ElementKind) -> PipelineResult<Element> {
        self.elements
            .make(kind, self.names.next(kind))
            .map_err(|_| PipelineError::MissingElement(kind.factory_name()))
    }

    fn sink(&self, config: &PipelineConfig) -> PipelineResult<Element> {
        let sink = config.effective_sink();
        self.elements
            .make_sink(&sink, self.names.next(ElementKind::Sink))
            .map_err(|e| {
                warn!("Cannot make {}: {}", sink.factory_name(), e);
                PipelineError::MissingElement(ElementKind::Sink.factory_name())
            })
    }
}

/// Build and link the audio bin for `config`
pub fn build_audio_bin(
    elements: &ElementFactory,
    names: &ElementNames,
    config: &PipelineConfig,
) -> PipelineResult<(gst::Bin, AudioStages)> {
    let maker = Maker { elements, names };

    let queue = maker.required(ElementKind::Queue)?;

    let rg = if config.replaygain.enabled {
        let volume = maker.optional(ElementKind::ReplayGainVolume);
        let limiter = maker.optional(ElementKind::ReplayGainLimiter);
        let convert = maker.optional(ElementKind::AudioConvert);
        match (volume, limiter, convert) {
            (Some(v), Some(l), Some(c)) => Some((v, l, c)),
            _ => {
                warn!("Replaygain elements incomplete, replaygain disabled");
                None
            }
        }
    } else {
        None
    };

    let eq = if config.equalizer_enabled {
        let preamp = maker.optional(ElementKind::Volume);
        let equalizer = maker.optional(ElementKind::Equalizer);
        match (preamp, equalizer) {
            (Some(p), Some(e)) => Some((p, e)),
            _ => {
                warn!("Equalizer elements incomplete, equalizer disabled");
                None
            }
        }
    } else {
        None
    };

    let panorama = if config.stereo_balancer_enabled {
        maker.optional(ElementKind::Panorama)
    } else {
        None
    };

    let volume = if config.volume_enabled {
        maker.optional(ElementKind::Volume)
    } else {
        None
    };

    let convert = maker.required(ElementKind::AudioConvert)?;
    let sink = maker.sink(config)?;

    // Configure before linking so the streaming thread starts with final values
    queue.set_queue_config(&queue_config(config))?;
    if let Some((rg_volume, rg_limiter, _)) = &rg {
        rg_volume.set_replaygain(&ReplayGainSettings {
            album_mode: config.replaygain.mode == ReplayGainMode::Album,
            pre_amp_db: config.replaygain.preamp_db as f64,
        })?;
        rg_limiter.set_limiter_enabled(config.replaygain.compression)?;
    }
    if let Some((_, equalizer)) = &eq {
        equalizer.set_equalizer_layout(&EqConfig::default())?;
    }

    let mut chain: Vec<&Element> = vec![&queue];
    if let Some((v, l, c)) = &rg {
        chain.extend([v, l, c]);
    }
    if let Some((p, e)) = &eq {
        chain.extend([p, e]);
    }
    chain.extend(panorama.iter());
    chain.extend(volume.iter());
    chain.push(&convert);

    let bin = gst::Bin::builder().name("audiobin").build();
    let processing: Vec<gst::Element> = chain.iter().map(|e| e.as_gst().clone()).collect();
    bin.add_many(&processing).map_err(GraphError::from)?;
    bin.add(sink.as_gst()).map_err(GraphError::from)?;
    gst::Element::link_many(&processing).map_err(GraphError::from)?;
    convert
        .as_gst()
        .link_filtered(sink.as_gst(), &gst::Caps::builder("audio/x-raw").build())
        .map_err(GraphError::from)?;

    let target = queue
        .sink_pad()
        .ok_or_else(|| GraphError::InvalidConfiguration("queue without sink pad".into()))?;
    let ghost = gst::GhostPad::with_target(&target).map_err(GraphError::from)?;
    bin.add_pad(&ghost).map_err(GraphError::from)?;

    debug!(
        "Audio bin: {} ! {}",
        chain.iter().map(|e| e.name()).collect::<Vec<_>>().join(" ! "),
        sink.name()
    );

    let segment_element = match &rg {
        Some((_, _, rg_convert)) => rg_convert.clone(),
        None => queue.clone(),
    };

    let stages = AudioStages {
        queue,
        rg_volume: rg.as_ref().map(|(v, _, _)| v.clone()),
        rg_limiter: rg.as_ref().map(|(_, l, _)| l.clone()),
        eq_preamp: eq.as_ref().map(|(p, _)| p.clone()),
        equalizer: eq.map(|(_, e)| e),
        panorama,
        volume,
        sink,
        segment_element,
    };
    Ok((bin, stages))
}

/// Time-based queue settings; buffering messages only with a real duration
pub fn queue_config(config: &PipelineConfig) -> QueueConfig {
    QueueConfig::time_based(config.buffer_duration_ns, config.buffer_min_fill)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonance_graph::SinkConfig;

    /// Factory when every plugin the full chain needs is installed
    fn elements() -> Option<ElementFactory> {
        sonance_graph::init().unwrap();
        let factory = ElementFactory::new();
        let complete = ElementKind::ALL.iter().all(|k| factory.is_available(*k))
            && gst::ElementFactory::find("fakesink").is_some();
        complete.then_some(factory)
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            sink: SinkConfig::Null { sync: false },
            ..PipelineConfig::default()
        }
    }

    fn full_config() -> PipelineConfig {
        let mut config = PipelineConfig {
            equalizer_enabled: true,
            stereo_balancer_enabled: true,
            ..config()
        };
        config.replaygain.enabled = true;
        config
    }

    /// Kinds along the links, starting at the queue
    fn linked_kinds(stages: &AudioStages) -> Vec<ElementKind> {
        let mut kinds = Vec::new();
        let mut current = Some(stages.queue.as_gst().clone());
        while let Some(element) = current {
            let factory = element
                .factory()
                .map(|f| f.name().to_string())
                .unwrap_or_default();
            kinds.push(ElementKind::from_factory_name(&factory).unwrap_or(ElementKind::Sink));
            current = element
                .static_pad("src")
                .and_then(|pad| pad.peer())
                .and_then(|peer| peer.parent_element());
        }
        kinds
    }

    #[test]
    fn test_minimal_chain() {
        let Some(elements) = elements() else {
            return;
        };
        let config = PipelineConfig {
            volume_enabled: false,
            ..config()
        };
        let (bin, stages) = build_audio_bin(&elements, &ElementNames::default(), &config).unwrap();
        assert_eq!(
            linked_kinds(&stages),
            vec![ElementKind::Queue, ElementKind::AudioConvert, ElementKind::Sink]
        );
        assert!(stages.volume.is_none());
        assert_eq!(stages.segment_element.kind(), ElementKind::Queue);

        let ghost = bin.static_pad("sink").unwrap();
        let target = ghost.downcast::<gst::GhostPad>().unwrap().target().unwrap();
        assert_eq!(target, stages.queue.sink_pad().unwrap());
    }

    #[test]
    fn test_full_chain_order() {
        let Some(elements) = elements() else {
            return;
        };
        let (_bin, stages) =
            build_audio_bin(&elements, &ElementNames::default(), &full_config()).unwrap();
        assert_eq!(
            linked_kinds(&stages),
            vec![
                ElementKind::Queue,
                ElementKind::ReplayGainVolume,
                ElementKind::ReplayGainLimiter,
                ElementKind::AudioConvert,
                ElementKind::Volume,
                ElementKind::Equalizer,
                ElementKind::Panorama,
                ElementKind::Volume,
                ElementKind::AudioConvert,
                ElementKind::Sink,
            ]
        );
        // Segment start is read behind the replaygain converter
        assert_eq!(stages.segment_element.kind(), ElementKind::AudioConvert);
        assert_eq!(stages.queue_name(), "queue2-1");
    }

    #[test]
    fn test_incomplete_optional_chains_skipped() {
        let Some(elements) = elements() else {
            return;
        };
        elements.set_available(ElementKind::ReplayGainLimiter, false);
        elements.set_available(ElementKind::Equalizer, false);
        let (_bin, stages) =
            build_audio_bin(&elements, &ElementNames::default(), &full_config()).unwrap();
        assert_eq!(
            linked_kinds(&stages),
            vec![
                ElementKind::Queue,
                ElementKind::Panorama,
                ElementKind::Volume,
                ElementKind::AudioConvert,
                ElementKind::Sink,
            ]
        );
        assert!(stages.rg_volume.is_none());
        assert!(stages.equalizer.is_none());
        assert_eq!(stages.segment_element.kind(), ElementKind::Queue);
    }

    #[test]
    fn test_missing_required_element() {
        sonance_graph::init().unwrap();
        for kind in [ElementKind::Queue, ElementKind::AudioConvert, ElementKind::Sink] {
            let elements = ElementFactory::without(&[kind]);
            let result = build_audio_bin(&elements, &ElementNames::default(), &config());
            assert!(
                matches!(result, Err(PipelineError::MissingElement(name)) if name == kind.factory_name())
            );
        }
    }

    #[test]
    fn test_stage_configuration() {
        let Some(elements) = elements() else {
            return;
        };
        let mut config = full_config();
        config.replaygain.mode = ReplayGainMode::Album;
        config.replaygain.preamp_db = 6.0;
        config.replaygain.compression = false;
        config.buffer_duration_ns = 0;
        config.buffer_min_fill = 20;

        let (_bin, stages) = build_audio_bin(&elements, &ElementNames::default(), &config).unwrap();

        let queue = stages.queue.queue_config().unwrap();
        assert_eq!(queue.low_percent, 20);
        assert!(!queue.use_buffering);

        let rg = stages.rg_volume.as_ref().unwrap().replaygain().unwrap();
        assert!(rg.album_mode);
        assert_eq!(rg.pre_amp_db, 6.0);
        assert!(!stages.rg_limiter.as_ref().unwrap().limiter_enabled().unwrap());
        assert!(!stages.sink.as_gst().property::<bool>("sync"));

        let gains = stages.equalizer.as_ref().unwrap().equalizer_gains().unwrap();
        assert!(gains.iter().all(|g| *g == 0.0));
    }
}
