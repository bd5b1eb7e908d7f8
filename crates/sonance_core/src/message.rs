//! Message Types for Thread Communication
//!
//! Signals flow from a pipeline to the collaborator through the factory's
//! signal channel. Runtime events flow from graph threads (bus sync
//! handler, pad-added, discoverer) to the pipeline's owner thread.

use gstreamer as gst;
use serde::{Deserialize, Serialize};
use sonance_graph::{DiscovererInfo, Message};

use crate::metadata::MetaBundle;

/// Signals sent from a pipeline to its collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum PipelineSignal {
    /// The current track ended; `has_next_track` when playback continues
    /// gaplessly into the next one
    EndOfStreamReached { pipeline_id: u32, has_next_track: bool },

    MetadataFound { pipeline_id: u32, bundle: MetaBundle },

    Error {
        pipeline_id: u32,
        message: String,
        /// Numeric error domain, see `ErrorDomain::code`
        domain: i32,
        code: i32,
    },

    BufferingStarted { pipeline_id: u32 },

    BufferingProgress { pipeline_id: u32, percent: i32 },

    BufferingFinished { pipeline_id: u32 },

    FaderFinished { pipeline_id: u32 },
}

impl PipelineSignal {
    pub fn pipeline_id(&self) -> u32 {
        match self {
            PipelineSignal::EndOfStreamReached { pipeline_id, .. }
            | PipelineSignal::MetadataFound { pipeline_id, .. }
            | PipelineSignal::Error { pipeline_id, .. }
            | PipelineSignal::BufferingStarted { pipeline_id }
            | PipelineSignal::BufferingProgress { pipeline_id, .. }
            | PipelineSignal::BufferingFinished { pipeline_id }
            | PipelineSignal::FaderFinished { pipeline_id } => *pipeline_id,
        }
    }
}

/// Events queued for a pipeline's owner thread
#[derive(Debug, Clone)]
pub(crate) enum RuntimeEvent {
    /// A bus message, forwarded by the sync handler
    Message(Message),
    /// The playbin linked its output pad to the audio bin
    PadAdded(gst::Pad),
    /// A source element was set up; ends buffering if it was active
    SourceSetup,
    Discovered(DiscovererInfo),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_serialization() {
        let signal = PipelineSignal::EndOfStreamReached {
            pipeline_id: 3,
            has_next_track: true,
        };
        let json = serde_json::to_string(&signal).unwrap();
        assert!(json.contains("EndOfStreamReached"));
        assert!(json.contains("payload"));

        let deserialized: PipelineSignal = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, signal);
    }

    #[test]
    fn test_metadata_signal_serialization() {
        let signal = PipelineSignal::MetadataFound {
            pipeline_id: 1,
            bundle: MetaBundle {
                title: "Song".into(),
                bitrate: 320,
                ..MetaBundle::default()
            },
        };
        let json = serde_json::to_string(&signal).unwrap();
        let deserialized: PipelineSignal = serde_json::from_str(&json).unwrap();
        if let PipelineSignal::MetadataFound { bundle, .. } = deserialized {
            assert_eq!(bundle.title, "Song");
            assert_eq!(bundle.bitrate, 320);
        } else {
            panic!("Wrong variant");
        }
    }

    #[test]
    fn test_pipeline_id() {
        assert_eq!(PipelineSignal::FaderFinished { pipeline_id: 7 }.pipeline_id(), 7);
        assert_eq!(
            PipelineSignal::BufferingProgress {
                pipeline_id: 2,
                percent: 40
            }
            .pipeline_id(),
            2
        );
    }
}
