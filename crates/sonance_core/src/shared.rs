//! State shared between a pipeline's owner thread and graph threads
//!
//! Pad watchers, about-to-finish and source-setup run on playbin threads. What
//! they read or change lives here: the track URLs and offsets behind one
//! mutex, flags in atomics, signals and runtime events sent on channels.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam_channel::Sender;
use gstreamer as gst;
use parking_lot::Mutex;
use sonance_graph::{Segment, SourceInfo};
use tracing::debug;

use crate::consumer::ConsumerRegistry;
use crate::message::{PipelineSignal, RuntimeEvent};

/// Current track and the pending next one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TrackState {
    pub stream_url: String,
    pub original_url: String,
    /// Stream time where the current track ends; <= 0 plays to the end
    pub end_offset_ns: i64,
    pub next_stream_url: String,
    pub next_original_url: String,
    pub next_beginning_offset_ns: i64,
    pub next_end_offset_ns: i64,
    /// The collaborator's seek to the segment already playing is skipped
    pub ignore_next_seek: bool,
    /// End of stream already reported for the current end offset
    pub end_reported: bool,
}

impl TrackState {
    pub fn has_next_valid_url(&self) -> bool {
        !self.next_stream_url.is_empty()
    }

    /// The next track continues the current resource where it ends
    pub fn next_continues_current(&self) -> bool {
        self.has_next_valid_url()
            && self.next_stream_url == self.stream_url
            && self.next_beginning_offset_ns == self.end_offset_ns
    }

    pub fn clear_next(&mut self) {
        self.next_stream_url.clear();
        self.next_original_url.clear();
        self.next_beginning_offset_ns = 0;
        self.next_end_offset_ns = 0;
    }

    /// Make the next track current
    pub fn promote_next(&mut self) {
        self.stream_url = std::mem::take(&mut self.next_stream_url);
        self.original_url = std::mem::take(&mut self.next_original_url);
        self.end_offset_ns = self.next_end_offset_ns;
        self.end_reported = false;
        self.clear_next();
    }
}

/// Source element settings applied at source setup
#[derive(Debug, Clone, Default)]
pub(crate) struct SourceSettings {
    pub device: Option<String>,
    pub user_agent: String,
}

pub(crate) struct PipelineShared {
    pub id: u32,
    pub track: Mutex<TrackState>,
    /// about-to-finish already handed the next URL to the playbin
    pub next_uri_set: AtomicBool,
    pub consumers: ConsumerRegistry,
    signals: Sender<PipelineSignal>,
    events: Sender<RuntimeEvent>,
    segment_start: AtomicU64,
    segment_start_received: AtomicBool,
    /// Last segment seen on the playbin's output pad, position included
    pub last_segment: Mutex<Segment>,
    /// Output pad of the playbin and the id of its watch
    pub playbin_watch: Mutex<Option<(gst::Pad, gst::PadProbeId)>>,
    /// The last buffer's format could not be converted for consumers
    pub unsupported_format: AtomicBool,
    pub source: Mutex<SourceSettings>,
}

impl PipelineShared {
    pub fn new(
        id: u32,
        signals: Sender<PipelineSignal>,
        events: Sender<RuntimeEvent>,
        source: SourceSettings,
    ) -> Self {
        Self {
            id,
            track: Mutex::new(TrackState::default()),
            next_uri_set: AtomicBool::new(false),
            consumers: ConsumerRegistry::new(),
            signals,
            events,
            segment_start: AtomicU64::new(0),
            segment_start_received: AtomicBool::new(false),
            last_segment: Mutex::new(Segment::default()),
            playbin_watch: Mutex::new(None),
            unsupported_format: AtomicBool::new(false),
            source: Mutex::new(source),
        }
    }

    pub fn emit(&self, signal: PipelineSignal) {
        if self.signals.send(signal).is_err() {
            debug!("Pipeline {}: signal receiver gone", self.id);
        }
    }

    pub fn post(&self, event: RuntimeEvent) {
        // The receiver lives as long as the pipeline; a failed send means
        // the pipeline is being dropped
        let _ = self.events.send(event);
    }

    pub fn next_uri_set(&self) -> bool {
        self.next_uri_set.load(Ordering::Acquire)
    }

    pub fn set_next_uri_set(&self, value: bool) {
        self.next_uri_set.store(value, Ordering::Release);
    }

    pub fn segment_start(&self) -> u64 {
        self.segment_start.load(Ordering::Acquire)
    }

    /// Record the first segment start; later calls are ignored
    pub fn record_segment_start(&self, start: u64) -> bool {
        if self.segment_start_received.load(Ordering::Acquire) {
            return false;
        }
        self.segment_start.store(start, Ordering::Release);
        self.segment_start_received.store(true, Ordering::Release);
        true
    }

    /// Fill in the source settings for a source being set up
    pub fn apply_source_settings(&self, info: &mut SourceInfo) {
        let source = self.source.lock();
        if let Some(device) = &source.device {
            if !device.is_empty() {
                info.device = Some(device.clone());
            }
        }
        info.user_agent = Some(source.user_agent.clone());
        info.ssl_strict = Some(false);
    }
}
