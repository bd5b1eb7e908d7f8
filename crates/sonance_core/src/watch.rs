//! Pad Watchers
//!
//! Three pad callbacks watch data on its way to the sink:
//!
//! ```text
//! playbin output ──▶ queue2 ──▶ [rg … audioconvert] ──▶ … ──▶ audiosink
//!      │               │               │
//!      │               │               └─ segment watch: first segment start
//!      │               └─ buffer watch: S16 for consumers, end-offset check
//!      └─ playbin watch: last segment and position, offset reset on flush
//! ```
//!
//! All of them run on streaming threads. Closures hold a `Weak` reference
//! to the shared state, so a dropped pipeline removes its callbacks the
//! next time they fire.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};

use gstreamer as gst;
use gstreamer::prelude::*;
use sonance_dsp::{s16_to_le_bytes, to_s16, SampleFormat};
use sonance_graph::{Buffer, Caps, Segment};
use tracing::{debug, warn};

use crate::builder::AudioStages;
use crate::message::{PipelineSignal, RuntimeEvent};
use crate::shared::PipelineShared;

/// Attach the buffer and segment watches to a freshly built bin
pub(crate) fn install_stage_watches(shared: &Arc<PipelineShared>, stages: &AudioStages) {
    match stages.queue.src_pad() {
        Some(pad) => {
            let weak = Arc::downgrade(shared);
            pad.add_probe(gst::PadProbeType::BUFFER, move |pad, info| {
                let Some(shared) = weak.upgrade() else {
                    return gst::PadProbeReturn::Remove;
                };
                if let Some(gst::PadProbeData::Buffer(buffer)) = &info.data {
                    queue_buffer(&shared, pad, buffer);
                }
                gst::PadProbeReturn::Ok
            });
        }
        None => warn!("Pipeline {}: queue has no src pad", shared.id),
    }

    if let Some(pad) = stages.segment_element.src_pad() {
        let weak = Arc::downgrade(shared);
        pad.add_probe(gst::PadProbeType::EVENT_DOWNSTREAM, move |_pad, info| {
            let Some(shared) = weak.upgrade() else {
                return gst::PadProbeReturn::Remove;
            };
            if let Some(gst::PadProbeData::Event(event)) = &info.data {
                if let gst::EventView::Segment(segment) = event.view() {
                    if let Some(segment) = Segment::from_gst(segment.segment()) {
                        segment_seen(&shared, &segment);
                    }
                }
            }
            gst::PadProbeReturn::Ok
        });
    }
}

fn queue_buffer(shared: &PipelineShared, pad: &gst::Pad, buffer: &gst::BufferRef) {
    let caps = pad.current_caps();
    match caps.as_ref().and_then(|caps| Caps::from_gst(caps)) {
        Some(caps) => {
            let buffer = Buffer::from_gst(buffer, caps, !shared.consumers.is_empty());
            buffer_passed(shared, &buffer);
        }
        None => {
            note_unsupported(shared, true, "unknown");
            check_end_offset(
                shared,
                buffer.pts().map(gst::ClockTime::nseconds),
                buffer.duration().map(gst::ClockTime::nseconds),
            );
        }
    }
}

/// Buffer for consumers: interleaved S16LE where the format allows it
pub(crate) fn convert_for_consumers(buffer: &Buffer) -> Option<Buffer> {
    let caps = buffer.caps;
    if caps.format == SampleFormat::S16LE {
        return Some(buffer.clone());
    }
    let samples = to_s16(caps.format, &buffer.data, caps.channels)?;
    let frames = if caps.channels == 0 {
        0
    } else {
        samples.len() / caps.channels
    };
    let s16_caps = Caps::new(SampleFormat::S16LE, caps.rate, caps.channels);
    Some(Buffer::new(
        s16_to_le_bytes(&samples),
        s16_caps,
        buffer.pts,
        Some(s16_caps.frames_to_ns(frames)),
    ))
}

/// Log an unsupported format once per run of such buffers
fn note_unsupported(shared: &PipelineShared, unsupported: bool, format: &str) {
    if !unsupported {
        shared.unsupported_format.store(false, Ordering::Relaxed);
    } else if !shared.unsupported_format.swap(true, Ordering::Relaxed) {
        debug!(
            "Pipeline {}: unsupported audio format for the analyzer: {}",
            shared.id, format
        );
    }
}

/// A buffer left the queue
pub(crate) fn buffer_passed(shared: &PipelineShared, buffer: &Buffer) {
    let format = buffer.caps.format.as_str();

    let converted = convert_for_consumers(buffer);
    note_unsupported(shared, converted.is_none(), format);

    if !shared.consumers.is_empty() {
        shared
            .consumers
            .deliver(converted.as_ref().unwrap_or(buffer), shared.id, format);
    }

    check_end_offset(shared, buffer.pts, buffer.duration);
}

fn check_end_offset(shared: &PipelineShared, pts: Option<u64>, duration: Option<u64>) {
    let Some(pts) = pts else {
        return;
    };

    let signal = {
        let mut track = shared.track.lock();
        if track.end_offset_ns <= 0 || track.end_reported {
            return;
        }
        let start = pts as i64 - shared.segment_start() as i64;
        let end = start + duration.unwrap_or(0) as i64;
        if end <= track.end_offset_ns {
            return;
        }

        if track.next_continues_current() {
            // Next track is the next segment of this resource: keep playing
            track.end_offset_ns = track.next_end_offset_ns;
            track.clear_next();
            track.ignore_next_seek = true;
            debug!(
                "Pipeline {}: continuing into the next segment, ends at {} ns",
                shared.id, track.end_offset_ns
            );
            PipelineSignal::EndOfStreamReached {
                pipeline_id: shared.id,
                has_next_track: true,
            }
        } else {
            track.end_reported = true;
            PipelineSignal::EndOfStreamReached {
                pipeline_id: shared.id,
                has_next_track: false,
            }
        }
    };
    shared.emit(signal);
}

pub(crate) fn segment_seen(shared: &PipelineShared, segment: &Segment) {
    if shared.record_segment_start(segment.start) {
        debug!("Pipeline {}: segment start {} ns", shared.id, segment.start);
    }
}

fn playbin_data(shared: &PipelineShared, pad: &gst::Pad, data: &gst::PadProbeData) {
    match data {
        gst::PadProbeData::Buffer(buffer) => {
            let mut segment = shared.last_segment.lock();
            let timestamp = buffer
                .pts()
                .map(gst::ClockTime::nseconds)
                .unwrap_or(segment.position);
            segment.position = timestamp + buffer.duration().map_or(0, gst::ClockTime::nseconds);
        }
        gst::PadProbeData::Event(event) => match event.view() {
            gst::EventView::Segment(segment) => {
                if let Some(segment) = Segment::from_gst(segment.segment()) {
                    *shared.last_segment.lock() = segment;
                }
            }
            // A flushing seek restarts running time at 0
            gst::EventView::FlushStart(_) => pad.set_offset(0),
            _ => {}
        },
        _ => {}
    }
}

/// The playbin linked its output to the audio bin
///
/// Runs on a streaming thread before data flows: the pad offset lines the
/// new data up with the end of what was played before.
pub(crate) fn pad_added(shared: &Arc<PipelineShared>, pad: &gst::Pad) {
    let running_time = {
        let segment = shared.last_segment.lock();
        segment.to_running_time(segment.position).unwrap_or(0)
    };
    pad.set_offset(running_time as i64);

    let mut installed = shared.playbin_watch.lock();
    if let Some((old_pad, id)) = installed.take() {
        old_pad.remove_probe(id);
    }

    let weak: Weak<PipelineShared> = Arc::downgrade(shared);
    let mask = gst::PadProbeType::BUFFER
        | gst::PadProbeType::EVENT_DOWNSTREAM
        | gst::PadProbeType::EVENT_FLUSH;
    let id = pad.add_probe(mask, move |pad, info| {
        let Some(shared) = weak.upgrade() else {
            return gst::PadProbeReturn::Remove;
        };
        if let Some(data) = &info.data {
            playbin_data(&shared, pad, data);
        }
        gst::PadProbeReturn::Ok
    });
    *installed = id.map(|id| (pad.clone(), id));
    drop(installed);

    debug!(
        "Pipeline {}: output pad {} linked, offset {} ns",
        shared.id,
        pad.name(),
        running_time
    );
    shared.post(RuntimeEvent::PadAdded(pad.clone()));
}
