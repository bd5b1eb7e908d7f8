//! Owner-thread event loop
//!
//! Graph threads only enqueue [`RuntimeEvent`]s. The owner drains them
//! here, together with the fader tick and the fudge timer:
//!
//! ```text
//! RuntimeEvent ──▶ handle_event ──┬─ Message      ──▶ per-type handler
//!                                 ├─ PadAdded     ──▶ connected, pending seek
//!                                 ├─ SourceSetup  ──▶ end buffering
//!                                 └─ Discovered   ──▶ MetadataFound
//! timers ──▶ fader tick (40 ms) ──▶ fudge timer ──▶ FaderFinished
//! ```

use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use gstreamer as gst;
use gstreamer::prelude::GstObjectExt;
use sonance_graph::{
    DiscovererInfo, DiscovererResult, ErrorDomain, Message, MessageKind, State, TagList,
};
use tracing::{debug, error, info};

use super::{OutputStream, Pipeline};
use crate::fader::{FADER_FUDGE, FADER_SHORT_FUDGE, FADER_TICK};
use crate::message::{PipelineSignal, RuntimeEvent};
use crate::metadata::MetaBundle;

/// Debug text of the error that accompanies a stream redirect
const REDIRECT_ERROR_TEXT: &str =
    "A redirect message was posted on the bus and should have been handled by the application.";

impl Pipeline {
    /// Handle every queued event and due timer without blocking
    ///
    /// Returns the number of events handled.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        self.run_timers(Instant::now());
        handled
    }

    /// Wait up to `timeout` for an event, then handle everything pending
    ///
    /// Returns early when a fader tick or the fudge timer is due.
    pub fn dispatch_timeout(&mut self, timeout: Duration) -> usize {
        let now = Instant::now();
        let wait = match self.next_timer_deadline() {
            Some(deadline) => timeout.min(deadline.saturating_duration_since(now)),
            None => timeout,
        };

        let mut handled = 0;
        match self.events.recv_timeout(wait) {
            Ok(event) => {
                self.handle_event(event);
                handled += 1;
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {}
        }
        handled + self.dispatch_pending()
    }

    fn handle_event(&mut self, event: RuntimeEvent) {
        match event {
            RuntimeEvent::Message(message) => self.handle_message(message),
            RuntimeEvent::PadAdded(pad) => {
                debug!("Pipeline {}: connected through {}", self.id(), pad.name());
                self.connected = true;
                if self.initialized {
                    self.replay_pending_seek();
                }
            }
            RuntimeEvent::SourceSetup => {
                if self.buffering {
                    self.buffering = false;
                    self.shared.emit(PipelineSignal::BufferingFinished {
                        pipeline_id: self.id(),
                    });
                    self.set_state(State::Playing);
                }
            }
            RuntimeEvent::Discovered(info) => self.stream_discovered(&info),
        }
    }

    fn handle_message(&mut self, message: Message) {
        debug!(
            "Pipeline {}: bus message {} from {}",
            self.id(),
            message.type_name(),
            message.src
        );
        match &message.kind {
            MessageKind::Eos => self.shared.emit(PipelineSignal::EndOfStreamReached {
                pipeline_id: self.id(),
                has_next_track: false,
            }),
            MessageKind::Tag(tags) => self.tags_received(tags),
            MessageKind::Error {
                domain,
                code,
                message: text,
                debug_info,
            } => self.error_received(*domain, *code, text, debug_info),
            MessageKind::Element { name, .. } if name == "redirect" => {
                if let Some(location) = message.field("new-location") {
                    info!("Pipeline {}: redirected to {}", self.id(), location);
                    self.redirect_url = Some(location.to_string());
                }
            }
            MessageKind::StateChanged { old, new, .. } => {
                let from_playbin = self
                    .playbin
                    .as_ref()
                    .is_some_and(|p| p.name() == message.src);
                if from_playbin {
                    self.state_changed(*old, *new);
                }
            }
            MessageKind::Buffering(percent) => {
                let from_queue = self
                    .stages
                    .as_ref()
                    .is_some_and(|s| s.queue_name() == message.src);
                if from_queue {
                    self.buffering_received(*percent);
                }
            }
            MessageKind::StreamStart { group_id } => self.stream_started(*group_id),
            MessageKind::Element { .. } | MessageKind::StreamStatus { .. } => {}
        }
    }

    /// Every tag message is reported, even one without known tags
    fn tags_received(&self, tags: &TagList) {
        let bundle = {
            let track = self.shared.track.lock();
            MetaBundle::from_tags(tags, &track.original_url, &track.stream_url)
        };
        self.shared.emit(PipelineSignal::MetadataFound {
            pipeline_id: self.id(),
            bundle,
        });
    }

    fn error_received(&mut self, domain: ErrorDomain, code: i32, message: &str, debug_info: &str) {
        let next_track_failed = matches!(domain, ErrorDomain::Resource | ErrorDomain::Stream)
            && self.initialized
            && self.shared.next_uri_set()
            && self.state() == State::Playing;
        if next_track_failed {
            // The current track keeps playing; it still needs an end
            debug!("Pipeline {}: ignoring error when loading next track", self.id());
            if let Some(playbin) = &self.playbin {
                playbin.send_eos();
            }
            return;
        }

        if self.redirect_url.is_some() && debug_info.contains(REDIRECT_ERROR_TEXT) {
            return;
        }

        error!("Pipeline {}: {} ({})", self.id(), message, debug_info);
        self.shared.emit(PipelineSignal::Error {
            pipeline_id: self.id(),
            message: message.to_string(),
            domain: domain.code(),
            code,
        });
    }

    fn state_changed(&mut self, old: State, new: State) {
        debug!("Pipeline {}: state {} -> {}", self.id(), old, new);

        // Whatever reaches the sink after this starts a fresh stream
        if matches!(new, State::Ready | State::Null) {
            self.output_stream = OutputStream::NotStarted;
        }

        if !self.initialized && new.is_active() {
            self.initialized = true;
            if self.connected {
                self.replay_pending_seek();
            }
        }

        if self.initialized && !new.is_active() {
            self.initialized = false;

            if self.shared.next_uri_set() && new == State::Ready {
                // A seek arrived after the hand-over: go back to the current track
                self.shared.set_next_uri_set(false);
                let stream_url = self.shared.track.lock().stream_url.clone();
                if let Some(playbin) = &self.playbin {
                    playbin.set_uri(&stream_url);
                }
                self.set_state(State::Playing);
                if let Some(discovery) = &self.discovery {
                    discovery.request(&stream_url);
                }
            }
        }
    }

    fn buffering_received(&mut self, percent: i32) {
        let id = self.id();
        if percent == 0 && !self.buffering && self.state() == State::Playing {
            self.buffering = true;
            self.shared.emit(PipelineSignal::BufferingStarted { pipeline_id: id });
            self.set_state(State::Paused);
        } else if percent == 100 && self.buffering {
            self.buffering = false;
            self.shared.emit(PipelineSignal::BufferingFinished { pipeline_id: id });
            self.set_state(State::Playing);
        } else if self.buffering {
            self.shared.emit(PipelineSignal::BufferingProgress {
                pipeline_id: id,
                percent,
            });
        }
    }

    /// A stream reached the sink
    ///
    /// Only a stream following the one already playing is the handed-over
    /// next track. The first stream after (re)starting is the current one,
    /// even when about-to-finish already fired during its preroll.
    fn stream_started(&mut self, group_id: Option<gst::GroupId>) {
        let previous = std::mem::replace(&mut self.output_stream, OutputStream::Started(group_id));
        match previous {
            OutputStream::NotStarted => {
                debug!("Pipeline {}: first stream started", self.id());
                return;
            }
            OutputStream::Started(current) if group_id.is_some() && current == group_id => {
                return;
            }
            OutputStream::Started(_) => {}
        }
        if !self.shared.next_uri_set() {
            debug!("Pipeline {}: new stream without a next track", self.id());
            return;
        }
        self.shared.set_next_uri_set(false);
        let stream_url = {
            let mut track = self.shared.track.lock();
            track.promote_next();
            track.stream_url.clone()
        };
        info!("Pipeline {}: now playing {}", self.id(), stream_url);
        self.shared.emit(PipelineSignal::EndOfStreamReached {
            pipeline_id: self.id(),
            has_next_track: true,
        });
    }

    fn replay_pending_seek(&mut self) {
        if let Some(position) = self.pending_seek {
            debug!("Pipeline {}: replaying seek to {} ns", self.id(), position);
            self.seek(position);
        }
    }

    fn stream_discovered(&self, info: &DiscovererInfo) {
        if info.result != DiscovererResult::Ok {
            error!(
                "Stream discovery for {} failed: {}",
                info.uri,
                info.result.message()
            );
            return;
        }
        let Some(audio) = &info.audio else {
            error!("Could not detect an audio stream in {}", info.uri);
            return;
        };

        let url = {
            let track = self.shared.track.lock();
            if info.uri == track.stream_url {
                track.original_url.clone()
            } else if info.uri == track.next_stream_url {
                track.next_original_url.clone()
            } else {
                String::new()
            }
        };
        let bundle = MetaBundle::from_stream_info(audio, &url, &info.uri);
        info!(
            "Got stream info for {}: {}",
            info.uri, audio.codec_description
        );
        self.shared.emit(PipelineSignal::MetadataFound {
            pipeline_id: self.id(),
            bundle,
        });
    }

    // --- Timers --------------------------------------------------------

    fn next_timer_deadline(&self) -> Option<Instant> {
        let tick = self.fader.as_ref().and(self.fader_next_tick);
        match (tick, self.fudge_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub(super) fn run_timers(&mut self, now: Instant) {
        let tick_due = self.fader_next_tick.is_some_and(|tick| now >= tick);
        if tick_due {
            if let Some(fader) = &self.fader {
                let value = fader.value(now);
                let finished = fader.is_finished(now);
                self.set_volume_modifier(value);

                if finished {
                    self.fader = None;
                    self.fader_next_tick = None;
                    let delay = if self.use_fudge_timer {
                        FADER_FUDGE
                    } else {
                        FADER_SHORT_FUDGE
                    };
                    self.fudge_deadline = Some(now + delay);
                } else {
                    self.fader_next_tick = Some(now + FADER_TICK);
                }
            } else {
                self.fader_next_tick = None;
            }
        }

        if self.fudge_deadline.is_some_and(|deadline| now >= deadline) {
            self.fudge_deadline = None;
            self.shared.emit(PipelineSignal::FaderFinished {
                pipeline_id: self.id(),
            });
        }
    }
}
