//! Playbin
//!
//! The [`Playbin`] trait is the control surface the pipeline drives;
//! [`GstPlaybin`] implements it on GStreamer's `playbin`, restricted to
//! audio:
//!
//! ```text
//!  playbin ── "about-to-finish" ──▶ AboutToFinishCallback   (streaming thread)
//!          ── "source-setup"    ──▶ SourceSetupCallback     (streaming thread)
//!          ── audio-sink ghost "sink" linked ──▶ PadAddedCallback(peer)
//!          ── bus sync handler ──▶ Message::from_gst ──▶ SyncHandler
//! ```
//!
//! Rust pattern: every handler id is kept with the object it was connected
//! on, so `disconnect_all` can detach the pipeline before the playbin goes
//! to Null.

use std::sync::Arc;
use std::time::Duration;

use gstreamer as gst;
use gstreamer::glib;
use gstreamer::prelude::*;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{GraphError, GraphResult};
use crate::message::{BusSyncReply, Message};
use crate::state::{State, StateChangeReturn};

pub type AboutToFinishCallback = Arc<dyn Fn() + Send + Sync>;
pub type PadAddedCallback = Arc<dyn Fn(&gst::Pad) + Send + Sync>;
pub type SourceSetupCallback = Arc<dyn Fn(&mut SourceInfo) + Send + Sync>;
pub type SyncHandler = Box<dyn Fn(&Message) -> BusSyncReply + Send + Sync>;

/// Source element settings, adjustable from the source-setup callback
///
/// Settings the source element has no property for are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceInfo {
    pub uri: String,
    /// Device for device-backed sources (e.g. an optical drive)
    pub device: Option<String>,
    /// User agent for network sources
    pub user_agent: Option<String>,
    pub ssl_strict: Option<bool>,
}

/// Result of [`Playbin::get_state`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateQuery {
    pub result: StateChangeReturn,
    pub current: State,
    pub pending: State,
}

/// Control surface of a playback graph
pub trait Playbin: Send + Sync {
    /// Name used as the `src` of the playbin's own messages
    fn name(&self) -> String;

    fn set_uri(&self, uri: &str);

    fn uri(&self) -> String;

    /// Install the audio bin; only allowed below Paused
    fn set_audio_sink(&self, bin: &gst::Bin) -> GraphResult<()>;

    fn set_state(&self, state: State) -> StateChangeReturn;

    fn get_state(&self, timeout: Duration) -> StateQuery;

    /// Flushing seek to a stream position
    fn seek_simple(&self, position_ns: u64) -> bool;

    fn query_position(&self) -> Option<u64>;

    fn query_duration(&self) -> Option<u64>;

    /// Finish the stream at the audio bin's input
    fn send_eos(&self) -> bool;

    /// Every handled bus message goes through `handler` on the posting thread
    fn set_sync_handler(&self, handler: SyncHandler);

    fn connect_about_to_finish(&self, callback: AboutToFinishCallback);

    /// Called with the upstream pad once the audio sink is linked
    fn connect_pad_added(&self, callback: PadAddedCallback);

    fn connect_source_setup(&self, callback: SourceSetupCallback);

    /// Remove every connected callback and the bus sync handler
    fn disconnect_all(&self);
}

pub struct GstPlaybin {
    playbin: gst::Element,
    audio_sink: Mutex<Option<gst::Bin>>,
    handlers: Mutex<Vec<(gst::Object, glib::SignalHandlerId)>>,
}

impl GstPlaybin {
    /// Audio-only playbin named `name`
    pub fn new(name: &str) -> GraphResult<Self> {
        crate::init()?;
        let playbin = gst::ElementFactory::make("playbin")
            .name(name)
            .build()
            .map_err(|_| GraphError::ElementUnavailable("playbin".into()))?;

        let flags_error = || GraphError::InvalidConfiguration("playbin flags".into());
        let flags = playbin.property_value("flags");
        let class = glib::FlagsClass::with_type(flags.type_()).ok_or_else(flags_error)?;
        let audio_only = class
            .builder_with_value(flags)
            .ok_or_else(flags_error)?
            .set_by_nick("audio")
            .unset_by_nick("video")
            .build()
            .ok_or_else(flags_error)?;
        playbin.set_property_from_value("flags", &audio_only);

        Ok(Self {
            playbin,
            audio_sink: Mutex::new(None),
            handlers: Mutex::new(Vec::new()),
        })
    }

    pub fn element(&self) -> &gst::Element {
        &self.playbin
    }

    fn audio_sink_pad(&self) -> Option<gst::Pad> {
        self.audio_sink
            .lock()
            .as_ref()
            .and_then(|bin| bin.static_pad("sink"))
    }

    fn keep_handler(&self, object: gst::Object, id: glib::SignalHandlerId) {
        self.handlers.lock().push((object, id));
    }
}

impl std::fmt::Debug for GstPlaybin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GstPlaybin")
            .field("name", &self.playbin.name())
            .finish_non_exhaustive()
    }
}

impl Playbin for GstPlaybin {
    fn name(&self) -> String {
        self.playbin.name().to_string()
    }

    fn set_uri(&self, uri: &str) {
        self.playbin.set_property("uri", uri);
    }

    fn uri(&self) -> String {
        self.playbin
            .property::<Option<String>>("uri")
            .unwrap_or_default()
    }

    fn set_audio_sink(&self, bin: &gst::Bin) -> GraphResult<()> {
        let (_, current, _) = self.playbin.state(gst::ClockTime::ZERO);
        if current >= gst::State::Paused {
            return Err(GraphError::InvalidConfiguration(
                "audio sink changed while running".into(),
            ));
        }
        self.playbin
            .set_property("audio-sink", bin.upcast_ref::<gst::Element>());
        *self.audio_sink.lock() = Some(bin.clone());
        Ok(())
    }

    fn set_state(&self, state: State) -> StateChangeReturn {
        self.playbin.set_state(state.into()).into()
    }

    fn get_state(&self, timeout: Duration) -> StateQuery {
        let timeout = gst::ClockTime::from_nseconds(timeout.as_nanos() as u64);
        let (result, current, pending) = self.playbin.state(timeout);
        StateQuery {
            result: result.into(),
            current: current.into(),
            pending: pending.into(),
        }
    }

    fn seek_simple(&self, position_ns: u64) -> bool {
        self.playbin
            .seek_simple(
                gst::SeekFlags::FLUSH,
                gst::ClockTime::from_nseconds(position_ns),
            )
            .is_ok()
    }

    fn query_position(&self) -> Option<u64> {
        self.playbin
            .query_position::<gst::ClockTime>()
            .map(gst::ClockTime::nseconds)
    }

    fn query_duration(&self) -> Option<u64> {
        self.playbin
            .query_duration::<gst::ClockTime>()
            .map(gst::ClockTime::nseconds)
    }

    fn send_eos(&self) -> bool {
        match self.audio_sink_pad() {
            Some(pad) => pad.send_event(gst::event::Eos::new()),
            None => false,
        }
    }

    fn set_sync_handler(&self, handler: SyncHandler) {
        let Some(bus) = self.playbin.bus() else {
            warn!("{}: no bus", self.playbin.name());
            return;
        };
        bus.set_sync_handler(move |_bus, message| match Message::from_gst(message) {
            Some(message) => handler(&message).into(),
            None => gst::BusSyncReply::Drop,
        });
    }

    fn connect_about_to_finish(&self, callback: AboutToFinishCallback) {
        let id = self.playbin.connect("about-to-finish", false, move |_| {
            callback();
            None
        });
        self.keep_handler(self.playbin.clone().upcast(), id);
    }

    fn connect_pad_added(&self, callback: PadAddedCallback) {
        let Some(pad) = self.audio_sink_pad() else {
            warn!("{}: pad callback before the audio sink", self.playbin.name());
            return;
        };
        let id = pad.connect_linked(move |_pad, peer| callback(peer));
        self.keep_handler(pad.upcast(), id);
    }

    fn connect_source_setup(&self, callback: SourceSetupCallback) {
        let id = self.playbin.connect("source-setup", false, move |values| {
            let source = values.get(1).and_then(|v| v.get::<gst::Element>().ok())?;
            let mut info = SourceInfo {
                uri: source
                    .dynamic_cast_ref::<gst::URIHandler>()
                    .and_then(|handler| handler.uri())
                    .map(|uri| uri.to_string())
                    .unwrap_or_default(),
                ..SourceInfo::default()
            };
            callback(&mut info);
            apply_source_info(&source, &info);
            None
        });
        self.keep_handler(self.playbin.clone().upcast(), id);
    }

    fn disconnect_all(&self) {
        for (object, id) in self.handlers.lock().drain(..) {
            object.disconnect(id);
        }
        if let Some(bus) = self.playbin.bus() {
            bus.unset_sync_handler();
        }
    }
}

fn has_property_of<T: StaticType>(element: &gst::Element, name: &str) -> bool {
    element
        .find_property(name)
        .is_some_and(|p| p.value_type() == T::static_type())
}

/// Copy the settings onto the source element where it takes them
fn apply_source_info(source: &gst::Element, info: &SourceInfo) {
    if let Some(device) = &info.device {
        if has_property_of::<String>(source, "device") {
            source.set_property("device", device);
        }
    }
    if let Some(user_agent) = &info.user_agent {
        if has_property_of::<String>(source, "user-agent") {
            source.set_property("user-agent", user_agent);
        }
    }
    if let Some(strict) = info.ssl_strict {
        if has_property_of::<bool>(source, "ssl-strict") {
            source.set_property("ssl-strict", strict);
        }
    }
    debug!("Source {} set up for {}", source.name(), info.uri);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playbin() -> Option<GstPlaybin> {
        gst::init().unwrap();
        gst::ElementFactory::find("playbin")?;
        Some(GstPlaybin::new("playbin-test").unwrap())
    }

    #[test]
    fn test_audio_only_flags() {
        let Some(playbin) = playbin() else {
            return;
        };
        let flags = playbin.element().property_value("flags");
        let class = glib::FlagsClass::with_type(flags.type_()).unwrap();
        assert!(class.is_set_by_nick(&flags, "audio"));
        assert!(!class.is_set_by_nick(&flags, "video"));
    }

    #[test]
    fn test_uri_and_state_query() {
        let Some(playbin) = playbin() else {
            return;
        };
        assert_eq!(playbin.name(), "playbin-test");
        playbin.set_uri("file:///music/a.flac");
        assert_eq!(playbin.uri(), "file:///music/a.flac");

        let query = playbin.get_state(Duration::from_millis(10));
        assert_eq!(query.current, State::Null);
        assert!(playbin.query_position().is_none());
        assert!(!playbin.send_eos());
    }

    #[test]
    fn test_pad_callback_needs_audio_sink() {
        let Some(playbin) = playbin() else {
            return;
        };
        playbin.connect_pad_added(Arc::new(|_pad: &gst::Pad| {}));
        assert!(playbin.handlers.lock().is_empty());

        let bin = gst::Bin::with_name("audiobin");
        let queue = gst::ElementFactory::make("queue").build().unwrap();
        bin.add(&queue).unwrap();
        let ghost = gst::GhostPad::with_target(&queue.static_pad("sink").unwrap()).unwrap();
        bin.add_pad(&ghost).unwrap();
        playbin.set_audio_sink(&bin).unwrap();

        playbin.connect_pad_added(Arc::new(|_pad: &gst::Pad| {}));
        playbin.connect_about_to_finish(Arc::new(|| {}));
        assert_eq!(playbin.handlers.lock().len(), 2);
        playbin.disconnect_all();
        assert!(playbin.handlers.lock().is_empty());
    }

    #[test]
    fn test_source_settings_skip_missing_properties() {
        gst::init().unwrap();
        let source = gst::ElementFactory::make("fakesrc").build().unwrap();
        apply_source_info(
            &source,
            &SourceInfo {
                uri: "cdda://1".into(),
                device: Some("/dev/cdrom".into()),
                user_agent: Some("sonance".into()),
                ssl_strict: Some(false),
            },
        );
    }
}
