//! Sonance Graph - GStreamer Adapter
//!
//! The playback graph the Sonance pipeline builds and drives, on GStreamer:
//!
//! ```text
//!   playbin (flags: audio, no video)
//!  ┌───────────────────────────────────────────────────────────────────────┐
//!  │ uridecodebin ─▶ playsink ─▶ audio-sink = audio bin                    │
//!  │                            ghost "sink" ─▶ queue2 ─▶ [stages] ─▶      │
//!  │                            audioconvert ─(audio/x-raw)─▶ sink         │
//!  │                                                                       │
//!  │   Bus ◀── StateChanged, Tag, Buffering, Error, Eos, StreamStart       │
//!  └───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The rest of the workspace sees the graph through neutral types:
//! [`Message`] instead of `gst::Message`, [`Buffer`]/[`Caps`]/[`Segment`]
//! for what pad callbacks observe, [`State`] and typed stage settings
//! ([`QueueConfig`], [`ReplayGainSettings`], `EqConfig`) on [`Element`].
//!
//! # Threads
//!
//! | Thread               | Role                                           |
//! |----------------------|------------------------------------------------|
//! | GStreamer streaming  | Pad callbacks, about-to-finish, bus sync handler |
//! | `sonance-discoverer` | Stream discovery requests                      |
//!
//! Control calls ([`Playbin::set_state`], [`Playbin::seek_simple`]) may come
//! from any thread.

mod buffer;
mod discoverer;
mod element;
mod error;
mod message;
mod playbin;
mod sink;
mod state;

pub use buffer::{Buffer, Caps, Segment, NSECONDS_PER_MSECOND, NSECONDS_PER_SECOND};
pub use discoverer::{
    AudioStreamInfo, DiscoveredCallback, Discoverer, DiscovererInfo, DiscovererResult,
};
pub use element::{Element, ElementFactory, ElementKind, QueueConfig, ReplayGainSettings};
pub use error::{GraphError, GraphResult};
pub use message::{
    error_code, BusSyncReply, ErrorDomain, Message, MessageKind, StreamStatusType, TagList,
};
pub use playbin::{
    AboutToFinishCallback, GstPlaybin, PadAddedCallback, Playbin, SourceInfo,
    SourceSetupCallback, StateQuery, SyncHandler,
};
pub use sink::SinkConfig;
pub use state::{State, StateChangeReturn};

use gstreamer as gst;

/// Initialize GStreamer; safe to call more than once
pub fn init() -> GraphResult<()> {
    gst::init()?;
    Ok(())
}
