//! Bus Messages
//!
//! Elements post messages on the playbin's bus from whatever thread they
//! run on. [`Message::from_gst`] turns the ones the pipeline handles into an
//! owned [`Message`]; everything else is dropped at the sync handler.
//!
//! ```text
//! streaming threads ──▶ gst::Bus ──▶ sync handler ──▶ Message::from_gst ──▶ handler
//!                                         │
//!                                         └── BusSyncReply::Drop (nothing queued)
//! ```

use gstreamer as gst;
use gstreamer::glib::error::ErrorDomain as _;
use gstreamer::prelude::*;
use serde::{Deserialize, Serialize};

use crate::state::State;

/// Error domains, mirroring where in the graph an error originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorDomain {
    Core,
    Library,
    /// Opening or reading the resource failed
    Resource,
    /// The data could not be demuxed or decoded
    Stream,
}

impl ErrorDomain {
    /// Numeric domain code carried in error signals
    pub fn code(self) -> i32 {
        match self {
            ErrorDomain::Core => 1,
            ErrorDomain::Library => 2,
            ErrorDomain::Resource => 3,
            ErrorDomain::Stream => 4,
        }
    }

    /// Domain and code of a GStreamer error; unknown domains count as core failures
    pub fn classify(error: &gst::glib::Error) -> (ErrorDomain, i32) {
        if let Some(e) = error.kind::<gst::ResourceError>() {
            (ErrorDomain::Resource, e.code())
        } else if let Some(e) = error.kind::<gst::StreamError>() {
            (ErrorDomain::Stream, e.code())
        } else if let Some(e) = error.kind::<gst::LibraryError>() {
            (ErrorDomain::Library, e.code())
        } else if let Some(e) = error.kind::<gst::CoreError>() {
            (ErrorDomain::Core, e.code())
        } else {
            (ErrorDomain::Core, error_code::FAILED)
        }
    }
}

/// Error codes within a domain
pub mod error_code {
    pub const FAILED: i32 = 1;

    pub const RESOURCE_NOT_FOUND: i32 = 3;
    pub const RESOURCE_OPEN_READ: i32 = 5;
    pub const RESOURCE_READ: i32 = 9;

    pub const STREAM_TYPE_NOT_FOUND: i32 = 6;
    pub const STREAM_DECODE: i32 = 7;
    pub const STREAM_CODEC_NOT_FOUND: i32 = 10;
}

/// Tags found in a stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagList {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub comment: Option<String>,
    pub lyrics: Option<String>,
    /// Nominal bitrate in bits per second
    pub bitrate: Option<u32>,
}

impl TagList {
    pub fn from_gst(tags: &gst::TagListRef) -> Self {
        Self {
            title: tags.get::<gst::tags::Title>().map(|v| v.get().to_string()),
            artist: tags.get::<gst::tags::Artist>().map(|v| v.get().to_string()),
            album: tags.get::<gst::tags::Album>().map(|v| v.get().to_string()),
            comment: tags.get::<gst::tags::Comment>().map(|v| v.get().to_string()),
            lyrics: tags.get::<gst::tags::Lyrics>().map(|v| v.get().to_string()),
            bitrate: tags.get::<gst::tags::Bitrate>().map(|v| v.get()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.artist.is_none()
            && self.album.is_none()
            && self.comment.is_none()
            && self.lyrics.is_none()
            && self.bitrate.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatusType {
    /// A streaming thread is about to be created
    Create,
    /// Posted from the streaming thread itself as its loop starts
    Enter,
    Leave,
    Destroy,
}

impl StreamStatusType {
    fn from_gst(status: gst::StreamStatusType) -> Option<Self> {
        match status {
            gst::StreamStatusType::Create => Some(StreamStatusType::Create),
            gst::StreamStatusType::Enter => Some(StreamStatusType::Enter),
            gst::StreamStatusType::Leave => Some(StreamStatusType::Leave),
            gst::StreamStatusType::Destroy => Some(StreamStatusType::Destroy),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageKind {
    Eos,
    Tag(TagList),
    Error {
        domain: ErrorDomain,
        code: i32,
        message: String,
        debug_info: String,
    },
    /// Element-specific structure, e.g. `redirect` with a `new-location`
    Element {
        name: String,
        fields: Vec<(String, String)>,
    },
    StateChanged {
        old: State,
        new: State,
        pending: State,
    },
    Buffering(i32),
    StreamStatus {
        status: StreamStatusType,
    },
    /// Every sink received the first data of a stream; streams played
    /// back to back carry different group ids
    StreamStart {
        group_id: Option<gst::GroupId>,
    },
}

/// A message posted on the bus by the named element
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub src: String,
    pub kind: MessageKind,
}

impl Message {
    pub fn new(src: impl Into<String>, kind: MessageKind) -> Self {
        Self {
            src: src.into(),
            kind,
        }
    }

    /// Translate a GStreamer message; `None` for types nobody handles
    pub fn from_gst(message: &gst::MessageRef) -> Option<Self> {
        use gst::MessageView;

        let kind = match message.view() {
            MessageView::Eos(_) => MessageKind::Eos,
            MessageView::Tag(tag) => MessageKind::Tag(TagList::from_gst(&tag.tags())),
            MessageView::Error(err) => {
                let error = err.error();
                let (domain, code) = ErrorDomain::classify(&error);
                MessageKind::Error {
                    domain,
                    code,
                    message: error.message().to_string(),
                    debug_info: err.debug().map(|d| d.to_string()).unwrap_or_default(),
                }
            }
            MessageView::Element(element) => {
                let structure = element.structure()?;
                MessageKind::Element {
                    name: structure.name().to_string(),
                    fields: structure
                        .iter()
                        .map(|(key, value)| (key.to_string(), field_to_string(value)))
                        .collect(),
                }
            }
            MessageView::StateChanged(changed) => MessageKind::StateChanged {
                old: changed.old().into(),
                new: changed.current().into(),
                pending: changed.pending().into(),
            },
            MessageView::Buffering(buffering) => MessageKind::Buffering(buffering.percent()),
            MessageView::StreamStatus(status) => MessageKind::StreamStatus {
                status: StreamStatusType::from_gst(status.get().0)?,
            },
            MessageView::StreamStart(start) => MessageKind::StreamStart {
                group_id: start.group_id(),
            },
            _ => return None,
        };

        let src = message
            .src()
            .map(|src| src.name().to_string())
            .unwrap_or_default();
        Some(Self::new(src, kind))
    }

    pub fn error(
        src: impl Into<String>,
        domain: ErrorDomain,
        code: i32,
        message: impl Into<String>,
        debug_info: impl Into<String>,
    ) -> Self {
        Self::new(
            src,
            MessageKind::Error {
                domain,
                code,
                message: message.into(),
                debug_info: debug_info.into(),
            },
        )
    }

    /// Redirect notice as posted by stream sources
    pub fn redirect(src: impl Into<String>, new_location: impl Into<String>) -> Self {
        Self::new(
            src,
            MessageKind::Element {
                name: "redirect".to_string(),
                fields: vec![("new-location".to_string(), new_location.into())],
            },
        )
    }

    /// Look up a field of an `Element` message
    pub fn field(&self, key: &str) -> Option<&str> {
        match &self.kind {
            MessageKind::Element { fields, .. } => fields
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind {
            MessageKind::Eos => "eos",
            MessageKind::Tag(_) => "tag",
            MessageKind::Error { .. } => "error",
            MessageKind::Element { .. } => "element",
            MessageKind::StateChanged { .. } => "state-changed",
            MessageKind::Buffering(_) => "buffering",
            MessageKind::StreamStatus { .. } => "stream-status",
            MessageKind::StreamStart { .. } => "stream-start",
        }
    }
}

fn field_to_string(value: &gst::glib::SendValue) -> String {
    value
        .get::<String>()
        .ok()
        .or_else(|| value.serialize().ok().map(|s| s.to_string()))
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusSyncReply {
    /// Queue the message on the bus
    Pass,
    /// The handler consumed the message
    Drop,
}

impl From<BusSyncReply> for gst::BusSyncReply {
    fn from(reply: BusSyncReply) -> Self {
        match reply {
            BusSyncReply::Pass => gst::BusSyncReply::Pass,
            BusSyncReply::Drop => gst::BusSyncReply::Drop,
        }
    }
}
