//! Element States
//!
//! A playbin moves through the states one step at a time:
//!
//! ```text
//! Null ⇄ Ready ⇄ Paused ⇄ Playing
//! ```
//!
//! Ready → Paused is asynchronous: it completes once the first buffer (or
//! end of stream) reaches the sink.

use gstreamer as gst;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum State {
    /// No pending state
    VoidPending,
    Null,
    Ready,
    Paused,
    Playing,
}

impl State {
    /// Paused or Playing
    pub fn is_active(self) -> bool {
        matches!(self, State::Paused | State::Playing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            State::VoidPending => "VOID_PENDING",
            State::Null => "NULL",
            State::Ready => "READY",
            State::Paused => "PAUSED",
            State::Playing => "PLAYING",
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<gst::State> for State {
    fn from(state: gst::State) -> Self {
        match state {
            gst::State::Null => State::Null,
            gst::State::Ready => State::Ready,
            gst::State::Paused => State::Paused,
            gst::State::Playing => State::Playing,
            _ => State::VoidPending,
        }
    }
}

impl From<State> for gst::State {
    fn from(state: State) -> Self {
        match state {
            State::VoidPending => gst::State::VoidPending,
            State::Null => gst::State::Null,
            State::Ready => gst::State::Ready,
            State::Paused => gst::State::Paused,
            State::Playing => gst::State::Playing,
        }
    }
}

/// Outcome of a state change request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateChangeReturn {
    Failure,
    Success,
    /// The change continues in the background
    Async,
    /// Success, but the element cannot preroll (live source)
    NoPreroll,
}

impl StateChangeReturn {
    pub fn is_failure(self) -> bool {
        self == StateChangeReturn::Failure
    }
}

impl From<Result<gst::StateChangeSuccess, gst::StateChangeError>> for StateChangeReturn {
    fn from(result: Result<gst::StateChangeSuccess, gst::StateChangeError>) -> Self {
        match result {
            Ok(gst::StateChangeSuccess::Success) => StateChangeReturn::Success,
            Ok(gst::StateChangeSuccess::Async) => StateChangeReturn::Async,
            Ok(gst::StateChangeSuccess::NoPreroll) => StateChangeReturn::NoPreroll,
            Err(_) => StateChangeReturn::Failure,
        }
    }
}
