//! Sonance Core - Playback Pipeline
//!
//! This crate drives the playback graph of a music player:
//! - Audio bin building on GStreamer (queue, replaygain, equalizer, balance, volume)
//! - Pad watchers for gapless segment tracking and visualization
//! - Bus message dispatch into pipeline signals
//! - Playback state machine with pending seeks, next-track hand-over, fader
//! - Stream discovery for codec and format metadata
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Collaborator Thread                      │
//! │  PipelineFactory ──create──▶ Pipeline ──dispatch_pending()  │
//! │        ▲                        │                           │
//! │        └── signals() ◀── PipelineSignal                     │
//! └─────────────────────────────────────────────────────────────┘
//!                      │ set_state (worker pool)  ▲ RuntimeEvent
//!                      ▼                          │ crossbeam-channel
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Graph Threads                           │
//! │ playbin ──▶ output ──▶ queue2 ──▶ stages ──▶ convert ──▶ sink│
//! │               │           │                                 │
//! │        playbin watch  buffer watch ──▶ BufferConsumers      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod builder;
mod config;
mod consumer;
#[cfg(feature = "device-output")]
mod device;
mod discovery;
mod error;
mod factory;
mod fader;
mod message;
mod metadata;
mod pipeline;
mod priority;
mod shared;
mod state_pool;
mod url;
mod watch;

#[cfg(test)]
mod testing;

pub use builder::{build_audio_bin, queue_config, AudioStages};
pub use config::{default_user_agent, FactoryConfig, PipelineConfig, ReplayGainConfig, ReplayGainMode};
pub use consumer::{BufferConsumer, ConsumerRegistry, SpectrumConsumer};
#[cfg(feature = "device-output")]
pub use device::OutputDevice;
pub use error::{PipelineError, PipelineResult};
pub use factory::{ElementNames, PipelineFactory, PlaybinMaker};
pub use fader::{Easing, Fader, FaderDirection, FADER_FUDGE, FADER_SHORT_FUDGE, FADER_TICK};
pub use message::PipelineSignal;
pub use metadata::{split_title, FileType, MetaBundle, TitleSplit};
pub use pipeline::Pipeline;
pub use state_pool::{SetStatePool, StateChangeHandle};
pub use url::{fixup_url, FixedUrl};

// Re-export graph and DSP types collaborators need
pub use sonance_dsp::{find_preset, Preset, EQ_BAND_COUNT, NUM_BINS, PRESETS};
pub use sonance_graph::{
    Buffer, Caps, GstPlaybin, Playbin, SinkConfig, State, StateChangeReturn,
    NSECONDS_PER_MSECOND, NSECONDS_PER_SECOND,
};
