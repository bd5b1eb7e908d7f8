//! Stream Discoverer
//!
//! Looks up codec and format details off the playback path with
//! `gstreamer-pbutils`. Requests go through a bounded queue to one worker
//! thread that owns a synchronous `gst_pbutils::Discoverer`; the timeout
//! bounds each lookup.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Sender, TrySendError};
use gstreamer as gst;
use gstreamer_pbutils as gst_pbutils;
use gstreamer_pbutils::prelude::*;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{GraphError, GraphResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscovererResult {
    Ok,
    UriInvalid,
    Timeout,
    /// The request queue was full
    Busy,
    /// No decoder for the stream's codec
    MissingPlugins,
    Error,
}

impl DiscovererResult {
    pub fn message(self) -> &'static str {
        match self {
            DiscovererResult::Ok => "Discovery succeeded",
            DiscovererResult::UriInvalid => "The URI is invalid",
            DiscovererResult::Timeout => "The discovery timed-out",
            DiscovererResult::Busy => "The discoverer was already discovering a file",
            DiscovererResult::MissingPlugins => "Some plugins are missing for full discovery",
            DiscovererResult::Error => "An error happened and the GError is set",
        }
    }
}

impl From<gst_pbutils::DiscovererResult> for DiscovererResult {
    fn from(result: gst_pbutils::DiscovererResult) -> Self {
        match result {
            gst_pbutils::DiscovererResult::Ok => DiscovererResult::Ok,
            gst_pbutils::DiscovererResult::UriInvalid => DiscovererResult::UriInvalid,
            gst_pbutils::DiscovererResult::Timeout => DiscovererResult::Timeout,
            gst_pbutils::DiscovererResult::Busy => DiscovererResult::Busy,
            gst_pbutils::DiscovererResult::MissingPlugins => DiscovererResult::MissingPlugins,
            _ => DiscovererResult::Error,
        }
    }
}

/// Audio stream details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioStreamInfo {
    pub sample_rate: u32,
    pub depth: u32,
    /// Bits per second
    pub bitrate: u32,
    pub channels: usize,
    pub codec_description: String,
}

impl AudioStreamInfo {
    fn from_gst(info: &gst_pbutils::DiscovererAudioInfo) -> Self {
        let codec_description = info
            .caps()
            .map(|caps| gst_pbutils::pb_utils_get_codec_description(&caps).to_string())
            .unwrap_or_default();
        Self {
            sample_rate: info.sample_rate(),
            depth: info.depth(),
            bitrate: info.bitrate(),
            channels: info.channels() as usize,
            codec_description,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscovererInfo {
    pub uri: String,
    pub result: DiscovererResult,
    pub audio: Option<AudioStreamInfo>,
    pub duration: Option<u64>,
    pub error: Option<String>,
}

impl DiscovererInfo {
    fn failed(uri: &str, result: DiscovererResult, error: Option<String>) -> Self {
        Self {
            uri: uri.to_string(),
            result,
            audio: None,
            duration: None,
            error,
        }
    }

    fn from_gst(uri: &str, info: &gst_pbutils::DiscovererInfo) -> Self {
        Self {
            uri: uri.to_string(),
            result: info.result().into(),
            audio: info.audio_streams().first().map(AudioStreamInfo::from_gst),
            duration: info.duration().map(gst::ClockTime::nseconds),
            error: None,
        }
    }
}

pub type DiscoveredCallback = Arc<dyn Fn(&DiscovererInfo) + Send + Sync>;

type CallbackSlot = Arc<RwLock<Option<DiscoveredCallback>>>;

pub struct Discoverer {
    sender: Option<Sender<String>>,
    worker: Option<JoinHandle<()>>,
    callback: CallbackSlot,
}

impl Discoverer {
    /// Start a discoverer with a per-URI `timeout` and room for
    /// `queue_depth` outstanding requests
    pub fn new(timeout: Duration, queue_depth: usize) -> GraphResult<Self> {
        crate::init()?;
        let (sender, receiver) = bounded::<String>(queue_depth.max(1));
        let (ready_tx, ready_rx) = bounded::<Result<(), String>>(1);
        let callback: CallbackSlot = Arc::new(RwLock::new(None));

        let worker_callback = Arc::clone(&callback);
        let worker = thread::Builder::new()
            .name("sonance-discoverer".into())
            .spawn(move || {
                let gst_timeout = gst::ClockTime::from_nseconds(timeout.as_nanos() as u64);
                let discoverer = match gst_pbutils::Discoverer::new(gst_timeout) {
                    Ok(discoverer) => {
                        let _ = ready_tx.send(Ok(()));
                        discoverer
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                for uri in receiver {
                    let info = discover(&discoverer, &uri, timeout);
                    debug!("Discovered {}: {:?}", uri, info.result);
                    deliver(&worker_callback, &info);
                }
            })
            .map_err(|e| GraphError::ThreadSpawn(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(GraphError::Discoverer(e)),
            Err(_) => return Err(GraphError::Discoverer("worker exited".into())),
        }

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            callback,
        })
    }

    pub fn connect_discovered(&self, callback: DiscoveredCallback) {
        *self.callback.write() = Some(callback);
    }

    pub fn disconnect(&self) {
        *self.callback.write() = None;
    }

    /// Queue `uri` for discovery
    ///
    /// A full queue reports [`DiscovererResult::Busy`] to the callback and
    /// returns `Ok(false)`.
    pub fn discover_uri_async(&self, uri: &str) -> GraphResult<bool> {
        let sender = self.sender.as_ref().ok_or(GraphError::DiscovererStopped)?;
        match sender.try_send(uri.to_string()) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => {
                deliver(
                    &self.callback,
                    &DiscovererInfo::failed(uri, DiscovererResult::Busy, None),
                );
                Ok(false)
            }
            Err(TrySendError::Disconnected(_)) => Err(GraphError::DiscovererStopped),
        }
    }

    /// Finish outstanding requests and stop the worker
    pub fn stop(&mut self) {
        self.sender = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Discoverer worker panicked");
            }
        }
    }
}

impl Drop for Discoverer {
    fn drop(&mut self) {
        self.disconnect();
        self.stop();
    }
}

fn deliver(callback: &CallbackSlot, info: &DiscovererInfo) {
    let callback = callback.read().clone();
    if let Some(callback) = callback {
        callback(info);
    }
}

fn discover(discoverer: &gst_pbutils::Discoverer, uri: &str, timeout: Duration) -> DiscovererInfo {
    if let Err(e) = url::Url::parse(uri) {
        return DiscovererInfo::failed(uri, DiscovererResult::UriInvalid, Some(e.to_string()));
    }

    let started = Instant::now();
    match discoverer.discover_uri(uri) {
        Ok(info) => DiscovererInfo::from_gst(uri, &info),
        Err(e) => {
            let result = if started.elapsed() >= timeout {
                DiscovererResult::Timeout
            } else if e.kind::<gst::CoreError>() == Some(gst::CoreError::MissingPlugin)
                || e.kind::<gst::StreamError>() == Some(gst::StreamError::CodecNotFound)
            {
                DiscovererResult::MissingPlugins
            } else {
                DiscovererResult::Error
            };
            DiscovererInfo::failed(uri, result, Some(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn write_wav(path: &std::path::Path) {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 48000,
            bits_per_sample: 24,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..48000 {
            writer.write_sample(i % 1000).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn has_wav_support() -> bool {
        gst::init().unwrap();
        gst::ElementFactory::find("wavparse").is_some()
    }

    #[test]
    fn test_result_messages() {
        assert_eq!(DiscovererResult::UriInvalid.message(), "The URI is invalid");
        assert_eq!(DiscovererResult::Timeout.message(), "The discovery timed-out");
        assert_eq!(
            DiscovererResult::MissingPlugins.message(),
            "Some plugins are missing for full discovery"
        );
    }

    #[test]
    fn test_discovers_wav() {
        if !has_wav_support() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream info.wav");
        write_wav(&path);
        let uri = url::Url::from_file_path(&path).unwrap().to_string();

        let discoverer = Discoverer::new(Duration::from_secs(5), 4).unwrap();
        let (tx, rx) = unbounded();
        discoverer.connect_discovered(Arc::new(move |info: &DiscovererInfo| {
            let _ = tx.send(info.clone());
        }));
        assert!(discoverer.discover_uri_async(&uri).unwrap());

        let info = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(info.uri, uri);
        assert_eq!(info.result, DiscovererResult::Ok);
        assert_eq!(info.duration.map(|d| d / 100_000_000), Some(10));
        let audio = info.audio.unwrap();
        assert_eq!(audio.sample_rate, 48000);
        assert_eq!(audio.depth, 24);
        assert_eq!(audio.channels, 2);
        assert!(!audio.codec_description.is_empty());
    }

    #[test]
    fn test_invalid_and_missing() {
        let discoverer = Discoverer::new(Duration::from_secs(5), 4).unwrap();
        let (tx, rx) = unbounded();
        discoverer.connect_discovered(Arc::new(move |info: &DiscovererInfo| {
            let _ = tx.send(info.result);
        }));
        discoverer.discover_uri_async("not a uri").unwrap();
        discoverer
            .discover_uri_async("file:///nonexistent/sonance/missing.flac")
            .unwrap();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(10)).unwrap(),
            DiscovererResult::UriInvalid
        );
        assert_ne!(
            rx.recv_timeout(Duration::from_secs(10)).unwrap(),
            DiscovererResult::Ok
        );
    }

    #[test]
    fn test_stopped_discoverer_rejects() {
        let mut discoverer = Discoverer::new(Duration::from_secs(1), 1).unwrap();
        discoverer.stop();
        assert!(matches!(
            discoverer.discover_uri_async("file:///a.flac"),
            Err(GraphError::DiscovererStopped)
        ));
    }
}
