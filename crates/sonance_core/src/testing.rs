//! Scriptable playbin for unit tests
//!
//! Records every call and lets a test fire the callbacks a real playbin
//! would fire from its own threads.

use std::sync::Arc;
use std::time::Duration;

use gstreamer as gst;
use parking_lot::Mutex;
use sonance_graph::{
    AboutToFinishCallback, GraphResult, Message, MessageKind, PadAddedCallback, Playbin,
    SourceInfo, SourceSetupCallback, State, StateChangeReturn, StateQuery, SyncHandler,
};

struct Recorded {
    uri: String,
    uris: Vec<String>,
    states: Vec<State>,
    seeks: Vec<u64>,
    eos_sent: usize,
    current: State,
    position: Option<u64>,
    duration: Option<u64>,
    audio_bin: Option<gst::Bin>,
    about_to_finish: Option<AboutToFinishCallback>,
    pad_added: Option<PadAddedCallback>,
    source_setup: Option<SourceSetupCallback>,
    disconnected: bool,
}

impl Recorded {
    fn new() -> Self {
        Self {
            uri: String::new(),
            uris: Vec::new(),
            states: Vec::new(),
            seeks: Vec::new(),
            eos_sent: 0,
            current: State::Null,
            position: None,
            duration: None,
            audio_bin: None,
            about_to_finish: None,
            pad_added: None,
            source_setup: None,
            disconnected: false,
        }
    }
}

pub(crate) struct FakePlaybin {
    name: String,
    sync_handler: Mutex<Option<Arc<SyncHandler>>>,
    state_delay: Duration,
    recorded: Mutex<Recorded>,
}

impl FakePlaybin {
    pub fn new() -> Arc<Self> {
        Self::with_state_delay(Duration::ZERO)
    }

    pub fn with_state_delay(state_delay: Duration) -> Arc<Self> {
        Self::named("playbin-test", state_delay)
    }

    pub fn named(name: &str, state_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            sync_handler: Mutex::new(None),
            state_delay,
            recorded: Mutex::new(Recorded::new()),
        })
    }

    pub fn states(&self) -> Vec<State> {
        self.recorded.lock().states.clone()
    }

    pub fn uris(&self) -> Vec<String> {
        self.recorded.lock().uris.clone()
    }

    pub fn seeks(&self) -> Vec<u64> {
        self.recorded.lock().seeks.clone()
    }

    pub fn eos_sent(&self) -> usize {
        self.recorded.lock().eos_sent
    }

    pub fn is_disconnected(&self) -> bool {
        self.recorded.lock().disconnected
    }

    pub fn audio_bin_installed(&self) -> bool {
        self.recorded.lock().audio_bin.is_some()
    }

    pub fn set_position(&self, position: Option<u64>) {
        self.recorded.lock().position = position;
    }

    pub fn set_duration(&self, duration: Option<u64>) {
        self.recorded.lock().duration = duration;
    }

    /// Post a message the way a graph thread would
    pub fn post(&self, message: Message) {
        let handler = self.sync_handler.lock().clone();
        if let Some(handler) = handler {
            handler(&message);
        }
    }

    pub fn post_from_self(&self, kind: MessageKind) {
        self.post(Message::new(self.name.clone(), kind));
    }

    pub fn fire_about_to_finish(&self) {
        let callback = self.recorded.lock().about_to_finish.clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    pub fn fire_pad_added(&self, pad: &gst::Pad) {
        let callback = self.recorded.lock().pad_added.clone();
        if let Some(callback) = callback {
            callback(pad);
        }
    }

    pub fn fire_source_setup(&self) -> SourceInfo {
        let callback = self.recorded.lock().source_setup.clone();
        let mut info = SourceInfo {
            uri: self.uri(),
            ..SourceInfo::default()
        };
        if let Some(callback) = callback {
            callback(&mut info);
        }
        info
    }
}

impl Playbin for FakePlaybin {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn set_uri(&self, uri: &str) {
        let mut recorded = self.recorded.lock();
        recorded.uri = uri.to_string();
        recorded.uris.push(uri.to_string());
    }

    fn uri(&self) -> String {
        self.recorded.lock().uri.clone()
    }

    fn set_audio_sink(&self, bin: &gst::Bin) -> GraphResult<()> {
        self.recorded.lock().audio_bin = Some(bin.clone());
        Ok(())
    }

    fn set_state(&self, state: State) -> StateChangeReturn {
        if !self.state_delay.is_zero() {
            std::thread::sleep(self.state_delay);
        }
        let mut recorded = self.recorded.lock();
        recorded.states.push(state);
        recorded.current = state;
        StateChangeReturn::Success
    }

    fn get_state(&self, _timeout: Duration) -> StateQuery {
        StateQuery {
            result: StateChangeReturn::Success,
            current: self.recorded.lock().current,
            pending: State::VoidPending,
        }
    }

    fn seek_simple(&self, position_ns: u64) -> bool {
        let mut recorded = self.recorded.lock();
        recorded.seeks.push(position_ns);
        recorded.position = Some(position_ns);
        true
    }

    fn query_position(&self) -> Option<u64> {
        self.recorded.lock().position
    }

    fn query_duration(&self) -> Option<u64> {
        self.recorded.lock().duration
    }

    fn send_eos(&self) -> bool {
        self.recorded.lock().eos_sent += 1;
        true
    }

    fn set_sync_handler(&self, handler: SyncHandler) {
        *self.sync_handler.lock() = Some(Arc::new(handler));
    }

    fn connect_about_to_finish(&self, callback: AboutToFinishCallback) {
        self.recorded.lock().about_to_finish = Some(callback);
    }

    fn connect_pad_added(&self, callback: PadAddedCallback) {
        self.recorded.lock().pad_added = Some(callback);
    }

    fn connect_source_setup(&self, callback: SourceSetupCallback) {
        self.recorded.lock().source_setup = Some(callback);
    }

    fn disconnect_all(&self) {
        let mut recorded = self.recorded.lock();
        recorded.about_to_finish = None;
        recorded.pad_added = None;
        recorded.source_setup = None;
        recorded.disconnected = true;
        drop(recorded);
        *self.sync_handler.lock() = None;
    }
}
