//! Playback Pipeline
//!
//! One pipeline plays one stream at a time, with a gapless hand-over to the
//! next track. It owns one playbin and the audio bin built for it.
//!
//! ```text
//!                 owner thread                      graph threads
//!   ┌─────────────────────────────────────┐     ┌──────────────────────┐
//!   │ Pipeline                            │     │ source / streaming   │
//!   │  init_from_url, seek, set_state ────┼────▶│ playbin + audio bin  │
//!   │  dispatch_pending/dispatch_timeout ◀┼─────┤ RuntimeEvent channel │
//!   │       │                             │     │ pad watches, signals │
//!   └───────┼─────────────────────────────┘     └─────────┬────────────┘
//!           ▼                                             │
//!     PipelineSignal (factory channel) ◀──────────────────┘ end offset
//! ```
//!
//! # Readiness
//!
//! A pipeline is *connected* once the playbin linked its output pad and
//! *initialized* once the playbin first reached Paused or Playing. Seeks
//! issued before both hold are stored and replayed once.
//!
//! Rust pattern: everything a graph thread may touch lives in
//! `PipelineShared` behind an `Arc`; the rest of the state is plain fields
//! mutated only through `&mut self` on the owner thread.

mod dispatch;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver};
use gstreamer as gst;
use sonance_dsp::{preamp_to_linear, EqConfig, EQ_BAND_COUNT};
use sonance_graph::{
    BusSyncReply, Message, MessageKind, Playbin, SourceInfo, State, StateChangeReturn,
    StreamStatusType, NSECONDS_PER_MSECOND,
};
use tracing::{debug, info, warn};

use crate::builder::{build_audio_bin, AudioStages};
use crate::config::{PipelineConfig, ReplayGainMode};
use crate::consumer::BufferConsumer;
use crate::discovery::StreamDiscovery;
use crate::error::{PipelineError, PipelineResult};
use crate::factory::FactoryShared;
use crate::fader::{Easing, Fader, FaderDirection};
use crate::message::RuntimeEvent;
use crate::priority;
use crate::shared::{PipelineShared, SourceSettings};
use crate::state_pool::StateChangeHandle;
use crate::url::fixup_url;
use crate::watch;

/// Timeout of the state query behind [`Pipeline::state`]
const STATE_QUERY_TIMEOUT: Duration = Duration::from_millis(10);

/// Stream currently reaching the sink, as announced by stream-start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputStream {
    NotStarted,
    Started(Option<gst::GroupId>),
}

pub struct Pipeline {
    factory: Arc<FactoryShared>,
    shared: Arc<PipelineShared>,
    events: Receiver<RuntimeEvent>,
    config: PipelineConfig,

    playbin: Option<Arc<dyn Playbin>>,
    stages: Option<AudioStages>,
    discovery: Option<StreamDiscovery>,

    connected: bool,
    initialized: bool,
    output_stream: OutputStream,
    pending_seek: Option<u64>,
    last_known_position: AtomicU64,
    buffering: bool,
    redirect_url: Option<String>,

    volume_percent: u32,
    volume_modifier: f64,
    stereo_balance: f32,
    eq_preamp: i32,
    eq_gains: [i32; EQ_BAND_COUNT],

    fader: Option<Fader>,
    fader_next_tick: Option<Instant>,
    fudge_deadline: Option<Instant>,
    use_fudge_timer: bool,
}

impl Pipeline {
    pub(crate) fn new(factory: Arc<FactoryShared>, id: u32, config: PipelineConfig) -> Self {
        let (sender, events) = unbounded();
        let source = SourceSettings {
            device: config.source_device.clone(),
            user_agent: config.user_agent.clone(),
        };
        let shared = Arc::new(PipelineShared::new(
            id,
            factory.signals.clone(),
            sender,
            source,
        ));
        debug!("Pipeline {} created", id);

        Self {
            factory,
            shared,
            events,
            config,
            playbin: None,
            stages: None,
            discovery: None,
            connected: false,
            initialized: false,
            output_stream: OutputStream::NotStarted,
            pending_seek: None,
            last_known_position: AtomicU64::new(0),
            buffering: false,
            redirect_url: None,
            volume_percent: 100,
            volume_modifier: 1.0,
            stereo_balance: 0.0,
            eq_preamp: 0,
            eq_gains: [0; EQ_BAND_COUNT],
            fader: None,
            fader_next_tick: None,
            fudge_deadline: None,
            use_fudge_timer: false,
        }
    }

    pub fn id(&self) -> u32 {
        self.shared.id
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    // --- Configuration -------------------------------------------------
    //
    // Graph shape, sink, queue and replaygain settings are read when the
    // audio bin is built in `init_from_url`.

    /// Replace the whole configuration; only before `init_from_url`
    pub fn configure(&mut self, config: PipelineConfig) -> PipelineResult<()> {
        if self.playbin.is_some() {
            return Err(PipelineError::AlreadyInitialized);
        }
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Output device name; empty selects the default device
    pub fn set_output_device(&mut self, device: &str) {
        self.config.output_device = device.to_string();
    }

    pub fn set_volume_enabled(&mut self, enabled: bool) {
        self.config.volume_enabled = enabled;
    }

    /// Disabling the balancer also centers the balance
    pub fn set_stereo_balancer_enabled(&mut self, enabled: bool) {
        self.config.stereo_balancer_enabled = enabled;
        if !enabled {
            self.stereo_balance = 0.0;
        }
        self.update_stereo_balance();
    }

    pub fn set_equalizer_enabled(&mut self, enabled: bool) {
        self.config.equalizer_enabled = enabled;
        self.update_equalizer();
    }

    pub fn set_replaygain(
        &mut self,
        enabled: bool,
        mode: ReplayGainMode,
        preamp_db: f32,
        compression: bool,
    ) {
        let replaygain = &mut self.config.replaygain;
        replaygain.enabled = enabled;
        replaygain.mode = mode;
        replaygain.preamp_db = preamp_db;
        replaygain.compression = compression;
    }

    pub fn set_buffer_duration_ns(&mut self, duration_ns: u64) {
        self.config.buffer_duration_ns = duration_ns;
    }

    pub fn set_buffer_min_fill(&mut self, percent: u32) {
        self.config.buffer_min_fill = percent;
    }

    /// Device handed to device-backed sources at source setup
    pub fn set_source_device(&mut self, device: Option<String>) {
        self.shared.source.lock().device = device.clone();
        self.config.source_device = device;
    }

    // --- Setup ---------------------------------------------------------

    /// Build the graph for `stream_url`
    ///
    /// `end_offset_ns <= 0` plays the stream to its end. On error the
    /// pipeline stays unusable.
    pub fn init_from_url(
        &mut self,
        stream_url: &str,
        original_url: &str,
        end_offset_ns: i64,
    ) -> PipelineResult<()> {
        if self.playbin.is_some() {
            return Err(PipelineError::AlreadyInitialized);
        }
        self.config.validate()?;

        let fixed = fixup_url(stream_url);
        if fixed.source_device.is_some() {
            self.config.source_device = fixed.source_device.clone();
        }
        *self.shared.source.lock() = SourceSettings {
            device: self.config.source_device.clone(),
            user_agent: self.config.user_agent.clone(),
        };
        {
            let mut track = self.shared.track.lock();
            track.stream_url = fixed.uri.clone();
            track.original_url = original_url.to_string();
            track.end_offset_ns = end_offset_ns;
            track.end_reported = false;
        }

        let (bin, stages) = build_audio_bin(&self.factory.elements, &self.factory.names, &self.config)?;
        watch::install_stage_watches(&self.shared, &stages);

        let playbin = (self.factory.playbin_maker)(&format!("playbin-{}", self.id()))?;
        playbin.set_uri(&fixed.uri);
        playbin.set_audio_sink(&bin)?;
        self.connect_playbin(&playbin);
        self.output_stream = OutputStream::NotStarted;

        let discovery = StreamDiscovery::start(&self.shared, &self.factory.config)?;
        discovery.request(&fixed.uri);

        self.playbin = Some(playbin);
        self.stages = Some(stages);
        self.discovery = Some(discovery);

        self.update_volume();
        self.update_stereo_balance();
        self.update_equalizer();

        info!(
            "Pipeline {}: initialized for {} (end offset {} ns)",
            self.id(),
            fixed.uri,
            end_offset_ns
        );
        Ok(())
    }

    fn connect_playbin(&self, playbin: &Arc<dyn Playbin>) {
        let weak = Arc::downgrade(&self.shared);
        playbin.set_sync_handler(Box::new(move |message: &Message| {
            // Posted from the streaming thread itself
            if let MessageKind::StreamStatus {
                status: StreamStatusType::Enter,
            } = &message.kind
            {
                priority::raise_current_thread();
            }
            if let Some(shared) = weak.upgrade() {
                shared.post(RuntimeEvent::Message(message.clone()));
            }
            BusSyncReply::Drop
        }));

        let weak = Arc::downgrade(&self.shared);
        playbin.connect_pad_added(Arc::new(move |pad: &gst::Pad| {
            if let Some(shared) = weak.upgrade() {
                watch::pad_added(&shared, pad);
            }
        }));

        let weak = Arc::downgrade(&self.shared);
        playbin.connect_source_setup(Arc::new(move |info: &mut SourceInfo| {
            if let Some(shared) = weak.upgrade() {
                shared.apply_source_settings(info);
                shared.post(RuntimeEvent::SourceSetup);
            }
        }));

        let weak = Arc::downgrade(&self.shared);
        let weak_playbin = Arc::downgrade(playbin);
        playbin.connect_about_to_finish(Arc::new(move || {
            if let (Some(shared), Some(playbin)) = (weak.upgrade(), weak_playbin.upgrade()) {
                about_to_finish(&shared, playbin.as_ref());
            }
        }));
    }

    /// Queue the next track for a gapless hand-over
    pub fn set_next_url(
        &mut self,
        stream_url: &str,
        original_url: &str,
        beginning_offset_ns: i64,
        end_offset_ns: i64,
    ) {
        let fixed = fixup_url(stream_url);
        {
            let mut track = self.shared.track.lock();
            track.next_stream_url = fixed.uri.clone();
            track.next_original_url = original_url.to_string();
            track.next_beginning_offset_ns = beginning_offset_ns;
            track.next_end_offset_ns = end_offset_ns;
        }
        debug!(
            "Pipeline {}: next track {} ({}..{} ns)",
            self.id(),
            fixed.uri,
            beginning_offset_ns,
            end_offset_ns
        );
        if let Some(discovery) = &self.discovery {
            discovery.request(&fixed.uri);
        }
    }

    // --- Playback control ----------------------------------------------

    /// Change the playbin state on the factory's worker pool
    pub fn set_state(&self, state: State) -> StateChangeHandle {
        match &self.playbin {
            Some(playbin) => self
                .factory
                .pool
                .submit(self.id(), Arc::clone(playbin), state),
            None => {
                warn!("Pipeline {}: set_state({}) before init", self.id(), state);
                StateChangeHandle::completed(StateChangeReturn::Failure)
            }
        }
    }

    /// Seek to `position_ns`, or remember it until the pipeline is ready
    pub fn seek(&mut self, position_ns: u64) -> bool {
        {
            let mut track = self.shared.track.lock();
            if track.ignore_next_seek {
                track.ignore_next_seek = false;
                return true;
            }
        }

        if !self.connected || !self.initialized {
            self.pending_seek = Some(position_ns);
            return true;
        }

        if self.shared.next_uri_set() {
            // The playbin already moved on to the next URI; restart the
            // current one and seek once it is back
            self.pending_seek = Some(position_ns);
            self.set_state(State::Ready);
            return true;
        }

        let Some(playbin) = &self.playbin else {
            return false;
        };
        self.pending_seek = None;
        self.last_known_position.store(position_ns, Ordering::Relaxed);
        playbin.seek_simple(position_ns)
    }

    pub fn set_volume(&mut self, percent: u32) {
        self.volume_percent = percent;
        self.update_volume();
    }

    /// Fader-controlled factor on top of the volume
    pub fn set_volume_modifier(&mut self, modifier: f64) {
        self.volume_modifier = modifier;
        self.update_volume();
    }

    fn update_volume(&self) {
        let Some(volume) = self.stages.as_ref().and_then(|s| s.volume.as_ref()) else {
            return;
        };
        let gain = self.volume_percent as f64 * 0.01 * self.volume_modifier;
        if let Err(e) = volume.set_volume(gain) {
            warn!("Pipeline {}: {}", self.id(), e);
        }
    }

    /// Balance in -1.0 (left) ..= 1.0 (right)
    pub fn set_stereo_balance(&mut self, value: f32) -> PipelineResult<()> {
        if !(-1.0..=1.0).contains(&value) {
            return Err(PipelineError::ConfigError(format!(
                "Invalid stereo balance: {}",
                value
            )));
        }
        self.stereo_balance = value;
        self.update_stereo_balance();
        Ok(())
    }

    fn update_stereo_balance(&self) {
        let Some(panorama) = self.stages.as_ref().and_then(|s| s.panorama.as_ref()) else {
            return;
        };
        if let Err(e) = panorama.set_panorama(self.stereo_balance) {
            warn!("Pipeline {}: {}", self.id(), e);
        }
    }

    /// Preamp in -100..=100 and ten band sliders in -100..=100
    pub fn set_equalizer_params(&mut self, preamp: i32, gains: [i32; EQ_BAND_COUNT]) {
        self.eq_preamp = preamp;
        self.eq_gains = gains;
        self.update_equalizer();
    }

    fn update_equalizer(&self) {
        let Some(stages) = &self.stages else {
            return;
        };
        let (Some(equalizer), Some(preamp)) = (&stages.equalizer, &stages.eq_preamp) else {
            return;
        };

        let enabled = self.config.equalizer_enabled;
        let mut bands = EqConfig::default();
        let preamp_gain = if enabled {
            bands.set_slider_gains(&self.eq_gains);
            preamp_to_linear(self.eq_preamp)
        } else {
            1.0
        };

        let result = equalizer
            .set_equalizer_gains(&bands)
            .and_then(|_| preamp.set_volume(preamp_gain as f64));
        if let Err(e) = result {
            warn!("Pipeline {}: {}", self.id(), e);
        }
    }

    /// Fade the volume modifier over `duration_ns`
    ///
    /// A running fader hands over at the same relative progress. Once the
    /// fade ends, `FaderFinished` follows after the fudge delay.
    pub fn start_fader(
        &mut self,
        duration_ns: u64,
        direction: FaderDirection,
        easing: Easing,
        use_fudge_timer: bool,
    ) {
        let now = Instant::now();
        let duration_ms = duration_ns / NSECONDS_PER_MSECOND;
        let start_time = Fader::start_time(duration_ms, direction, self.fader.as_ref(), now);
        let fader = Fader::new(duration_ms, direction, easing, start_time, now);
        debug!(
            "Pipeline {}: fader {:?} over {} ms from {} ms",
            self.id(),
            direction,
            duration_ms,
            start_time
        );

        self.fudge_deadline = None;
        self.use_fudge_timer = use_fudge_timer;
        let value = fader.value(now);
        self.fader = Some(fader);
        self.fader_next_tick = Some(now);
        self.set_volume_modifier(value);
    }

    // --- Buffer consumers ----------------------------------------------

    pub fn add_buffer_consumer(&self, consumer: Arc<dyn BufferConsumer>) {
        self.shared.consumers.add(consumer);
    }

    pub fn remove_buffer_consumer(&self, consumer: &Arc<dyn BufferConsumer>) -> bool {
        self.shared.consumers.remove(consumer)
    }

    pub fn remove_all_buffer_consumers(&self) {
        self.shared.consumers.remove_all();
    }

    // --- Queries -------------------------------------------------------

    /// Stream position in nanoseconds
    pub fn position(&self) -> u64 {
        if self.initialized {
            if let Some(position) = self.playbin.as_ref().and_then(|p| p.query_position()) {
                self.last_known_position.store(position, Ordering::Relaxed);
            }
        }
        self.last_known_position.load(Ordering::Relaxed)
    }

    /// Stream duration in nanoseconds, 0 while unknown
    pub fn length(&self) -> u64 {
        self.playbin
            .as_ref()
            .and_then(|p| p.query_duration())
            .unwrap_or(0)
    }

    pub fn state(&self) -> State {
        let Some(playbin) = &self.playbin else {
            return State::Null;
        };
        let query = playbin.get_state(STATE_QUERY_TIMEOUT);
        if query.result.is_failure() {
            State::Null
        } else {
            query.current
        }
    }

    pub fn is_buffering(&self) -> bool {
        self.buffering
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Location announced by a stream redirect, if any
    pub fn redirect_url(&self) -> Option<&str> {
        self.redirect_url.as_deref()
    }

    /// Start of the first segment seen after the queue
    pub fn segment_start(&self) -> u64 {
        self.shared.segment_start()
    }

    pub fn has_next_valid_url(&self) -> bool {
        self.shared.track.lock().has_next_valid_url()
    }

    pub fn stream_url(&self) -> String {
        self.shared.track.lock().stream_url.clone()
    }

    pub fn original_url(&self) -> String {
        self.shared.track.lock().original_url.clone()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.id())
            .field("connected", &self.connected)
            .field("initialized", &self.initialized)
            .field("buffering", &self.buffering)
            .finish_non_exhaustive()
    }
}

/// The playbin is about to run out of data
///
/// Runs on the source thread; handing the next URI over here lets the
/// playbin continue without a gap.
fn about_to_finish(shared: &PipelineShared, playbin: &dyn Playbin) {
    let next = {
        let track = shared.track.lock();
        if !track.has_next_valid_url() || shared.next_uri_set() {
            return;
        }
        shared.set_next_uri_set(true);
        track.next_stream_url.clone()
    };
    debug!("Pipeline {}: about to finish, next uri {}", shared.id, next);
    playbin.set_uri(&next);
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if let Some(playbin) = self.playbin.take() {
            playbin.disconnect_all();
            let result = playbin.set_state(State::Null);
            debug!("Pipeline {}: torn down ({:?})", self.id(), result);
        }
        // Joins the discoverer thread
        self.discovery = None;
    }
}
