//! Buffers, Caps and Segments
//!
//! Owned snapshots of what passes a pad, for code that should not depend on
//! GStreamer types. Timestamps are nanoseconds. A [`Segment`] maps buffer
//! timestamps to running time, which is what the sink synchronizes against:
//!
//! ```text
//! running_time = (pts - segment.start) + segment.base
//! ```

use gstreamer as gst;
use sonance_dsp::SampleFormat;

pub const NSECONDS_PER_SECOND: u64 = 1_000_000_000;
pub const NSECONDS_PER_MSECOND: u64 = 1_000_000;

/// Raw audio format description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caps {
    pub format: SampleFormat,
    pub rate: u32,
    pub channels: usize,
}

impl Caps {
    pub fn new(format: SampleFormat, rate: u32, channels: usize) -> Self {
        Self {
            format,
            rate,
            channels,
        }
    }

    /// Read `audio/x-raw` caps; `None` for anything else or unknown formats
    pub fn from_gst(caps: &gst::CapsRef) -> Option<Self> {
        let structure = caps.structure(0)?;
        if !structure.has_name("audio/x-raw") {
            return None;
        }
        let format = SampleFormat::parse(structure.get::<&str>("format").ok()?)?;
        let rate = structure.get::<i32>("rate").ok()?;
        let channels = structure.get::<i32>("channels").ok()?;
        Some(Self::new(format, rate.max(0) as u32, channels.max(0) as usize))
    }

    /// Duration of `frames` frames at this rate
    pub fn frames_to_ns(&self, frames: usize) -> u64 {
        if self.rate == 0 {
            return 0;
        }
        frames as u64 * NSECONDS_PER_SECOND / self.rate as u64
    }
}

impl std::fmt::Display for Caps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "audio/x-raw, format={}, rate={}, channels={}",
            self.format, self.rate, self.channels
        )
    }
}

/// A chunk of interleaved raw audio
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer {
    pub data: Vec<u8>,
    pub caps: Caps,
    pub pts: Option<u64>,
    pub duration: Option<u64>,
}

impl Buffer {
    pub fn new(data: Vec<u8>, caps: Caps, pts: Option<u64>, duration: Option<u64>) -> Self {
        Self {
            data,
            caps,
            pts,
            duration,
        }
    }

    /// Snapshot a GStreamer buffer; the payload is only copied with `with_data`
    pub fn from_gst(buffer: &gst::BufferRef, caps: Caps, with_data: bool) -> Self {
        let data = if with_data {
            buffer
                .map_readable()
                .map(|map| map.as_slice().to_vec())
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        Self::new(
            data,
            caps,
            buffer.pts().map(gst::ClockTime::nseconds),
            buffer.duration().map(gst::ClockTime::nseconds),
        )
    }

    pub fn frames(&self) -> usize {
        sonance_dsp::frame_count(self.caps.format, self.data.len(), self.caps.channels)
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// pts + duration, if both are known
    pub fn end_time(&self) -> Option<u64> {
        Some(self.pts? + self.duration?)
    }
}

/// Time segment describing how buffer timestamps map to running time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: u64,
    /// Last known stream position inside the segment
    pub position: u64,
    /// Running time accumulated before this segment
    pub base: u64,
    pub stop: Option<u64>,
    pub rate: f64,
}

impl Default for Segment {
    fn default() -> Self {
        Self {
            start: 0,
            position: 0,
            base: 0,
            stop: None,
            rate: 1.0,
        }
    }
}

impl Segment {
    pub fn new(start: u64, base: u64) -> Self {
        Self {
            start,
            position: start,
            base,
            ..Self::default()
        }
    }

    /// Time segments only; byte or sample segments give `None`
    pub fn from_gst(segment: &gst::Segment) -> Option<Self> {
        let segment = segment.downcast_ref::<gst::ClockTime>()?;
        let start = segment.start().map(gst::ClockTime::nseconds).unwrap_or(0);
        Some(Self {
            start,
            position: segment.position().map(gst::ClockTime::nseconds).unwrap_or(start),
            base: segment.base().map(gst::ClockTime::nseconds).unwrap_or(0),
            stop: segment.stop().map(gst::ClockTime::nseconds),
            rate: segment.rate(),
        })
    }

    /// Convert a stream timestamp to running time
    ///
    /// Returns `None` for timestamps before the segment start.
    pub fn to_running_time(&self, position: u64) -> Option<u64> {
        if position < self.start {
            return None;
        }
        if let Some(stop) = self.stop {
            if position > stop {
                return None;
            }
        }
        let offset = (position - self.start) as f64 / self.rate.abs().max(f64::EPSILON);
        Some(self.base + offset as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_time() {
        let segment = Segment::new(2 * NSECONDS_PER_SECOND, 10 * NSECONDS_PER_SECOND);
        assert_eq!(segment.to_running_time(NSECONDS_PER_SECOND), None);
        assert_eq!(
            segment.to_running_time(3 * NSECONDS_PER_SECOND),
            Some(11 * NSECONDS_PER_SECOND)
        );
    }

    #[test]
    fn test_buffer_timing() {
        let caps = Caps::new(SampleFormat::S16LE, 44100, 2);
        let buffer = Buffer::new(vec![0; 4 * 441], caps, Some(1000), Some(caps.frames_to_ns(441)));
        assert_eq!(buffer.frames(), 441);
        assert_eq!(buffer.duration, Some(10 * NSECONDS_PER_MSECOND));
        assert_eq!(buffer.end_time(), Some(1000 + 10 * NSECONDS_PER_MSECOND));
    }

    #[test]
    fn test_caps_from_gst() {
        gst::init().unwrap();
        let caps = gst::Caps::builder("audio/x-raw")
            .field("format", "S24LE")
            .field("rate", 96000i32)
            .field("channels", 2i32)
            .build();
        assert_eq!(
            Caps::from_gst(&caps),
            Some(Caps::new(SampleFormat::S24LE, 96000, 2))
        );

        let video = gst::Caps::builder("video/x-raw").field("width", 640i32).build();
        assert_eq!(Caps::from_gst(&video), None);
    }

    #[test]
    fn test_buffer_from_gst() {
        gst::init().unwrap();
        let mut buffer = gst::Buffer::from_slice(vec![1u8, 2, 3, 4]);
        {
            let buffer = buffer.get_mut().unwrap();
            buffer.set_pts(gst::ClockTime::from_mseconds(20));
            buffer.set_duration(gst::ClockTime::from_mseconds(5));
        }
        let caps = Caps::new(SampleFormat::S16LE, 8000, 2);

        let full = Buffer::from_gst(&buffer, caps, true);
        assert_eq!(full.data, vec![1, 2, 3, 4]);
        assert_eq!(full.pts, Some(20 * NSECONDS_PER_MSECOND));
        assert_eq!(full.end_time(), Some(25 * NSECONDS_PER_MSECOND));

        let timing_only = Buffer::from_gst(&buffer, caps, false);
        assert!(timing_only.data.is_empty());
        assert_eq!(timing_only.duration, Some(5 * NSECONDS_PER_MSECOND));
    }

    #[test]
    fn test_segment_from_gst() {
        gst::init().unwrap();
        let mut segment = gst::FormattedSegment::<gst::ClockTime>::new();
        segment.set_start(gst::ClockTime::from_seconds(2));
        segment.set_base(gst::ClockTime::from_seconds(1));
        let segment = Segment::from_gst(segment.upcast_ref()).unwrap();
        assert_eq!(segment.start, 2 * NSECONDS_PER_SECOND);
        assert_eq!(segment.base, NSECONDS_PER_SECOND);
        assert_eq!(
            segment.to_running_time(3 * NSECONDS_PER_SECOND),
            Some(2 * NSECONDS_PER_SECOND)
        );
    }
}
