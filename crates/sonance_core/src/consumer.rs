//! Buffer Consumers
//!
//! Visualization and analysis code registers a [`BufferConsumer`] with a
//! pipeline. The buffer watch on the streaming thread hands every buffer,
//! converted to interleaved S16LE, to each registered consumer.
//!
//! Rust pattern: the registry is snapshotted under its lock and delivery
//! happens outside it, so a consumer may add or remove consumers without
//! deadlocking the streaming thread.

use std::sync::Arc;

use parking_lot::Mutex;
use sonance_dsp::{SampleFormat, SpectrumAnalyzer, NUM_BINS};
use sonance_graph::Buffer;

/// Receives audio buffers on the streaming thread
///
/// Implementations must return quickly; they run inline with playback.
pub trait BufferConsumer: Send + Sync {
    /// `buffer` is S16LE when the source format could be converted, the
    /// original buffer otherwise. `format` names the source sample format.
    fn consume_buffer(&self, buffer: &Buffer, pipeline_id: u32, format: &str);
}

/// Consumers registered with one pipeline
#[derive(Default)]
pub struct ConsumerRegistry {
    consumers: Mutex<Vec<Arc<dyn BufferConsumer>>>,
}

impl ConsumerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, consumer: Arc<dyn BufferConsumer>) {
        self.consumers.lock().push(consumer);
    }

    /// Remove a consumer by identity
    pub fn remove(&self, consumer: &Arc<dyn BufferConsumer>) -> bool {
        let mut consumers = self.consumers.lock();
        let before = consumers.len();
        consumers.retain(|c| !Arc::ptr_eq(c, consumer));
        consumers.len() != before
    }

    pub fn remove_all(&self) {
        self.consumers.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.consumers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumers.lock().is_empty()
    }

    /// Copy of the current consumer list
    pub fn snapshot(&self) -> Vec<Arc<dyn BufferConsumer>> {
        self.consumers.lock().clone()
    }

    /// Deliver one buffer to every consumer
    pub fn deliver(&self, buffer: &Buffer, pipeline_id: u32, format: &str) {
        for consumer in self.snapshot() {
            consumer.consume_buffer(buffer, pipeline_id, format);
        }
    }
}

/// Feeds a [`SpectrumAnalyzer`] from a pipeline's buffers
pub struct SpectrumConsumer {
    analyzer: SpectrumAnalyzer,
}

impl SpectrumConsumer {
    pub fn new(sample_rate: f32, fps: u32) -> Self {
        Self {
            analyzer: SpectrumAnalyzer::new(sample_rate, fps),
        }
    }

    /// Recompute the spectrum if a frame is due
    pub fn update(&self) -> bool {
        self.analyzer.update()
    }

    pub fn spectrum(&self) -> [f32; NUM_BINS] {
        self.analyzer.spectrum()
    }
}

impl BufferConsumer for SpectrumConsumer {
    fn consume_buffer(&self, buffer: &Buffer, _pipeline_id: u32, _format: &str) {
        if buffer.caps.format != SampleFormat::S16LE {
            return;
        }
        let samples: Vec<i16> = buffer
            .data
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        self.analyzer.push_s16(&samples, buffer.caps.channels);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonance_graph::Caps;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        seen: AtomicUsize,
    }

    impl BufferConsumer for Counting {
        fn consume_buffer(&self, _buffer: &Buffer, pipeline_id: u32, format: &str) {
            assert_eq!(pipeline_id, 4);
            assert_eq!(format, "S16LE");
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn buffer() -> Buffer {
        Buffer::new(
            vec![0; 8],
            Caps::new(SampleFormat::S16LE, 44100, 2),
            Some(0),
            None,
        )
    }

    #[test]
    fn test_add_remove() {
        let registry = ConsumerRegistry::new();
        let a = Arc::new(Counting::default());
        let b = Arc::new(Counting::default());
        let a_dyn: Arc<dyn BufferConsumer> = a.clone();
        let b_dyn: Arc<dyn BufferConsumer> = b.clone();
        registry.add(Arc::clone(&a_dyn));
        registry.add(Arc::clone(&b_dyn));
        assert_eq!(registry.len(), 2);

        registry.deliver(&buffer(), 4, "S16LE");
        assert!(registry.remove(&a_dyn));
        assert!(!registry.remove(&a_dyn));
        registry.deliver(&buffer(), 4, "S16LE");

        assert_eq!(a.seen.load(Ordering::SeqCst), 1);
        assert_eq!(b.seen.load(Ordering::SeqCst), 2);

        registry.remove_all();
        assert!(registry.is_empty());
    }

    struct SelfRemoving {
        registry: Arc<ConsumerRegistry>,
    }

    impl BufferConsumer for SelfRemoving {
        fn consume_buffer(&self, _buffer: &Buffer, _pipeline_id: u32, _format: &str) {
            // Would deadlock if delivery held the registry lock
            self.registry.remove_all();
        }
    }

    #[test]
    fn test_consumer_may_mutate_registry() {
        let registry = Arc::new(ConsumerRegistry::new());
        registry.add(Arc::new(SelfRemoving {
            registry: Arc::clone(&registry),
        }));
        registry.deliver(&buffer(), 4, "S16LE");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_spectrum_consumer_ignores_raw_formats() {
        let consumer = SpectrumConsumer::new(44100.0, 30);
        let raw = Buffer::new(
            vec![0; 16],
            Caps::new(SampleFormat::F64LE, 44100, 2),
            None,
            None,
        );
        consumer.consume_buffer(&raw, 1, "F64LE");
        consumer.consume_buffer(&buffer(), 1, "S16LE");
        assert_eq!(consumer.spectrum().len(), NUM_BINS);
    }
}
