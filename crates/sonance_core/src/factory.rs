//! Pipeline Factory
//!
//! The factory owns everything pipelines share: id allocation, the element
//! name counter, the element factory, the set-state worker pool and the
//! signal channel every pipeline reports on.
//!
//! ```text
//!                       ┌──────────────── PipelineFactory ───────────────┐
//! create_pipeline() ──▶ │ ids 1,2,3…   names queue2-1, volume-2, …       │
//!                       │ SetStatePool  ElementFactory  playbin maker    │
//!                       └─────────┬──────────────────────────────────────┘
//!                                 │ Sender<PipelineSignal> (cloned per pipeline)
//!                                 ▼
//!                        signals() ──▶ collaborator
//! ```

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use sonance_graph::{ElementFactory, ElementKind, GraphResult, GstPlaybin, Playbin};
use tracing::info;

use crate::config::{FactoryConfig, PipelineConfig};
use crate::error::PipelineResult;
use crate::message::PipelineSignal;
use crate::pipeline::Pipeline;
use crate::state_pool::SetStatePool;

/// Creates the playbin for a new pipeline, given its name
pub type PlaybinMaker = Arc<dyn Fn(&str) -> GraphResult<Arc<dyn Playbin>> + Send + Sync>;

/// Element name counter shared by all pipelines of a factory
#[derive(Debug, Default)]
pub struct ElementNames {
    counter: AtomicU64,
}

impl ElementNames {
    /// Next name for an element of `kind`: `<factory name>-<n>`
    pub fn next(&self, kind: ElementKind) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{}", kind.factory_name(), n)
    }
}

pub(crate) struct FactoryShared {
    pub config: FactoryConfig,
    next_id: AtomicU32,
    pub names: ElementNames,
    pub elements: ElementFactory,
    pub pool: SetStatePool,
    pub signals: Sender<PipelineSignal>,
    pub playbin_maker: PlaybinMaker,
}

impl FactoryShared {
    fn next_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

pub struct PipelineFactory {
    shared: Arc<FactoryShared>,
    signals: Receiver<PipelineSignal>,
}

impl PipelineFactory {
    /// Factory producing pipelines around GStreamer's `playbin`
    pub fn new(config: FactoryConfig) -> PipelineResult<Self> {
        Self::with_playbin(
            config,
            Arc::new(|name: &str| Ok(Arc::new(GstPlaybin::new(name)?) as Arc<dyn Playbin>)),
        )
    }

    /// Factory producing pipelines around playbins from `maker`
    pub fn with_playbin(config: FactoryConfig, maker: PlaybinMaker) -> PipelineResult<Self> {
        config.validate()?;
        sonance_graph::init()?;
        let pool = SetStatePool::new(config.set_state_workers, config.set_state_queue_depth)?;
        let (sender, receiver) = unbounded();
        info!(
            "Pipeline factory ready ({} set-state workers)",
            pool.worker_count()
        );

        Ok(Self {
            shared: Arc::new(FactoryShared {
                config,
                next_id: AtomicU32::new(1),
                names: ElementNames::default(),
                elements: ElementFactory::new(),
                pool,
                signals: sender,
                playbin_maker: maker,
            }),
            signals: receiver,
        })
    }

    /// New pipeline with the default configuration
    pub fn create_pipeline(&self) -> Pipeline {
        Pipeline::new(
            Arc::clone(&self.shared),
            self.shared.next_id(),
            PipelineConfig::default(),
        )
    }

    /// New pipeline with a validated configuration
    pub fn create_pipeline_with(&self, config: PipelineConfig) -> PipelineResult<Pipeline> {
        config.validate()?;
        Ok(Pipeline::new(
            Arc::clone(&self.shared),
            self.shared.next_id(),
            config,
        ))
    }

    /// Signals of every pipeline created by this factory
    pub fn signals(&self) -> &Receiver<PipelineSignal> {
        &self.signals
    }

    /// Element availability, e.g. to build without an equalizer
    pub fn element_factory(&self) -> &ElementFactory {
        &self.shared.elements
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.shared.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_names_count_up() {
        let names = ElementNames::default();
        assert_eq!(names.next(ElementKind::Queue), "queue2-1");
        assert_eq!(names.next(ElementKind::Volume), "volume-2");
        assert_eq!(names.next(ElementKind::Queue), "queue2-3");
    }

    #[test]
    fn test_pipeline_ids_start_at_one() {
        let factory = PipelineFactory::new(FactoryConfig::default()).unwrap();
        let a = factory.create_pipeline();
        let b = factory.create_pipeline();
        assert_eq!(a.id(), 1);
        assert_eq!(b.id(), 2);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = FactoryConfig {
            set_state_workers: 0,
            ..Default::default()
        };
        assert!(PipelineFactory::new(config).is_err());

        let factory = PipelineFactory::new(FactoryConfig::default()).unwrap();
        let bad = PipelineConfig {
            buffer_min_fill: 500,
            ..Default::default()
        };
        assert!(factory.create_pipeline_with(bad).is_err());
    }
}
