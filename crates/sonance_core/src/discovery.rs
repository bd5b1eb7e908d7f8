//! Stream Discovery Bridge
//!
//! Each pipeline owns a [`Discoverer`]. Its results are handed to the
//! owner thread as [`RuntimeEvent::Discovered`] and turned into metadata
//! there, so the discoverer thread never touches pipeline state.

use std::sync::Arc;
use std::time::Duration;

use sonance_graph::{Discoverer, DiscovererInfo};
use tracing::{debug, error};

use crate::config::FactoryConfig;
use crate::error::PipelineResult;
use crate::message::RuntimeEvent;
use crate::shared::PipelineShared;

pub(crate) struct StreamDiscovery {
    pipeline_id: u32,
    discoverer: Discoverer,
}

impl StreamDiscovery {
    pub fn start(shared: &Arc<PipelineShared>, config: &FactoryConfig) -> PipelineResult<Self> {
        let discoverer = Discoverer::new(
            Duration::from_millis(config.discovery_timeout_ms),
            config.discovery_queue_depth,
        )?;

        let weak = Arc::downgrade(shared);
        discoverer.connect_discovered(Arc::new(move |info: &DiscovererInfo| {
            if let Some(shared) = weak.upgrade() {
                shared.post(RuntimeEvent::Discovered(info.clone()));
            }
        }));

        Ok(Self {
            pipeline_id: shared.id,
            discoverer,
        })
    }

    /// Queue discovery of `uri`; failures are logged only
    pub fn request(&self, uri: &str) {
        match self.discoverer.discover_uri_async(uri) {
            Ok(true) => debug!("Pipeline {}: discovering {}", self.pipeline_id, uri),
            Ok(false) => {}
            Err(e) => error!(
                "Pipeline {}: failed to start stream discovery for {}: {}",
                self.pipeline_id, uri, e
            ),
        }
    }
}

impl Drop for StreamDiscovery {
    fn drop(&mut self) {
        self.discoverer.disconnect();
        self.discoverer.stop();
    }
}
