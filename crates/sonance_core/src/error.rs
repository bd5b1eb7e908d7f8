//! Pipeline Error Types

use thiserror::Error;

/// Errors from configuring or initializing a pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Required element missing: {0}")]
    MissingElement(&'static str),

    #[error("Pipeline already initialized")]
    AlreadyInitialized,

    #[error("No audio output devices found")]
    NoDevicesFound,

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(String),

    #[error("Graph error: {0}")]
    Graph(#[from] sonance_graph::GraphError),

    #[error("DSP error: {0}")]
    Dsp(#[from] sonance_dsp::DspError),

    #[error("Invalid configuration file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::MissingElement("queue2");
        assert!(err.to_string().contains("queue2"));
    }

    #[test]
    fn test_error_from_graph() {
        let graph_err = sonance_graph::GraphError::DiscovererStopped;
        let err: PipelineError = graph_err.into();
        assert!(matches!(err, PipelineError::Graph(_)));
    }

    #[test]
    fn test_error_from_dsp() {
        let dsp_err = sonance_dsp::DspError::InvalidBandIndex(12);
        let err: PipelineError = dsp_err.into();
        assert!(matches!(err, PipelineError::Dsp(_)));
    }
}
