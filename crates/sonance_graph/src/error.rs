//! Graph Error Types

use gstreamer as gst;
use thiserror::Error;

use crate::element::ElementKind;

/// Errors from building or driving the media graph
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("GStreamer initialization failed: {0}")]
    Init(#[from] gst::glib::Error),

    #[error("Element not available: {0}")]
    ElementUnavailable(String),

    #[error("Element {name} is not a {expected}")]
    WrongElementKind { name: String, expected: ElementKind },

    #[error("Failed to assemble the graph: {0}")]
    Assemble(#[from] gst::glib::BoolError),

    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Discoverer unavailable: {0}")]
    Discoverer(String),

    #[error("Failed to spawn thread: {0}")]
    ThreadSpawn(String),

    #[error("Discoverer is not running")]
    DiscovererStopped,
}

pub type GraphResult<T> = Result<T, GraphError>;
