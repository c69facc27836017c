//! Error types for inference engine operations.

use std::path::PathBuf;

use thiserror::Error;

use super::ModelDefinitionError;
use crate::engine::ElementType;

/// Errors reported by an [`InferenceEngine`](crate::engine::InferenceEngine).
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to read model file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse model file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid model: {0}")]
    InvalidModel(#[from] ModelDefinitionError),

    #[error("Failed to allocate tensors: {reason}")]
    Allocation { reason: String },

    #[error("Tensor element type {element_type} not supported")]
    UnsupportedType { element_type: ElementType },

    #[error("Input size mismatch: the input tensor holds {expected} bytes, got {actual}")]
    InputSizeMismatch { expected: usize, actual: usize },

    #[error("Failed to invoke: {0}")]
    Execution(#[source] ModelDefinitionError),

    #[error("Intermediate tensors are only retained when the model is loaded with dumping enabled")]
    IntermediatesDisabled,
}
