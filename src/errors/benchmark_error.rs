//! Error types for benchmark operations.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;

use super::{EngineError, EvaluatorError, ValidationError};
use crate::engine::ElementType;

/// Outcome of a failed harness call. Every variant maps to a distinct result at the boundary.
#[derive(Debug)]
pub enum BenchmarkError {
    Validation(ValidationError),
    ModelLoad {
        path: PathBuf,
        source: EngineError,
    },
    Allocation {
        source: EngineError,
    },
    Inference {
        iteration: usize,
        source: EngineError,
    },
    UnsupportedType {
        element_type: ElementType,
    },
    InputRejected {
        sequence_index: usize,
        sample_index: usize,
        source: EngineError,
    },
    InputProducer {
        sequence_index: usize,
        sample_index: usize,
    },
    ModelUnusable,
    DumpDisabled,
    DumpDirectory {
        path: PathBuf,
    },
    DumpIo {
        path: PathBuf,
        source: std::io::Error,
    },
    IncompleteInputSet {
        timeout_sec: f32,
        expected: usize,
        received: usize,
    },
    Evaluator(EvaluatorError),
    Dataset {
        path: PathBuf,
        message: String,
    },
    ConfigParse {
        path: String,
        source: serde_json::Error,
    },
    ConfigValidation {
        field: String,
        message: String,
    },
    Io {
        source: std::io::Error,
    },
}

impl fmt::Display for BenchmarkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BenchmarkError::Validation(source) => write!(f, "Invalid sequence data: {}", source),
            BenchmarkError::ModelLoad { path, source } => {
                write!(f, "Failed to load model {}: {}", path.display(), source)
            }
            BenchmarkError::Allocation { source } => write!(f, "{}", source),
            BenchmarkError::Inference { iteration, source } => {
                write!(f, "Inference {} failed: {}", iteration, source)
            }
            BenchmarkError::UnsupportedType { element_type } => {
                write!(f, "Tensor type {} not supported", element_type)
            }
            BenchmarkError::InputRejected {
                sequence_index,
                sample_index,
                source,
            } => write!(
                f,
                "Input of sequence {} sample {} rejected: {}",
                sequence_index, sample_index, source
            ),
            BenchmarkError::InputProducer {
                sequence_index,
                sample_index,
            } => write!(
                f,
                "Input producer failed for sequence {} sample {}",
                sequence_index, sample_index
            ),
            BenchmarkError::ModelUnusable => {
                write!(f, "The model failed to allocate its tensors and must be destroyed")
            }
            BenchmarkError::DumpDisabled => write!(
                f,
                "Intermediate tensors dump is disabled for this model, impossible to proceed"
            ),
            BenchmarkError::DumpDirectory { path } => write!(
                f,
                "Dump directory {} doesn't exist or is not a directory",
                path.display()
            ),
            BenchmarkError::DumpIo { path, source } => {
                write!(f, "Failed to write {}: {}", path.display(), source)
            }
            BenchmarkError::IncompleteInputSet {
                timeout_sec,
                expected,
                received,
            } => write!(
                f,
                "Failed to evaluate complete input set, in {} seconds expected: {}, received: {}",
                timeout_sec, expected, received
            ),
            BenchmarkError::Evaluator(source) => write!(f, "Evaluator failed: {}", source),
            BenchmarkError::Dataset { path, message } => {
                write!(f, "Invalid dataset {}: {}", path.display(), message)
            }
            BenchmarkError::ConfigParse { path, source } => {
                write!(
                    f,
                    "Failed to parse configuration file '{}': {}",
                    path, source
                )
            }
            BenchmarkError::ConfigValidation { field, message } => {
                write!(
                    f,
                    "Configuration validation error for field '{}': {}",
                    field, message
                )
            }
            BenchmarkError::Io { source } => write!(f, "IO error: {}", source),
        }
    }
}

impl Error for BenchmarkError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BenchmarkError::Validation(source) => Some(source),
            BenchmarkError::ModelLoad { source, .. } => Some(source),
            BenchmarkError::Allocation { source } => Some(source),
            BenchmarkError::Inference { source, .. } => Some(source),
            BenchmarkError::InputRejected { source, .. } => Some(source),
            BenchmarkError::DumpIo { source, .. } => Some(source),
            BenchmarkError::Evaluator(source) => Some(source),
            BenchmarkError::ConfigParse { source, .. } => Some(source),
            BenchmarkError::Io { source } => Some(source),
            _ => None,
        }
    }
}

impl From<ValidationError> for BenchmarkError {
    fn from(error: ValidationError) -> Self {
        BenchmarkError::Validation(error)
    }
}

impl From<EvaluatorError> for BenchmarkError {
    fn from(error: EvaluatorError) -> Self {
        BenchmarkError::Evaluator(error)
    }
}

impl From<std::io::Error> for BenchmarkError {
    fn from(error: std::io::Error) -> Self {
        BenchmarkError::Io { source: error }
    }
}

pub type BenchmarkResult<T> = Result<T, BenchmarkError>;
