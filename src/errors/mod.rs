//! Error types for the benchmark harness.
//!
//! Each layer reports its own error type. Engine and validation failures are folded into
//! [`BenchmarkError`] at the harness boundary so callers see one taxonomy.

mod benchmark_error;
mod engine_error;
mod evaluator_error;
mod model_definition_error;
mod validation_error;

pub use benchmark_error::{BenchmarkError, BenchmarkResult};
pub use engine_error::EngineError;
pub use evaluator_error::EvaluatorError;
pub use model_definition_error::ModelDefinitionError;
pub use validation_error::{BufferRole, ValidationError};

/// Result type alias for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Result type alias for instruction model operations.
pub type ModelResult<T> = std::result::Result<T, ModelDefinitionError>;

/// Result type alias for sequence data validation.
pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

/// Result type alias for accuracy evaluators.
pub type EvaluatorResult<T> = std::result::Result<T, EvaluatorError>;
