//! Benchmark harness for neural-network inference engines.
//!
//! A host lends input and golden-output byte arrays, organized into stateful sequences, and
//! the harness drives an [`InferenceEngine`](engine::InferenceEngine) over them: timing each
//! forward pass, scoring outputs against golden data, and optionally dumping every
//! intermediate tensor. Borrowed arrays are released exactly once on every exit path.
//!
//! The [`ffi`] module exposes the harness through a C ABI; [`benchmarks`] runs it from a
//! JSON configuration with the reference [`InstructionEngine`](engine::InstructionEngine).

pub mod benchmark_model;
pub mod benchmarks;
pub mod dataset;
pub mod engine;
pub mod errors;
pub mod evaluators;
pub mod ffi;
pub mod foreign_buffer;
pub mod layer_dump;
pub mod metrics;
pub mod sequence;
pub mod trace;

pub use benchmark_model::{BenchmarkModel, InferenceResult, RunFlags};
pub use dataset::{Dataset, SampleData};
pub use engine::{ElementType, EngineOptions, InferenceEngine, InstructionEngine, TensorView};
pub use errors::{BenchmarkError, BenchmarkResult};
pub use foreign_buffer::{ArrayHandle, BufferHost, HostError, PinnedBytes};
pub use metrics::{OutputError, compute_output_error};
pub use sequence::{SampleSource, SequenceSetSource};
