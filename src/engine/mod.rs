//! Inference engine adapter.
//!
//! The harness drives any engine through [`InferenceEngine`]: exactly one input tensor and
//! one output tensor per model.
//!
//! [`InstructionEngine`] is the reference backend: an instruction-sequence dense network
//! loaded from a JSON model file.

pub mod activation;
pub mod dot;
pub mod instruction_engine;
pub mod instruction_model;
pub mod instructions;
pub mod model_file;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::EngineResult;

pub use activation::Activation;
pub use instruction_engine::InstructionEngine;
pub use instruction_model::InstructionModel;
pub use model_file::{InstructionInfo, InstructionModelInfo, ModelFile, Quantization, TensorSpec};

/// Element type of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Float32,
    UInt8,
    Int32,
}

impl ElementType {
    pub fn size_in_bytes(self) -> usize {
        match self {
            ElementType::Float32 | ElementType::Int32 => 4,
            ElementType::UInt8 => 1,
        }
    }

    /// Element types the harness can feed as input and score as output.
    pub fn is_benchmark_supported(self) -> bool {
        matches!(self, ElementType::Float32 | ElementType::UInt8)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Float32 => write!(f, "float32"),
            ElementType::UInt8 => write!(f, "uint8"),
            ElementType::Int32 => write!(f, "int32"),
        }
    }
}

/// Borrowed contents of one tensor.
#[derive(Debug, Clone, Copy)]
pub struct TensorView<'a> {
    pub element_type: ElementType,
    pub bytes: &'a [u8],
}

/// Options fixed when the engine is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub use_acceleration: bool,
    /// Retain every intermediate tensor after each run so it can be dumped.
    pub dump_intermediates: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            use_acceleration: true,
            dump_intermediates: false,
        }
    }
}

/// A loaded model with a single input and a single output tensor.
pub trait InferenceEngine {
    /// Loads the model at `path` and allocates its tensors.
    fn load(path: &Path, options: EngineOptions) -> EngineResult<Self>
    where
        Self: Sized;

    /// Resizes the input tensor to `shape` and re-runs tensor allocation.
    fn resize_input(&mut self, shape: &[i32]) -> EngineResult<()>;

    /// Copies `bytes` into the input tensor. The length must equal the tensor's allocated size.
    fn set_input(&mut self, bytes: &[u8]) -> EngineResult<()>;

    /// Raw storage of the input tensor, for producers that write the input in place.
    fn input_buffer_mut(&mut self) -> EngineResult<&mut [u8]>;

    /// Executes one forward pass.
    fn run(&mut self) -> EngineResult<()>;

    /// The output tensor of the last run. Valid until the next call to [`InferenceEngine::run`].
    fn output(&self) -> TensorView<'_>;

    /// Clears recurrent state carried between runs.
    fn reset_state(&mut self) -> EngineResult<()>;

    fn set_use_acceleration(&mut self, enabled: bool);

    /// Every tensor of the last run, in a stable order.
    fn intermediate_tensors(&self) -> EngineResult<Vec<TensorView<'_>>>;
}
