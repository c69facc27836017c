//! On-disk description of a reference model.
//!
//! A model file is a JSON document holding the tensor specs of the single input and output
//! and the instruction sequence computing one from the other:
//!
//! ```json
//! {
//!   "input": { "element_type": "float32" },
//!   "output": { "element_type": "uint8", "quantization": { "scale": 0.01, "zero_point": 0 } },
//!   "model": {
//!     "feature_size": 2,
//!     "computation_buffer_sizes": [2, 1],
//!     "instructions": [{ "type": "DOT", "input": 0, "output": 1, "weights": 0 }],
//!     "weights": [[[0.5, -0.5]]],
//!     "bias": [[0.0]]
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};

use super::ElementType;
use super::activation::Activation;

fn default_element_type() -> ElementType {
    ElementType::Float32
}

/// Affine quantization parameters: `real = scale * (quantized - zero_point)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantization {
    pub scale: f32,
    pub zero_point: i32,
}

impl Default for Quantization {
    fn default() -> Self {
        Self {
            scale: 1.0,
            zero_point: 0,
        }
    }
}

/// Element type, declared shape and quantization of a model tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorSpec {
    #[serde(default = "default_element_type")]
    pub element_type: ElementType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<i32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantization: Option<Quantization>,
}

impl TensorSpec {
    pub fn float32() -> Self {
        Self {
            element_type: ElementType::Float32,
            shape: None,
            quantization: None,
        }
    }

    pub fn quantization_or_default(&self) -> Quantization {
        self.quantization.unwrap_or_default()
    }
}

/// Instruction entry of a model file, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InstructionInfo {
    /// Dense layer: `output = activation(weights * input + bias)`.
    #[serde(rename = "DOT")]
    Dot {
        input: usize,
        output: usize,
        weights: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        activation: Option<Activation>,
    },
    /// Copies the whole input buffer into the output buffer starting at `internal_index`.
    #[serde(rename = "COPY")]
    Copy {
        input: usize,
        output: usize,
        #[serde(default)]
        internal_index: usize,
    },
    /// In-place activation of one buffer.
    #[serde(rename = "ACTIVATION")]
    Activation { input: usize, activation: Activation },
    /// Element-wise sum of two or more equally sized buffers.
    #[serde(rename = "ADD_ELEMENTWISE_BUFFERS")]
    AddBuffers { input: Vec<usize>, output: usize },
}

impl InstructionInfo {
    pub fn inputs(&self) -> Vec<usize> {
        match self {
            InstructionInfo::Dot { input, .. }
            | InstructionInfo::Copy { input, .. }
            | InstructionInfo::Activation { input, .. } => vec![*input],
            InstructionInfo::AddBuffers { input, .. } => input.clone(),
        }
    }

    /// Buffer written by the instruction. Activations operate in place.
    pub fn output(&self) -> usize {
        match self {
            InstructionInfo::Dot { output, .. }
            | InstructionInfo::Copy { output, .. }
            | InstructionInfo::AddBuffers { output, .. } => *output,
            InstructionInfo::Activation { input, .. } => *input,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            InstructionInfo::Dot { .. } => "DOT",
            InstructionInfo::Copy { .. } => "COPY",
            InstructionInfo::Activation { .. } => "ACTIVATION",
            InstructionInfo::AddBuffers { .. } => "ADD_ELEMENTWISE_BUFFERS",
        }
    }
}

/// Layer sizes, instructions and parameters of an instruction model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionModelInfo {
    pub feature_size: usize,
    pub computation_buffer_sizes: Vec<usize>,
    pub instructions: Vec<InstructionInfo>,
    #[serde(default)]
    pub weights: Vec<Vec<Vec<f32>>>,
    #[serde(default)]
    pub bias: Vec<Vec<f32>>,
}

/// A complete model file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFile {
    #[serde(default = "TensorSpec::float32")]
    pub input: TensorSpec,
    #[serde(default = "TensorSpec::float32")]
    pub output: TensorSpec,
    pub model: InstructionModelInfo,
}
