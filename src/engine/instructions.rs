//! Instructions executed by the reference engine.
//!
//! Every instruction reads and writes ranges of one unified computation buffer. Layer `i`
//! of the model occupies `buffer[offset_i..offset_i + size_i]`.

use std::ops::Range;

use super::activation::Activation;
use super::dot::DotKernel;
use crate::errors::{ModelDefinitionError, ModelResult};

/// Base trait for all instruction types.
pub trait Instruction: Send + Sync {
    /// First index in the buffer written by the instruction.
    fn output_ptr(&self) -> usize;

    /// Number of values written at [`Instruction::output_ptr`].
    fn data_size(&self) -> usize;

    fn apply(&self, buffer: &mut [f32], kernel: DotKernel) -> ModelResult<()>;
}

/// Splits `buffer` into a read-only input range and a writable output range.
///
/// The ranges must not overlap.
fn split_ranges(
    buffer: &mut [f32],
    input: Range<usize>,
    output: Range<usize>,
) -> (&[f32], &mut [f32]) {
    if input.end <= output.start {
        let (left, right) = buffer.split_at_mut(output.start);
        (&left[input], &mut right[..output.len()])
    } else {
        let (left, right) = buffer.split_at_mut(input.start);
        (&right[..input.len()], &mut left[output])
    }
}

/// Dense layer followed by an optional activation.
pub struct DotInstruction {
    /// Row-major, `data_size` rows of `input_size` columns.
    weights: Vec<f32>,
    bias: Vec<f32>,
    input_ptr: usize,
    input_size: usize,
    output_ptr: usize,
    data_size: usize,
    activation: Option<Activation>,
}

impl DotInstruction {
    pub fn new(
        input_ptr: usize,
        input_size: usize,
        output_ptr: usize,
        weights: &[Vec<f32>],
        bias: &[f32],
        activation: Option<Activation>,
    ) -> Self {
        Self {
            weights: weights.iter().flatten().copied().collect(),
            bias: bias.to_vec(),
            input_ptr,
            input_size,
            output_ptr,
            data_size: bias.len(),
            activation,
        }
    }
}

impl Instruction for DotInstruction {
    fn output_ptr(&self) -> usize {
        self.output_ptr
    }

    fn data_size(&self) -> usize {
        self.data_size
    }

    fn apply(&self, buffer: &mut [f32], kernel: DotKernel) -> ModelResult<()> {
        let (input, output) = split_ranges(
            buffer,
            self.input_ptr..self.input_ptr + self.input_size,
            self.output_ptr..self.output_ptr + self.data_size,
        );

        for ((value, row), &bias) in output
            .iter_mut()
            .zip(self.weights.chunks_exact(self.input_size.max(1)))
            .zip(&self.bias)
        {
            *value = kernel.dot(row, input) + bias;
        }

        if let Some(activation) = self.activation {
            activation.apply_in_place(output);
        }
        Ok(())
    }
}

/// Copies a whole buffer into another one, starting at an internal offset.
pub struct CopyInstruction {
    input_ptr: usize,
    output_ptr: usize,
    data_size: usize,
}

impl CopyInstruction {
    pub fn new(input_ptr: usize, output_ptr: usize, data_size: usize) -> Self {
        Self {
            input_ptr,
            output_ptr,
            data_size,
        }
    }
}

impl Instruction for CopyInstruction {
    fn output_ptr(&self) -> usize {
        self.output_ptr
    }

    fn data_size(&self) -> usize {
        self.data_size
    }

    fn apply(&self, buffer: &mut [f32], _kernel: DotKernel) -> ModelResult<()> {
        buffer.copy_within(
            self.input_ptr..self.input_ptr + self.data_size,
            self.output_ptr,
        );
        Ok(())
    }
}

/// Applies an activation function in place.
pub struct ActivationInstruction {
    activation: Activation,
    output_ptr: usize,
    data_size: usize,
}

impl ActivationInstruction {
    pub fn new(activation: Activation, output_ptr: usize, data_size: usize) -> Self {
        Self {
            activation,
            output_ptr,
            data_size,
        }
    }
}

impl Instruction for ActivationInstruction {
    fn output_ptr(&self) -> usize {
        self.output_ptr
    }

    fn data_size(&self) -> usize {
        self.data_size
    }

    fn apply(&self, buffer: &mut [f32], _kernel: DotKernel) -> ModelResult<()> {
        let range = self.output_ptr..self.output_ptr + self.data_size;
        self.activation.apply_in_place(&mut buffer[range]);
        Ok(())
    }
}

/// Element-wise sum of several equally sized buffers.
pub struct AddBuffersInstruction {
    input_ptrs: Vec<usize>,
    output_ptr: usize,
    data_size: usize,
}

impl AddBuffersInstruction {
    pub fn new(input_ptrs: Vec<usize>, output_ptr: usize, data_size: usize) -> Self {
        Self {
            input_ptrs,
            output_ptr,
            data_size,
        }
    }
}

impl Instruction for AddBuffersInstruction {
    fn output_ptr(&self) -> usize {
        self.output_ptr
    }

    fn data_size(&self) -> usize {
        self.data_size
    }

    fn apply(&self, buffer: &mut [f32], _kernel: DotKernel) -> ModelResult<()> {
        if self.input_ptrs.len() < 2 {
            return Err(ModelDefinitionError::InsufficientInputBuffers);
        }

        // An input may alias the output, so sum each position before writing it.
        for i in 0..self.data_size {
            let sum: f32 = self.input_ptrs.iter().map(|&ptr| buffer[ptr + i]).sum();
            buffer[self.output_ptr + i] = sum;
        }
        Ok(())
    }
}
