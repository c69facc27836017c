//! Validated, executable form of an [`InstructionModelInfo`].

use std::ops::Range;

use super::dot::DotKernel;
use super::instructions::{
    ActivationInstruction, AddBuffersInstruction, CopyInstruction, DotInstruction, Instruction,
};
use super::model_file::{InstructionInfo, InstructionModelInfo};
use crate::errors::{ModelDefinitionError, ModelResult};

/// A dense network expressed as a sequence of instructions over one computation buffer.
///
/// Layer 0 is the input layer and the last layer is the output layer. Layers that no
/// instruction of a pass overwrites keep their values between passes, which is how
/// recurrent state is carried.
pub struct InstructionModel {
    instructions: Vec<Box<dyn Instruction>>,
    feature_size: usize,
    computation_buffer_sizes: Vec<usize>,
    computation_buffer_indexes: Vec<usize>,
    output_index_start: usize,
    output_index_end: usize,
}

impl InstructionModel {
    pub fn new(info: &InstructionModelInfo) -> ModelResult<Self> {
        Self::validate_inputs(info)?;

        let computation_buffer_sizes = info.computation_buffer_sizes.clone();
        let computation_buffer_indexes = Self::calculate_indexes(&computation_buffer_sizes);
        let output_index_end = computation_buffer_sizes.iter().sum::<usize>();
        let output_index_start =
            output_index_end - computation_buffer_sizes[computation_buffer_sizes.len() - 1];

        let instructions = Self::validate_and_create_instructions(
            info,
            &computation_buffer_indexes,
            &computation_buffer_sizes,
        )?;

        Ok(Self {
            instructions,
            feature_size: info.feature_size,
            computation_buffer_sizes,
            computation_buffer_indexes,
            output_index_start,
            output_index_end,
        })
    }

    fn validate_inputs(info: &InstructionModelInfo) -> ModelResult<()> {
        if info.computation_buffer_sizes.is_empty() {
            return Err(ModelDefinitionError::NoLayersProvided);
        }
        if info.instructions.is_empty() {
            return Err(ModelDefinitionError::NoInstructionsProvided);
        }
        if let Some(index) = info.computation_buffer_sizes.iter().position(|&s| s == 0) {
            return Err(ModelDefinitionError::InvalidLayerSize { index });
        }
        if info.computation_buffer_sizes[0] != info.feature_size {
            return Err(ModelDefinitionError::InputLayerSizeMismatch {
                feature_size: info.feature_size,
                input_layer_size: info.computation_buffer_sizes[0],
            });
        }
        if info.bias.len() != info.weights.len() {
            return Err(ModelDefinitionError::BiasWeightsMismatch {
                bias: info.bias.len(),
                weights: info.weights.len(),
            });
        }
        Ok(())
    }

    fn calculate_indexes(sizes: &[usize]) -> Vec<usize> {
        sizes
            .iter()
            .scan(0usize, |offset, &size| {
                let start = *offset;
                *offset += size;
                Some(start)
            })
            .collect()
    }

    fn validate_buffer_index(label: &str, index: usize, layers: usize) -> ModelResult<()> {
        if index >= layers {
            return Err(ModelDefinitionError::BufferIndexOutOfBounds {
                label: label.to_string(),
                index,
            });
        }
        Ok(())
    }

    fn validate_and_create_instructions(
        info: &InstructionModelInfo,
        indexes: &[usize],
        sizes: &[usize],
    ) -> ModelResult<Vec<Box<dyn Instruction>>> {
        let mut used_weights = vec![false; info.weights.len()];
        let mut instructions: Vec<Box<dyn Instruction>> =
            Vec::with_capacity(info.instructions.len());

        for instruction_info in &info.instructions {
            for input in instruction_info.inputs() {
                Self::validate_buffer_index("input", input, sizes.len())?;
            }
            Self::validate_buffer_index("output", instruction_info.output(), sizes.len())?;

            let instruction: Box<dyn Instruction> = match instruction_info {
                InstructionInfo::Dot {
                    input,
                    output,
                    weights,
                    activation,
                } => {
                    if input == output {
                        return Err(ModelDefinitionError::SameInputOutputIndexes {
                            instruction_type: instruction_info.type_name().to_string(),
                        });
                    }
                    let matrix = info
                        .weights
                        .get(*weights)
                        .ok_or(ModelDefinitionError::WeightsIndexOutOfBounds { index: *weights })?;
                    let bias = &info.bias[*weights];

                    let (input_size, output_size) = (sizes[*input], sizes[*output]);
                    if matrix.len() != output_size {
                        return Err(ModelDefinitionError::WeightsRowSizeMismatch {
                            weights_rows: matrix.len(),
                            output_size,
                        });
                    }
                    if bias.len() != output_size {
                        return Err(ModelDefinitionError::BiasOutputSizeMismatch {
                            bias_size: bias.len(),
                            output_size,
                        });
                    }
                    if let Some((row, columns)) = matrix
                        .iter()
                        .enumerate()
                        .find(|(_, columns)| columns.len() != input_size)
                    {
                        return Err(ModelDefinitionError::WeightsColumnSizeMismatch {
                            row,
                            weights_columns: columns.len(),
                            input_size,
                        });
                    }

                    used_weights[*weights] = true;
                    Box::new(DotInstruction::new(
                        indexes[*input],
                        input_size,
                        indexes[*output],
                        matrix,
                        bias,
                        *activation,
                    ))
                }
                InstructionInfo::Copy {
                    input,
                    output,
                    internal_index,
                } => {
                    let data_size = sizes[*input];
                    let fits = internal_index
                        .checked_add(data_size)
                        .is_some_and(|end| end <= sizes[*output]);
                    if !fits {
                        return Err(ModelDefinitionError::InternalIndexOutOfBounds {
                            internal_index: *internal_index,
                            data_size,
                            output_size: sizes[*output],
                        });
                    }
                    if input == output {
                        return Err(ModelDefinitionError::SameInputOutputIndexes {
                            instruction_type: instruction_info.type_name().to_string(),
                        });
                    }
                    Box::new(CopyInstruction::new(
                        indexes[*input],
                        indexes[*output] + internal_index,
                        data_size,
                    ))
                }
                InstructionInfo::Activation { input, activation } => Box::new(
                    ActivationInstruction::new(*activation, indexes[*input], sizes[*input]),
                ),
                InstructionInfo::AddBuffers { input, output } => {
                    if input.len() < 2 {
                        return Err(ModelDefinitionError::InsufficientInputBuffers);
                    }
                    let expected_size = sizes[*output];
                    if let Some(&index) = input.iter().find(|&&i| sizes[i] != expected_size) {
                        return Err(ModelDefinitionError::InputBufferSizeMismatch {
                            index,
                            actual_size: sizes[index],
                            expected_size,
                        });
                    }
                    Box::new(AddBuffersInstruction::new(
                        input.iter().map(|&i| indexes[i]).collect(),
                        indexes[*output],
                        expected_size,
                    ))
                }
            };
            instructions.push(instruction);
        }

        if let Some(index) = used_weights.iter().position(|used| !used) {
            return Err(ModelDefinitionError::UnusedWeights { index });
        }

        Ok(instructions)
    }

    /// Runs every instruction over `buffer`, whose input layer must already be filled.
    pub fn predict_with_buffer(&self, buffer: &mut [f32], kernel: DotKernel) -> ModelResult<()> {
        if buffer.len() < self.output_index_end {
            return Err(ModelDefinitionError::ComputationBufferTooSmall {
                buffer_size: buffer.len(),
                required_size: self.output_index_end,
            });
        }

        for instruction in &self.instructions {
            instruction.apply(buffer, kernel)?;
        }
        Ok(())
    }

    /// Size of the computation buffer the model needs.
    pub fn required_memory(&self) -> usize {
        self.output_index_end
    }

    pub fn feature_size(&self) -> usize {
        self.feature_size
    }

    pub fn output_size(&self) -> usize {
        self.output_index_end - self.output_index_start
    }

    pub fn output_range(&self) -> Range<usize> {
        self.output_index_start..self.output_index_end
    }

    pub fn layer_count(&self) -> usize {
        self.computation_buffer_sizes.len()
    }

    /// Range of layer `index` inside the computation buffer.
    pub fn layer_range(&self, index: usize) -> Range<usize> {
        let start = self.computation_buffer_indexes[index];
        start..start + self.computation_buffer_sizes[index]
    }
}
