//! Reference [`InferenceEngine`] backed by an [`InstructionModel`].

use std::fs;
use std::path::Path;

use super::dot::DotKernel;
use super::instruction_model::InstructionModel;
use super::model_file::{ModelFile, Quantization, TensorSpec};
use super::{ElementType, EngineOptions, InferenceEngine, TensorView};
use crate::errors::{EngineError, EngineResult};

/// Instruction-sequence engine with one quantizable input and one output tensor.
///
/// The computation buffer lives as long as the engine, so layers that a pass does not
/// overwrite carry state into the next pass until [`InferenceEngine::reset_state`].
pub struct InstructionEngine {
    model: InstructionModel,
    input_spec: TensorSpec,
    output_spec: TensorSpec,
    input_shape: Vec<i32>,
    input_bytes: Vec<u8>,
    output_bytes: Vec<u8>,
    buffer: Vec<f32>,
    use_acceleration: bool,
    kernel: DotKernel,
    dump_intermediates: bool,
    layer_bytes: Vec<Vec<u8>>,
}

impl InstructionEngine {
    /// Builds an engine from an already parsed model file.
    pub fn from_model_file(file: ModelFile, options: EngineOptions) -> EngineResult<Self> {
        let model = InstructionModel::new(&file.model)?;

        if let Some(shape) = &file.output.shape {
            let count = Self::element_count(shape)?;
            if count != model.output_size() {
                return Err(EngineError::Allocation {
                    reason: format!(
                        "output shape {:?} holds {} values but the output layer has {}",
                        shape,
                        count,
                        model.output_size()
                    ),
                });
            }
        }

        let input_shape = vec![1, model.feature_size() as i32];
        let input_len = model.feature_size() * file.input.element_type.size_in_bytes();
        let output_len = model.output_size() * file.output.element_type.size_in_bytes();
        let layer_count = model.layer_count();

        let mut engine = Self {
            buffer: vec![0.0; model.required_memory()],
            model,
            input_shape,
            input_bytes: vec![0; input_len],
            output_bytes: vec![0; output_len],
            use_acceleration: options.use_acceleration,
            kernel: DotKernel::select(options.use_acceleration),
            dump_intermediates: options.dump_intermediates,
            layer_bytes: if options.dump_intermediates {
                vec![Vec::new(); layer_count]
            } else {
                Vec::new()
            },
            input_spec: file.input,
            output_spec: file.output,
        };

        if let Some(shape) = engine.input_spec.shape.clone() {
            engine.resize_input(&shape)?;
        }

        log::debug!(
            "Instruction engine ready: {} layers, {} input values, {} output values, kernel {:?}",
            layer_count,
            engine.model.feature_size(),
            engine.model.output_size(),
            engine.kernel
        );
        Ok(engine)
    }

    pub fn input_shape(&self) -> &[i32] {
        &self.input_shape
    }

    pub fn input_element_type(&self) -> ElementType {
        self.input_spec.element_type
    }

    pub fn kernel(&self) -> DotKernel {
        self.kernel
    }

    fn element_count(shape: &[i32]) -> EngineResult<usize> {
        if shape.is_empty() || shape.iter().any(|&dim| dim <= 0) {
            return Err(EngineError::Allocation {
                reason: format!("invalid tensor shape {:?}", shape),
            });
        }
        shape
            .iter()
            .try_fold(1usize, |count, &dim| count.checked_mul(dim as usize))
            .ok_or_else(|| EngineError::Allocation {
                reason: format!("tensor shape {:?} overflows the address space", shape),
            })
    }

    fn check_input_type(&self) -> EngineResult<()> {
        let element_type = self.input_spec.element_type;
        if !element_type.is_benchmark_supported() {
            return Err(EngineError::UnsupportedType { element_type });
        }
        Ok(())
    }

    fn decode_input(&mut self) -> EngineResult<()> {
        let input = &mut self.buffer[..self.model.feature_size()];
        match self.input_spec.element_type {
            ElementType::Float32 => {
                for (value, bytes) in input.iter_mut().zip(self.input_bytes.chunks_exact(4)) {
                    *value = f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                }
            }
            ElementType::UInt8 => {
                let Quantization { scale, zero_point } = self.input_spec.quantization_or_default();
                for (value, &q) in input.iter_mut().zip(&self.input_bytes) {
                    *value = scale * (q as i32 - zero_point) as f32;
                }
            }
            element_type => return Err(EngineError::UnsupportedType { element_type }),
        }
        Ok(())
    }

    fn encode_output(&mut self) {
        let output = &self.buffer[self.model.output_range()];
        match self.output_spec.element_type {
            ElementType::Float32 => {
                for (bytes, value) in self.output_bytes.chunks_exact_mut(4).zip(output) {
                    bytes.copy_from_slice(&value.to_ne_bytes());
                }
            }
            ElementType::UInt8 => {
                let Quantization { scale, zero_point } = self.output_spec.quantization_or_default();
                for (byte, value) in self.output_bytes.iter_mut().zip(output) {
                    let q = (value / scale).round() + zero_point as f32;
                    *byte = q.clamp(0.0, 255.0) as u8;
                }
            }
            ElementType::Int32 => {
                for (bytes, value) in self.output_bytes.chunks_exact_mut(4).zip(output) {
                    bytes.copy_from_slice(&(value.round() as i32).to_ne_bytes());
                }
            }
        }
    }

    fn snapshot_layers(&mut self) {
        for (index, snapshot) in self.layer_bytes.iter_mut().enumerate() {
            let layer = &self.buffer[self.model.layer_range(index)];
            snapshot.clear();
            snapshot.extend(layer.iter().flat_map(|value| value.to_ne_bytes()));
        }
    }
}

impl InferenceEngine for InstructionEngine {
    fn load(path: &Path, options: EngineOptions) -> EngineResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ModelFile =
            serde_json::from_str(&content).map_err(|source| EngineError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        log::info!(
            "Loaded model {} (input {}, output {})",
            path.display(),
            file.input.element_type,
            file.output.element_type
        );
        Self::from_model_file(file, options)
    }

    fn resize_input(&mut self, shape: &[i32]) -> EngineResult<()> {
        let count = Self::element_count(shape)?;
        if count != self.model.feature_size() {
            return Err(EngineError::Allocation {
                reason: format!(
                    "input shape {:?} holds {} values but the model expects {}",
                    shape,
                    count,
                    self.model.feature_size()
                ),
            });
        }

        let len = count
            .checked_mul(self.input_spec.element_type.size_in_bytes())
            .ok_or_else(|| EngineError::Allocation {
                reason: format!("input shape {:?} overflows the address space", shape),
            })?;
        self.input_shape = shape.to_vec();
        self.input_bytes = vec![0; len];
        self.buffer.fill(0.0);
        Ok(())
    }

    fn set_input(&mut self, bytes: &[u8]) -> EngineResult<()> {
        self.check_input_type()?;
        if bytes.len() != self.input_bytes.len() {
            return Err(EngineError::InputSizeMismatch {
                expected: self.input_bytes.len(),
                actual: bytes.len(),
            });
        }
        self.input_bytes.copy_from_slice(bytes);
        Ok(())
    }

    fn input_buffer_mut(&mut self) -> EngineResult<&mut [u8]> {
        self.check_input_type()?;
        Ok(&mut self.input_bytes)
    }

    fn run(&mut self) -> EngineResult<()> {
        self.decode_input()?;
        self.model
            .predict_with_buffer(&mut self.buffer, self.kernel)
            .map_err(EngineError::Execution)?;
        self.encode_output();
        if self.dump_intermediates {
            self.snapshot_layers();
        }
        Ok(())
    }

    fn output(&self) -> TensorView<'_> {
        TensorView {
            element_type: self.output_spec.element_type,
            bytes: &self.output_bytes,
        }
    }

    fn reset_state(&mut self) -> EngineResult<()> {
        self.buffer.fill(0.0);
        Ok(())
    }

    fn set_use_acceleration(&mut self, enabled: bool) {
        if self.use_acceleration != enabled {
            log::debug!("Acceleration {}", if enabled { "enabled" } else { "disabled" });
        }
        self.use_acceleration = enabled;
        self.kernel = DotKernel::select(enabled);
    }

    fn intermediate_tensors(&self) -> EngineResult<Vec<TensorView<'_>>> {
        if !self.dump_intermediates {
            return Err(EngineError::IntermediatesDisabled);
        }

        let mut tensors: Vec<TensorView<'_>> = self
            .layer_bytes
            .iter()
            .map(|bytes| TensorView {
                element_type: ElementType::Float32,
                bytes,
            })
            .collect();
        tensors.push(self.output());
        Ok(tensors)
    }
}
