//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use nn_benchmark::engine::{ElementType, EngineOptions, InferenceEngine, TensorView};
use nn_benchmark::errors::{EngineError, EngineResult, ModelDefinitionError};
use nn_benchmark::foreign_buffer::{ArrayHandle, BufferHost, HostError, PinnedBytes};
use nn_benchmark::{BenchmarkModel, Dataset, SampleData};

/// Engine whose output is a copy of its input, recording every call it receives.
pub struct ScriptedEngine {
    element_type: ElementType,
    input: Vec<u8>,
    output: Vec<u8>,
    dump: bool,
    /// Run number at which `run` fails, counted from 0.
    pub fail_at_run: Option<usize>,
    /// Time each `run` takes.
    pub run_delay: Option<Duration>,
    pub runs: usize,
    /// Number of completed runs at each reset.
    pub resets: Vec<usize>,
    pub inputs_seen: Vec<Vec<u8>>,
    pub acceleration: Vec<bool>,
}

impl ScriptedEngine {
    pub fn new(element_type: ElementType, input_len: usize) -> Self {
        Self {
            element_type,
            input: vec![0; input_len],
            output: vec![0; input_len],
            dump: false,
            fail_at_run: None,
            run_delay: None,
            runs: 0,
            resets: Vec::new(),
            inputs_seen: Vec::new(),
            acceleration: Vec::new(),
        }
    }

    pub fn with_dump(mut self) -> Self {
        self.dump = true;
        self
    }

    fn check_type(&self) -> EngineResult<()> {
        if !self.element_type.is_benchmark_supported() {
            return Err(EngineError::UnsupportedType {
                element_type: self.element_type,
            });
        }
        Ok(())
    }
}

impl InferenceEngine for ScriptedEngine {
    fn load(_path: &Path, options: EngineOptions) -> EngineResult<Self> {
        let mut engine = Self::new(ElementType::Float32, 4);
        engine.dump = options.dump_intermediates;
        Ok(engine)
    }

    fn resize_input(&mut self, shape: &[i32]) -> EngineResult<()> {
        if shape.iter().any(|&dim| dim <= 0) {
            return Err(EngineError::Allocation {
                reason: format!("invalid shape {:?}", shape),
            });
        }
        let count: usize = shape.iter().map(|&dim| dim as usize).product();
        self.input = vec![0; count * self.element_type.size_in_bytes()];
        Ok(())
    }

    fn set_input(&mut self, bytes: &[u8]) -> EngineResult<()> {
        self.check_type()?;
        if bytes.len() != self.input.len() {
            return Err(EngineError::InputSizeMismatch {
                expected: self.input.len(),
                actual: bytes.len(),
            });
        }
        self.input.copy_from_slice(bytes);
        Ok(())
    }

    fn input_buffer_mut(&mut self) -> EngineResult<&mut [u8]> {
        self.check_type()?;
        Ok(&mut self.input)
    }

    fn run(&mut self) -> EngineResult<()> {
        if self.fail_at_run == Some(self.runs) {
            return Err(EngineError::Execution(
                ModelDefinitionError::NoInstructionsProvided,
            ));
        }
        if let Some(delay) = self.run_delay {
            thread::sleep(delay);
        }
        self.runs += 1;
        self.inputs_seen.push(self.input.clone());
        self.output = self.input.clone();
        Ok(())
    }

    fn output(&self) -> TensorView<'_> {
        TensorView {
            element_type: self.element_type,
            bytes: &self.output,
        }
    }

    fn reset_state(&mut self) -> EngineResult<()> {
        self.resets.push(self.runs);
        Ok(())
    }

    fn set_use_acceleration(&mut self, enabled: bool) {
        self.acceleration.push(enabled);
    }

    fn intermediate_tensors(&self) -> EngineResult<Vec<TensorView<'_>>> {
        if !self.dump {
            return Err(EngineError::IntermediatesDisabled);
        }
        Ok(vec![
            TensorView {
                element_type: self.element_type,
                bytes: &self.input,
            },
            self.output(),
        ])
    }
}

pub fn scripted_model(element_type: ElementType, input_len: usize) -> BenchmarkModel<ScriptedEngine> {
    BenchmarkModel::from_engine(ScriptedEngine::new(element_type, input_len), true, false)
}

pub fn float_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

pub fn read_floats(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// uint8 sample whose input is `[value]` and whose golden output is `[golden]`.
pub fn byte_sample(value: u8, golden: Option<u8>) -> SampleData {
    SampleData {
        input: vec![value],
        expected_output: golden.map(|g| vec![g]),
        expected_class: None,
    }
}

/// Dataset of uint8 single-byte samples with matching golden outputs.
pub fn byte_dataset(sequences: &[&[u8]]) -> Dataset {
    let mut dataset = Dataset::new("bytes", ElementType::UInt8);
    for sequence in sequences {
        dataset.add_sequence(
            sequence
                .iter()
                .map(|&value| byte_sample(value, Some(value)))
                .collect(),
        );
    }
    dataset
}

/// Host that lends a dataset's arrays but refuses or nulls selected handles.
pub struct FaultyHost<'a> {
    pub dataset: &'a Dataset,
    pub refused: Option<ArrayHandle>,
    pub null: Option<ArrayHandle>,
    pub unpinned: RefCell<Vec<ArrayHandle>>,
}

impl<'a> FaultyHost<'a> {
    pub fn new(dataset: &'a Dataset) -> Self {
        Self {
            dataset,
            refused: None,
            null: None,
            unpinned: RefCell::new(Vec::new()),
        }
    }
}

impl BufferHost for FaultyHost<'_> {
    fn pin(&self, handle: ArrayHandle) -> Result<PinnedBytes, HostError> {
        if self.refused == Some(handle) {
            return Err(HostError::Refused { handle });
        }
        let bytes = self.dataset.pin(handle)?;
        if self.null == Some(handle) {
            return Ok(PinnedBytes::new(std::ptr::null(), bytes.len.max(1)));
        }
        Ok(bytes)
    }

    fn unpin(&self, handle: ArrayHandle, bytes: PinnedBytes) {
        self.unpinned.borrow_mut().push(handle);
        self.dataset.unpin(handle, bytes);
    }
}

pub fn manifest_path(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(relative)
}

/// Fresh empty directory under the system temp dir.
pub fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("nn_benchmark_{}_{}", std::process::id(), name));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}
