//! In-memory benchmark data.
//!
//! [`Dataset`] owns the byte arrays of its samples and lends them through [`BufferHost`],
//! counting every pin and unpin so callers can check that each borrow was returned.

use std::cell::Cell;
use std::fs;
use std::path::Path;

use crate::engine::ElementType;
use crate::errors::{BenchmarkError, BenchmarkResult};
use crate::foreign_buffer::{ArrayHandle, BufferHost, HostError, PinnedBytes};
use crate::sequence::{SampleSource, SequenceSetSource};

/// Owned data of one sample.
#[derive(Debug, Clone, Default)]
pub struct SampleData {
    pub input: Vec<u8>,
    pub expected_output: Option<Vec<u8>>,
    /// Ground-truth class for classifier evaluators.
    pub expected_class: Option<usize>,
}

/// Handles of one stored sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetSample {
    pub input: ArrayHandle,
    pub expected_output: Option<ArrayHandle>,
    pub expected_class: Option<usize>,
}

#[derive(Debug)]
pub struct Dataset {
    name: String,
    output_element_type: ElementType,
    arrays: Vec<Vec<u8>>,
    sequences: Vec<Vec<DatasetSample>>,
    pin_count: Cell<usize>,
    unpin_count: Cell<usize>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, output_element_type: ElementType) -> Self {
        Self {
            name: name.into(),
            output_element_type,
            arrays: Vec::new(),
            sequences: Vec::new(),
            pin_count: Cell::new(0),
            unpin_count: Cell::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element type of the expected outputs.
    pub fn output_element_type(&self) -> ElementType {
        self.output_element_type
    }

    /// Stores `bytes` and returns its handle. Handles start at 1.
    pub fn add_array(&mut self, bytes: Vec<u8>) -> ArrayHandle {
        self.arrays.push(bytes);
        self.arrays.len() as ArrayHandle
    }

    pub fn array(&self, handle: ArrayHandle) -> Option<&[u8]> {
        let index = usize::try_from(handle).ok()?.checked_sub(1)?;
        self.arrays.get(index).map(Vec::as_slice)
    }

    /// Appends a sequence and returns its index.
    pub fn add_sequence(&mut self, samples: Vec<SampleData>) -> usize {
        let mut sequence = Vec::with_capacity(samples.len());
        for sample in samples {
            let input = self.add_array(sample.input);
            let expected_output = match sample.expected_output {
                Some(bytes) => Some(self.add_array(bytes)),
                None => None,
            };
            sequence.push(DatasetSample {
                input,
                expected_output,
                expected_class: sample.expected_class,
            });
        }
        self.sequences.push(sequence);
        self.sequences.len() - 1
    }

    /// Reads one sequence from raw files.
    ///
    /// The input file is split into samples of `input_size_bytes`; the golden file, when
    /// given, is split into as many equally sized expected outputs.
    pub fn load_sequence(
        &mut self,
        input_path: &Path,
        golden_output_path: Option<&Path>,
        input_size_bytes: usize,
    ) -> BenchmarkResult<usize> {
        let dataset_error = |path: &Path, message: String| BenchmarkError::Dataset {
            path: path.to_path_buf(),
            message,
        };

        if input_size_bytes == 0 {
            return Err(dataset_error(input_path, "input size must be positive".into()));
        }
        let input = fs::read(input_path).map_err(|e| dataset_error(input_path, e.to_string()))?;
        if input.is_empty() || input.len() % input_size_bytes != 0 {
            return Err(dataset_error(
                input_path,
                format!(
                    "length {} is not a multiple of the input size {}",
                    input.len(),
                    input_size_bytes
                ),
            ));
        }
        let sequence_length = input.len() / input_size_bytes;

        let golden = match golden_output_path {
            Some(path) => {
                let bytes = fs::read(path).map_err(|e| dataset_error(path, e.to_string()))?;
                if bytes.len() % sequence_length != 0 {
                    return Err(dataset_error(
                        path,
                        format!(
                            "length {} can not be split into {} expected outputs",
                            bytes.len(),
                            sequence_length
                        ),
                    ));
                }
                Some(bytes)
            }
            None => None,
        };

        let samples = (0..sequence_length)
            .map(|index| SampleData {
                input: input[index * input_size_bytes..(index + 1) * input_size_bytes].to_vec(),
                expected_output: golden.as_ref().map(|bytes| {
                    let size = bytes.len() / sequence_length;
                    bytes[index * size..(index + 1) * size].to_vec()
                }),
                expected_class: None,
            })
            .collect();

        log::debug!(
            "Loaded {} samples of {} bytes from {}",
            sequence_length,
            input_size_bytes,
            input_path.display()
        );
        Ok(self.add_sequence(samples))
    }

    /// Sets the ground-truth class of the samples of a sequence, in order.
    pub fn set_expected_classes(&mut self, sequence_index: usize, classes: &[usize]) {
        if let Some(sequence) = self.sequences.get_mut(sequence_index) {
            for (sample, &class) in sequence.iter_mut().zip(classes) {
                sample.expected_class = Some(class);
            }
        }
    }

    pub fn sequences(&self) -> &[Vec<DatasetSample>] {
        &self.sequences
    }

    pub fn sample_count(&self) -> usize {
        self.sequences.iter().map(Vec::len).sum()
    }

    /// Describes every stored sample for the benchmark loop.
    pub fn sequence_set(&self) -> SequenceSetSource<'static> {
        self.sequences
            .iter()
            .map(|sequence| {
                sequence
                    .iter()
                    .map(|sample| SampleSource::new(sample.input, sample.expected_output))
                    .collect()
            })
            .collect()
    }

    pub fn pin_count(&self) -> usize {
        self.pin_count.get()
    }

    pub fn unpin_count(&self) -> usize {
        self.unpin_count.get()
    }

    pub fn outstanding_pins(&self) -> usize {
        self.pin_count.get() - self.unpin_count.get()
    }
}

impl BufferHost for Dataset {
    fn pin(&self, handle: ArrayHandle) -> Result<PinnedBytes, HostError> {
        let bytes = self.array(handle).ok_or(HostError::UnknownArray { handle })?;
        self.pin_count.set(self.pin_count.get() + 1);
        Ok(PinnedBytes::new(bytes.as_ptr(), bytes.len()))
    }

    fn unpin(&self, _handle: ArrayHandle, _bytes: PinnedBytes) {
        self.unpin_count.set(self.unpin_count.get() + 1);
    }
}
