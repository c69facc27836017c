//! The benchmark loop.
//!
//! A [`BenchmarkModel`] owns one loaded engine. Each call borrows the caller's sequence data
//! for exactly its own duration: the data is acquired on entry, iterated, and released on
//! every exit path when the acquired set is dropped.

use std::path::Path;
use std::time::Instant;

use serde::Serialize;

use crate::engine::{EngineOptions, InferenceEngine};
use crate::errors::{BenchmarkError, BenchmarkResult, EngineError};
use crate::foreign_buffer::{BufferHost, ForeignBuffer};
use crate::metrics::{OutputError, compute_output_error};
use crate::sequence::{Sample, SequenceSet, SequenceSetSource};
use crate::trace::{NoopTraceSink, TraceSink};

const INFERENCE_SECTION: &str = "[NN_LA_PE]BenchmarkModel::run";

/// Per-call behaviour switches, exchanged with hosts as a bitset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunFlags {
    pub discard_output: bool,
    pub ignore_golden_output: bool,
    pub disable_acceleration: bool,
}

impl RunFlags {
    pub const DISCARD_INFERENCE_OUTPUT: u32 = 1 << 0;
    pub const IGNORE_GOLDEN_OUTPUT: u32 = 1 << 1;
    pub const DISABLE_ACCELERATION: u32 = 1 << 2;

    const KNOWN_BITS: u32 =
        Self::DISCARD_INFERENCE_OUTPUT | Self::IGNORE_GOLDEN_OUTPUT | Self::DISABLE_ACCELERATION;

    pub fn from_bits(bits: u32) -> Self {
        if bits & !Self::KNOWN_BITS != 0 {
            log::warn!("Ignoring unknown run flag bits {:#x}", bits & !Self::KNOWN_BITS);
        }
        Self {
            discard_output: bits & Self::DISCARD_INFERENCE_OUTPUT != 0,
            ignore_golden_output: bits & Self::IGNORE_GOLDEN_OUTPUT != 0,
            disable_acceleration: bits & Self::DISABLE_ACCELERATION != 0,
        }
    }

    pub fn bits(self) -> u32 {
        let mut bits = 0;
        if self.discard_output {
            bits |= Self::DISCARD_INFERENCE_OUTPUT;
        }
        if self.ignore_golden_output {
            bits |= Self::IGNORE_GOLDEN_OUTPUT;
        }
        if self.disable_acceleration {
            bits |= Self::DISABLE_ACCELERATION;
        }
        bits
    }
}

/// Outcome of one timed inference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceResult {
    compute_time_sec: f32,
    mean_square_error: f32,
    max_single_error: f32,
    #[serde(skip)]
    inference_output: Option<Vec<u8>>,
    sequence_index: usize,
    sample_index: usize,
}

impl InferenceResult {
    pub fn new(
        compute_time_sec: f32,
        error: OutputError,
        inference_output: Option<Vec<u8>>,
        sequence_index: usize,
        sample_index: usize,
    ) -> Self {
        Self {
            compute_time_sec,
            mean_square_error: error.mean_square_error,
            max_single_error: error.max_single_error,
            inference_output,
            sequence_index,
            sample_index,
        }
    }

    /// Wall time of the engine's forward pass alone.
    pub fn compute_time_sec(&self) -> f32 {
        self.compute_time_sec
    }

    pub fn mean_square_error(&self) -> f32 {
        self.mean_square_error
    }

    pub fn max_single_error(&self) -> f32 {
        self.max_single_error
    }

    pub fn inference_output(&self) -> Option<&[u8]> {
        self.inference_output.as_deref()
    }

    pub fn into_inference_output(self) -> Option<Vec<u8>> {
        self.inference_output
    }

    pub fn sequence_index(&self) -> usize {
        self.sequence_index
    }

    pub fn sample_index(&self) -> usize {
        self.sample_index
    }
}

/// A loaded model driven by the benchmark loop and the layer dump.
pub struct BenchmarkModel<E: InferenceEngine> {
    pub(crate) engine: E,
    use_acceleration: bool,
    pub(crate) dump_intermediates: bool,
    pub(crate) unusable: bool,
    trace: Box<dyn TraceSink>,
}

impl<E: InferenceEngine> BenchmarkModel<E> {
    /// Loads the model at `path` and allocates its tensors.
    pub fn init_model(
        path: impl AsRef<Path>,
        use_acceleration: bool,
        dump_intermediates: bool,
    ) -> BenchmarkResult<Self> {
        let path = path.as_ref();
        let options = EngineOptions {
            use_acceleration,
            dump_intermediates,
        };
        let engine = E::load(path, options).map_err(|source| BenchmarkError::ModelLoad {
            path: path.to_path_buf(),
            source,
        })?;

        log::info!(
            "Initialized model {} (acceleration: {}, dump: {})",
            path.display(),
            use_acceleration,
            dump_intermediates
        );
        Ok(Self::from_engine(engine, use_acceleration, dump_intermediates))
    }

    /// Wraps an engine that is already loaded.
    pub fn from_engine(engine: E, use_acceleration: bool, dump_intermediates: bool) -> Self {
        Self {
            engine,
            use_acceleration,
            dump_intermediates,
            unusable: false,
            trace: Box::new(NoopTraceSink),
        }
    }

    pub fn with_trace_sink(mut self, trace: impl TraceSink + 'static) -> Self {
        self.trace = Box::new(trace);
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// False once a resize has failed; the handle can then only be destroyed.
    pub fn is_usable(&self) -> bool {
        !self.unusable
    }

    /// Resizes the input tensor and re-allocates the engine's tensors.
    pub fn resize_input_tensors(&mut self, shape: &[i32]) -> BenchmarkResult<()> {
        if let Err(source) = self.engine.resize_input(shape) {
            log::error!("Failed to resize input to {:?}: {}", shape, source);
            self.unusable = true;
            return Err(BenchmarkError::Allocation { source });
        }
        log::info!("Resized input tensor to {:?}", shape);
        Ok(())
    }

    pub(crate) fn ensure_usable(&self) -> BenchmarkResult<()> {
        if self.unusable {
            return Err(BenchmarkError::ModelUnusable);
        }
        Ok(())
    }

    /// Runs up to `inferences_max_count` timed inferences, cycling over every sample of
    /// `source` in order.
    ///
    /// Recurrent state is reset whenever the selected sample starts its sequence. The loop
    /// stops early once the summed inference time exceeds `timeout_sec`. Any failure
    /// discards the results gathered so far.
    pub fn run_benchmark<H: BufferHost + ?Sized>(
        &mut self,
        host: &H,
        source: SequenceSetSource<'_>,
        inferences_max_count: usize,
        timeout_sec: f32,
        flags: RunFlags,
    ) -> BenchmarkResult<Vec<InferenceResult>> {
        self.ensure_usable()?;
        let mut set = SequenceSet::acquire(host, source, !flags.ignore_golden_output)?;
        self.engine
            .set_use_acceleration(self.use_acceleration && !flags.disable_acceleration);
        let flat_index = set.flat_index();
        log::info!(
            "Running benchmark: {} samples in {} sequences, max {} inferences, timeout {}s, flags {:#x}",
            flat_index.len(),
            set.sequences().len(),
            inferences_max_count,
            timeout_sec,
            flags.bits()
        );

        let mut results = Vec::with_capacity(inferences_max_count.min(flat_index.len() * 16));
        let mut total_time_sec = 0.0f32;

        for iteration in 0..inferences_max_count {
            let (sequence_index, sample_index) = flat_index[iteration % flat_index.len()];
            if sample_index == 0 {
                self.engine
                    .reset_state()
                    .map_err(|source| BenchmarkError::Inference { iteration, source })?;
            }

            let sample = set.sample_mut(sequence_index, sample_index);
            feed_input(&mut self.engine, sample, sequence_index, sample_index)?;

            let compute_time_sec = self.timed_run(iteration)?;
            let output = self.engine.output();

            let error = match set.sample(sequence_index, sample_index).expected_output() {
                Some(golden) if !flags.ignore_golden_output => {
                    compute_output_error(output.element_type, output.bytes, golden)?
                }
                _ => OutputError::default(),
            };
            let inference_output = (!flags.discard_output).then(|| output.bytes.to_vec());

            results.push(InferenceResult::new(
                compute_time_sec,
                error,
                inference_output,
                sequence_index,
                sample_index,
            ));

            total_time_sec += compute_time_sec;
            if total_time_sec > timeout_sec {
                log::warn!(
                    "Benchmark timed out after {} of {} inferences ({:.3}s > {}s)",
                    results.len(),
                    inferences_max_count,
                    total_time_sec,
                    timeout_sec
                );
                break;
            }
        }

        log::info!(
            "Benchmark finished: {} inferences in {:.3}s",
            results.len(),
            total_time_sec
        );
        Ok(results)
    }

    /// Runs every sample of `source` at least once and at least `min_inferences` times in
    /// total, repeating the whole set as needed.
    ///
    /// Fails with [`BenchmarkError::IncompleteInputSet`] when the timeout cut the run short.
    pub fn run_complete_input_set<H: BufferHost + ?Sized>(
        &mut self,
        host: &H,
        source: SequenceSetSource<'_>,
        min_inferences: usize,
        timeout_sec: f32,
        flags: RunFlags,
    ) -> BenchmarkResult<Vec<InferenceResult>> {
        let sample_count: usize = source.iter().map(Vec::len).sum();
        let repeats = if sample_count == 0 {
            1
        } else {
            min_inferences.div_ceil(sample_count).max(1)
        };
        let expected = sample_count * repeats;

        let results = self.run_benchmark(host, source, expected, timeout_sec, flags)?;
        if results.len() != expected {
            return Err(BenchmarkError::IncompleteInputSet {
                timeout_sec,
                expected,
                received: results.len(),
            });
        }
        Ok(results)
    }

    /// Runs the engine once inside a trace section, timing the forward pass alone.
    pub(crate) fn timed_run(&mut self, iteration: usize) -> BenchmarkResult<f32> {
        self.trace.begin_section(INFERENCE_SECTION);
        let start = Instant::now();
        let outcome = self.engine.run();
        let elapsed = start.elapsed().as_secs_f32();
        self.trace.end_section();

        outcome.map_err(|source| {
            log::error!("Inference {} failed: {}", iteration, source);
            BenchmarkError::Inference { iteration, source }
        })?;
        Ok(elapsed)
    }
}

/// Places a sample's input into the engine's input tensor.
pub(crate) fn feed_input<E: InferenceEngine + ?Sized>(
    engine: &mut E,
    sample: &mut Sample<'_>,
    sequence_index: usize,
    sample_index: usize,
) -> BenchmarkResult<()> {
    let rejected = |source: EngineError| match source {
        EngineError::UnsupportedType { element_type } => {
            BenchmarkError::UnsupportedType { element_type }
        }
        source => BenchmarkError::InputRejected {
            sequence_index,
            sample_index,
            source,
        },
    };

    let input = sample.input_mut();
    if let ForeignBuffer::Direct(view) = input {
        return engine.set_input(view.as_slice()).map_err(rejected);
    }

    let dest = engine.input_buffer_mut().map_err(rejected)?;
    input
        .materialize(dest)
        .map_err(|_| BenchmarkError::InputProducer {
            sequence_index,
            sample_index,
        })
}
