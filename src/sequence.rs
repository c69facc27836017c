//! Input/expected-output sequences for the benchmark loop.
//!
//! Callers describe their data with source types ([`SampleSource`], [`SequenceSetSource`])
//! holding host array handles or producers. [`SequenceSet::acquire`] turns a source into
//! borrowed views in one all-or-nothing step; dropping the set releases every borrow.

use crate::errors::{BufferRole, ValidationError, ValidationResult};
use crate::foreign_buffer::{
    Acquired, ArrayHandle, BufferHost, BufferView, ForeignBuffer, InputProducer, ReleaseList,
};

/// Where the input of a sample comes from.
pub enum InputSource<'a> {
    Array(ArrayHandle),
    Producer(InputProducer<'a>),
}

/// One input and its optional golden output, before acquisition.
pub struct SampleSource<'a> {
    pub input: InputSource<'a>,
    pub expected_output: Option<ArrayHandle>,
}

impl<'a> SampleSource<'a> {
    pub fn new(input: ArrayHandle, expected_output: Option<ArrayHandle>) -> Self {
        Self {
            input: InputSource::Array(input),
            expected_output,
        }
    }

    pub fn lazy(
        producer: impl FnMut(&mut [u8]) -> bool + 'a,
        expected_output: Option<ArrayHandle>,
    ) -> Self {
        Self {
            input: InputSource::Producer(Box::new(producer)),
            expected_output,
        }
    }
}

pub type SequenceSource<'a> = Vec<SampleSource<'a>>;
pub type SequenceSetSource<'a> = Vec<SequenceSource<'a>>;

/// An acquired input/expected-output pair.
#[derive(Debug)]
pub struct Sample<'a> {
    input: ForeignBuffer<'a>,
    expected_output: Option<BufferView>,
}

impl<'a> Sample<'a> {
    pub fn input_mut(&mut self) -> &mut ForeignBuffer<'a> {
        &mut self.input
    }

    pub fn expected_output(&self) -> Option<&[u8]> {
        self.expected_output.as_ref().map(BufferView::as_slice)
    }
}

/// Samples sharing continuous recurrent state.
#[derive(Debug)]
pub struct Sequence<'a> {
    samples: Vec<Sample<'a>>,
}

impl<'a> Sequence<'a> {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Acquired sequences plus the borrows backing them.
///
/// Field order matters: the views in `sequences` are dropped before `releases` unpins them.
pub struct SequenceSet<'h, 'a, H: BufferHost + ?Sized> {
    sequences: Vec<Sequence<'a>>,
    releases: ReleaseList<'h, H>,
}

impl<'h, 'a, H: BufferHost + ?Sized> SequenceSet<'h, 'a, H> {
    /// Borrows every buffer named by `source`.
    ///
    /// When `expect_golden_outputs` is set, every sample must carry a non-empty expected
    /// output. On the first invalid entry the buffers acquired so far are released and the
    /// error is returned.
    pub fn acquire(
        host: &'h H,
        source: SequenceSetSource<'a>,
        expect_golden_outputs: bool,
    ) -> ValidationResult<Self> {
        let mut releases = ReleaseList::new(host);
        let mut sequences = Vec::with_capacity(source.len());

        for (sequence_index, sequence_source) in source.into_iter().enumerate() {
            let mut samples = Vec::with_capacity(sequence_source.len());
            for (sample_index, sample_source) in sequence_source.into_iter().enumerate() {
                let mut acquire = |handle: ArrayHandle, role: BufferRole| {
                    match releases.acquire(handle) {
                        Ok(Acquired::View(view)) => Ok(view),
                        Ok(Acquired::Null { len }) => Err(ValidationError::NullBuffer {
                            sequence_index,
                            sample_index,
                            role,
                            len,
                        }),
                        Err(source) => Err(ValidationError::Host {
                            sequence_index,
                            sample_index,
                            role,
                            handle,
                            source,
                        }),
                    }
                };

                let input = match sample_source.input {
                    InputSource::Array(handle) => {
                        ForeignBuffer::Direct(acquire(handle, BufferRole::Input)?)
                    }
                    InputSource::Producer(producer) => ForeignBuffer::Lazy(producer),
                };

                let expected_output = match sample_source.expected_output {
                    Some(handle) => Some(acquire(handle, BufferRole::ExpectedOutput)?),
                    None => None,
                };

                let has_golden = expected_output
                    .as_ref()
                    .is_some_and(|view| !view.is_empty());
                if expect_golden_outputs && !has_golden {
                    return Err(ValidationError::MissingGoldenOutput {
                        sequence_index,
                        sample_index,
                    });
                }

                samples.push(Sample {
                    input,
                    expected_output,
                });
            }
            sequences.push(Sequence { samples });
        }

        let set = Self {
            sequences,
            releases,
        };
        if set.sample_count() == 0 {
            return Err(ValidationError::EmptySequenceSet);
        }

        log::debug!(
            "Acquired {} sequences ({} samples, {} borrowed arrays)",
            set.sequences.len(),
            set.sample_count(),
            set.releases.len()
        );
        Ok(set)
    }

    pub fn sequences(&self) -> &[Sequence<'a>] {
        &self.sequences
    }

    /// Total number of samples over all sequences.
    pub fn sample_count(&self) -> usize {
        self.sequences.iter().map(Sequence::len).sum()
    }

    /// `(sequence_index, sample_index)` of every sample in iteration order.
    pub fn flat_index(&self) -> Vec<(usize, usize)> {
        self.sequences
            .iter()
            .enumerate()
            .flat_map(|(sequence_index, sequence)| {
                (0..sequence.len()).map(move |sample_index| (sequence_index, sample_index))
            })
            .collect()
    }

    pub fn sample(&self, sequence_index: usize, sample_index: usize) -> &Sample<'a> {
        &self.sequences[sequence_index].samples[sample_index]
    }

    pub fn sample_mut(&mut self, sequence_index: usize, sample_index: usize) -> &mut Sample<'a> {
        &mut self.sequences[sequence_index].samples[sample_index]
    }
}
