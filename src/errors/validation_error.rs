//! Error types for sequence data validation.

use std::fmt;

use thiserror::Error;

use crate::foreign_buffer::{ArrayHandle, HostError};

/// Which field of a sample a buffer was acquired for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferRole {
    Input,
    ExpectedOutput,
}

impl fmt::Display for BufferRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferRole::Input => write!(f, "input"),
            BufferRole::ExpectedOutput => write!(f, "expected output"),
        }
    }
}

/// Errors raised while acquiring a sequence set, before any inference runs.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("The sequence set does not contain any sample")]
    EmptySequenceSet,

    #[error("Expected golden output for every input, missing for sequence {sequence_index} sample {sample_index}")]
    MissingGoldenOutput {
        sequence_index: usize,
        sample_index: usize,
    },

    #[error("The {role} buffer of sequence {sequence_index} sample {sample_index} is null but has {len} bytes")]
    NullBuffer {
        sequence_index: usize,
        sample_index: usize,
        role: BufferRole,
        len: usize,
    },

    #[error("Failed to borrow the {role} array {handle} of sequence {sequence_index} sample {sample_index}: {source}")]
    Host {
        sequence_index: usize,
        sample_index: usize,
        role: BufferRole,
        handle: ArrayHandle,
        #[source]
        source: HostError,
    },
}
