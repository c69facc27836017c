//! Accuracy of one inference output against its golden output.

use serde::Serialize;

use crate::engine::ElementType;
use crate::errors::{BenchmarkError, BenchmarkResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OutputError {
    pub mean_square_error: f32,
    /// Largest positive `actual - golden` difference. Outputs below the golden value never
    /// raise it.
    pub max_single_error: f32,
}

/// Compares an output tensor with its golden bytes, element by element.
///
/// # Panics
///
/// Panics when the two buffers differ in byte length. The caller's data cannot describe the
/// model it is benchmarking, so there is nothing meaningful to report.
pub fn compute_output_error(
    element_type: ElementType,
    actual: &[u8],
    golden: &[u8],
) -> BenchmarkResult<OutputError> {
    assert!(
        actual.len() == golden.len(),
        "Wrong size of output tensor, expected {}, is {}",
        golden.len(),
        actual.len()
    );

    match element_type {
        ElementType::UInt8 => Ok(accumulate(
            actual
                .iter()
                .zip(golden)
                .map(|(&a, &g)| a as f32 - g as f32),
        )),
        ElementType::Float32 => Ok(accumulate(
            actual
                .chunks_exact(4)
                .zip(golden.chunks_exact(4))
                .map(|(a, g)| read_f32(a) - read_f32(g)),
        )),
        element_type => Err(BenchmarkError::UnsupportedType { element_type }),
    }
}

fn read_f32(bytes: &[u8]) -> f32 {
    f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn accumulate(deltas: impl Iterator<Item = f32>) -> OutputError {
    let mut count = 0usize;
    let mut sum_squares = 0.0f32;
    let mut max_single_error = 0.0f32;
    for delta in deltas {
        count += 1;
        sum_squares += delta * delta;
        if delta > max_single_error {
            max_single_error = delta;
        }
    }

    if count == 0 {
        return OutputError::default();
    }
    OutputError {
        mean_square_error: sum_squares / count as f32,
        max_single_error,
    }
}
