use std::collections::BTreeMap;

use super::{Evaluator, decode_scores};
use crate::benchmark_model::InferenceResult;
use crate::dataset::Dataset;
use crate::errors::{EvaluatorError, EvaluatorResult};

/// Phone error rate of a frame classifier.
///
/// A result counts as an error when the argmax of its output differs from the argmax of
/// its sample's expected output. The rate is a percentage per sequence; the reported
/// `max_phone_error_rate` is the worst sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhoneErrorRate;

impl PhoneErrorRate {
    /// Sequences above this rate are logged as failing validation.
    pub const LIMIT_PERCENT: f32 = 5.0;

    /// Index of the first largest score.
    fn index_of_largest(scores: &[f32]) -> Option<usize> {
        let mut largest: Option<(usize, f32)> = None;
        for (index, &score) in scores.iter().enumerate() {
            if largest.is_none_or(|(_, value)| score > value) {
                largest = Some((index, score));
            }
        }
        largest.map(|(index, _)| index)
    }
}

impl Evaluator for PhoneErrorRate {
    fn name(&self) -> &'static str {
        "phone_error_rate"
    }

    fn evaluate(
        &self,
        dataset: &Dataset,
        results: &[InferenceResult],
    ) -> EvaluatorResult<Vec<(String, f32)>> {
        if results.is_empty() {
            return Err(EvaluatorError::NoResults);
        }

        // sequence index -> (errors, inferences)
        let mut counts: BTreeMap<usize, (usize, usize)> = BTreeMap::new();
        for (result_index, result) in results.iter().enumerate() {
            let output =
                result
                    .inference_output()
                    .ok_or_else(|| EvaluatorError::MissingInferenceOutput {
                        evaluator: self.name().to_string(),
                        result_index,
                    })?;
            let sequence_index = result.sequence_index();
            let sample_index = result.sample_index();
            let sequence = dataset.sequences().get(sequence_index).ok_or(
                EvaluatorError::SequenceOutOfRange {
                    result_index,
                    sequence_index,
                },
            )?;
            let expected = sequence
                .get(sample_index)
                .and_then(|sample| sample.expected_output)
                .and_then(|handle| dataset.array(handle))
                .ok_or(EvaluatorError::MissingExpectedOutput {
                    sequence_index,
                    sample_index,
                })?;

            let element_type = dataset.output_element_type();
            let actual = decode_scores(self.name(), element_type, output)?;
            let expected = decode_scores(self.name(), element_type, expected)?;

            let entry = counts.entry(sequence_index).or_default();
            if Self::index_of_largest(&actual) != Self::index_of_largest(&expected) {
                entry.0 += 1;
            }
            entry.1 += 1;
        }

        let mut max_rate = 0.0f32;
        for (sequence_index, (errors, inferences)) in counts {
            let rate = (errors as f64 * 100.0 / inferences as f64) as f32;
            if rate > Self::LIMIT_PERCENT {
                log::warn!(
                    "Phone error rate of sequence {} exceeded the limit: {}",
                    sequence_index,
                    rate
                );
            }
            max_rate = max_rate.max(rate);
        }

        Ok(vec![("max_phone_error_rate".to_string(), max_rate)])
    }
}
