use super::{Evaluator, decode_scores};
use crate::benchmark_model::InferenceResult;
use crate::dataset::Dataset;
use crate::errors::{EvaluatorError, EvaluatorResult};

/// Top-k accuracy of a classifier.
///
/// Each sequence must hold a single sample with an expected class. The output tensor is
/// read as one score per class, as float32 or uint8. `top_n` is the share of results whose
/// expected class is among the `n` highest scores.
#[derive(Debug, Clone, Copy)]
pub struct TopK {
    k: usize,
}

impl TopK {
    pub const DEFAULT_K: usize = 5;

    pub fn new(k: usize) -> Self {
        Self { k }
    }
}

impl Default for TopK {
    fn default() -> Self {
        Self::new(Self::DEFAULT_K)
    }
}

impl Evaluator for TopK {
    fn name(&self) -> &'static str {
        "top_k"
    }

    fn evaluate(
        &self,
        dataset: &Dataset,
        results: &[InferenceResult],
    ) -> EvaluatorResult<Vec<(String, f32)>> {
        if results.is_empty() {
            return Err(EvaluatorError::NoResults);
        }

        let mut hits = vec![0usize; self.k];
        for (result_index, result) in results.iter().enumerate() {
            let output =
                result
                    .inference_output()
                    .ok_or_else(|| EvaluatorError::MissingInferenceOutput {
                        evaluator: self.name().to_string(),
                        result_index,
                    })?;
            let sequence_index = result.sequence_index();
            let sequence = dataset.sequences().get(sequence_index).ok_or(
                EvaluatorError::SequenceOutOfRange {
                    result_index,
                    sequence_index,
                },
            )?;
            if sequence.len() != 1 {
                return Err(EvaluatorError::MultiSampleSequence {
                    evaluator: self.name().to_string(),
                    sequence_index,
                    len: sequence.len(),
                });
            }
            let expected_class = sequence[0]
                .expected_class
                .ok_or(EvaluatorError::MissingExpectedClass { sequence_index })?;

            let scores = decode_scores(self.name(), dataset.output_element_type(), output)?;
            if scores.len() < self.k {
                return Err(EvaluatorError::TooFewClasses {
                    classes: scores.len(),
                    k: self.k,
                });
            }

            let mut ranked: Vec<usize> = (0..scores.len()).collect();
            ranked.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
            if let Some(rank) = ranked[..self.k].iter().position(|&c| c == expected_class) {
                hits[rank..].iter_mut().for_each(|hit| *hit += 1);
            }
        }

        let total = results.len() as f32;
        Ok(hits
            .iter()
            .enumerate()
            .map(|(i, &hit)| (format!("top_{}", i + 1), hit as f32 / total))
            .collect())
    }
}
