//! Accuracy evaluators run over the results of a benchmark.

mod phone_error_rate;
mod top_k;

pub use phone_error_rate::PhoneErrorRate;
pub use top_k::TopK;

use crate::benchmark_model::InferenceResult;
use crate::dataset::Dataset;
use crate::engine::ElementType;
use crate::errors::{EvaluatorError, EvaluatorResult};

/// Computes named accuracy figures from the retained outputs of a run.
pub trait Evaluator {
    fn name(&self) -> &'static str;

    /// Returns `(key, value)` pairs in a stable order.
    fn evaluate(
        &self,
        dataset: &Dataset,
        results: &[InferenceResult],
    ) -> EvaluatorResult<Vec<(String, f32)>>;
}

/// Resolves an evaluator by its configuration name.
pub fn create_evaluator(name: &str) -> EvaluatorResult<Box<dyn Evaluator>> {
    match name {
        "top_k" | "TopK" => Ok(Box::new(TopK::default())),
        "phone_error_rate" | "PhoneErrorRate" => Ok(Box::new(PhoneErrorRate)),
        _ => Err(EvaluatorError::UnknownEvaluator {
            name: name.to_string(),
        }),
    }
}

/// Reads an output tensor as one score per element.
fn decode_scores(
    evaluator: &str,
    element_type: ElementType,
    output: &[u8],
) -> EvaluatorResult<Vec<f32>> {
    match element_type {
        ElementType::Float32 => Ok(output
            .chunks_exact(4)
            .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
            .collect()),
        ElementType::UInt8 => Ok(output.iter().map(|&b| b as f32).collect()),
        element_type => Err(EvaluatorError::UnsupportedType {
            evaluator: evaluator.to_string(),
            element_type,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_scores() {
        let floats: Vec<u8> = [0.5f32, -1.0].iter().flat_map(|v| v.to_ne_bytes()).collect();
        assert_eq!(
            decode_scores("test", ElementType::Float32, &floats).expect("float32 decodes"),
            vec![0.5, -1.0]
        );
        assert_eq!(
            decode_scores("test", ElementType::UInt8, &[3, 200]).expect("uint8 decodes"),
            vec![3.0, 200.0]
        );
        assert!(matches!(
            decode_scores("test", ElementType::Int32, &[0; 4]),
            Err(EvaluatorError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_create_evaluator() {
        assert_eq!(create_evaluator("TopK").expect("known evaluator").name(), "top_k");
        assert_eq!(
            create_evaluator("PhoneErrorRate")
                .expect("known evaluator")
                .name(),
            "phone_error_rate"
        );
        assert!(matches!(
            create_evaluator("MelCepLogF0"),
            Err(EvaluatorError::UnknownEvaluator { .. })
        ));
    }
}
