use thiserror::Error;

use crate::engine::ElementType;

#[derive(Error, Debug)]
pub enum EvaluatorError {
    #[error("Can not create evaluator named '{name}'")]
    UnknownEvaluator { name: String },

    #[error("No inference results to evaluate")]
    NoResults,

    #[error("The {evaluator} evaluator needs the inference output, result {result_index} has none")]
    MissingInferenceOutput {
        evaluator: String,
        result_index: usize,
    },

    #[error("Result {result_index} refers to sequence {sequence_index} which is not in the dataset")]
    SequenceOutOfRange {
        result_index: usize,
        sequence_index: usize,
    },

    #[error("Only one item per sequence is supported by the {evaluator} evaluator, sequence {sequence_index} has {len}")]
    MultiSampleSequence {
        evaluator: String,
        sequence_index: usize,
        len: usize,
    },

    #[error("Sample {sample_index} of sequence {sequence_index} has no expected output")]
    MissingExpectedOutput {
        sequence_index: usize,
        sample_index: usize,
    },

    #[error("Expected class not set for sequence {sequence_index}")]
    MissingExpectedClass { sequence_index: usize },

    #[error("Output element type {element_type} is not supported by the {evaluator} evaluator")]
    UnsupportedType {
        evaluator: String,
        element_type: ElementType,
    },

    #[error("The output has {classes} classes, fewer than the {k} required")]
    TooFewClasses { classes: usize, k: usize },
}
