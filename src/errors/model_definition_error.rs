//! Error types for instruction model definitions.

use thiserror::Error;

/// Errors that can occur while building or executing an instruction model.
#[derive(Error, Debug)]
pub enum ModelDefinitionError {
    #[error("A model needs at least one computation buffer")]
    NoLayersProvided,

    #[error("A model needs at least one instruction")]
    NoInstructionsProvided,

    #[error("Computation buffer {index} has size 0")]
    InvalidLayerSize { index: usize },

    #[error("Input buffer holds {input_layer_size} values but the feature size is {feature_size}")]
    InputLayerSizeMismatch {
        feature_size: usize,
        input_layer_size: usize,
    },

    #[error("Got {weights} weight matrices but {bias} bias vectors")]
    BiasWeightsMismatch { bias: usize, weights: usize },

    #[error("The {label} index {index} does not name a computation buffer")]
    BufferIndexOutOfBounds { label: String, index: usize },

    #[error("Weight matrix {index} does not exist")]
    WeightsIndexOutOfBounds { index: usize },

    #[error("A {instruction_type} instruction can not read and write the same buffer")]
    SameInputOutputIndexes { instruction_type: String },

    #[error(
        "Weight matrix has {weights_rows} rows for an output buffer of {output_size} values"
    )]
    WeightsRowSizeMismatch {
        weights_rows: usize,
        output_size: usize,
    },

    #[error(
        "Row {row} of the weights has {weights_columns} columns but the input layer has {input_size} values"
    )]
    WeightsColumnSizeMismatch {
        row: usize,
        weights_columns: usize,
        input_size: usize,
    },

    #[error("Bias has {bias_size} values for an output buffer of {output_size} values")]
    BiasOutputSizeMismatch {
        bias_size: usize,
        output_size: usize,
    },

    #[error(
        "Copying {data_size} values at offset {internal_index} overflows an output buffer of {output_size} values"
    )]
    InternalIndexOutOfBounds {
        internal_index: usize,
        data_size: usize,
        output_size: usize,
    },

    #[error("Element-wise sums need at least two input buffers")]
    InsufficientInputBuffers,

    #[error(
        "Input buffer {index} holds {actual_size} values, expected {expected_size}"
    )]
    InputBufferSizeMismatch {
        index: usize,
        actual_size: usize,
        expected_size: usize,
    },

    #[error("Weight matrix {index} is never used")]
    UnusedWeights { index: usize },

    #[error(
        "Computation buffer holds {buffer_size} values but the model needs {required_size}"
    )]
    ComputationBufferTooSmall {
        buffer_size: usize,
        required_size: usize,
    },
}
