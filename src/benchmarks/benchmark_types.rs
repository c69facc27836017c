//! Benchmark configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::benchmark_model::RunFlags;
use crate::engine::ElementType;
use crate::errors::{BenchmarkError, BenchmarkResult};

/// One input file (and optional golden output file) forming a sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub input_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub golden_output_path: Option<PathBuf>,
    /// Size in bytes of one sample's input.
    pub input_size_bytes: usize,
    #[serde(default = "default_output_element_type")]
    pub output_element_type: ElementType,
    /// Expected class of each sample, for classifier evaluators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_classes: Option<Vec<usize>>,
}

fn default_output_element_type() -> ElementType {
    ElementType::Float32
}

/// Configuration of a command-line benchmark run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    pub name: String,
    pub model_path: PathBuf,
    pub use_acceleration: bool,
    pub dump_intermediates: bool,
    pub input_shape: Option<Vec<i32>>,
    pub datasets: Vec<DatasetConfig>,
    pub inferences_max_count: usize,
    pub timeout_sec: f32,
    pub discard_output: bool,
    pub ignore_golden_output: bool,
    pub disable_acceleration: bool,
    /// Run every sample at least once and at least this many inferences in total.
    pub min_inferences: Option<usize>,
    pub evaluator: Option<String>,
    pub dump_dir: Option<PathBuf>,
    pub results_path: Option<PathBuf>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            name: "benchmark".to_string(),
            model_path: PathBuf::from("models/tiny_rnn.json"),
            use_acceleration: true,
            dump_intermediates: false,
            input_shape: None,
            datasets: Vec::new(),
            inferences_max_count: 1000,
            timeout_sec: 10.0,
            discard_output: true,
            ignore_golden_output: false,
            disable_acceleration: false,
            min_inferences: None,
            evaluator: None,
            dump_dir: None,
            results_path: None,
        }
    }
}

impl BenchmarkConfig {
    pub fn run_flags(&self) -> RunFlags {
        RunFlags {
            discard_output: self.discard_output,
            ignore_golden_output: self.ignore_golden_output,
            disable_acceleration: self.disable_acceleration,
        }
    }

    fn invalid(field: &str, message: &str) -> BenchmarkError {
        BenchmarkError::ConfigValidation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> BenchmarkResult<()> {
        if self.datasets.is_empty() {
            return Err(Self::invalid("datasets", "At least one dataset is required"));
        }

        if self.inferences_max_count == 0 && self.min_inferences.is_none() {
            return Err(Self::invalid(
                "inferences_max_count",
                "Inference count must be greater than 0",
            ));
        }

        if self.timeout_sec.is_nan() || self.timeout_sec <= 0.0 {
            return Err(Self::invalid(
                "timeout_sec",
                "Timeout must be a positive number of seconds",
            ));
        }

        if let Some(shape) = &self.input_shape {
            if shape.is_empty() || shape.iter().any(|&dim| dim <= 0) {
                return Err(Self::invalid(
                    "input_shape",
                    "Every dimension must be greater than 0",
                ));
            }
        }

        let output_element_type = self.datasets[0].output_element_type;
        for (index, dataset) in self.datasets.iter().enumerate() {
            if dataset.output_element_type != output_element_type {
                return Err(Self::invalid(
                    &format!("datasets[{}].output_element_type", index),
                    "Every dataset must share the same output element type",
                ));
            }
            if dataset.input_size_bytes == 0 {
                return Err(Self::invalid(
                    &format!("datasets[{}].input_size_bytes", index),
                    "Input size must be greater than 0",
                ));
            }
            if !dataset.output_element_type.is_benchmark_supported() {
                return Err(Self::invalid(
                    &format!("datasets[{}].output_element_type", index),
                    "Only float32 and uint8 outputs can be scored",
                ));
            }
            if !self.ignore_golden_output && dataset.golden_output_path.is_none() {
                return Err(Self::invalid(
                    &format!("datasets[{}].golden_output_path", index),
                    "A golden output is required unless ignore_golden_output is set",
                ));
            }
        }

        if self.evaluator.is_some() && self.discard_output {
            return Err(Self::invalid(
                "evaluator",
                "Evaluators need the inference outputs, set discard_output to false",
            ));
        }

        if self.dump_dir.is_some() && !self.dump_intermediates {
            return Err(Self::invalid(
                "dump_dir",
                "Dumping layers requires dump_intermediates",
            ));
        }

        Ok(())
    }
}
