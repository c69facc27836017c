//! Configuration-driven benchmark execution.

use std::fs;

use log::{info, warn};

use super::benchmark_types::BenchmarkConfig;
use super::performance_metrics::BenchmarkSummary;
use crate::benchmark_model::BenchmarkModel;
use crate::dataset::Dataset;
use crate::engine::InstructionEngine;
use crate::errors::{BenchmarkError, BenchmarkResult};
use crate::evaluators::create_evaluator;
use crate::trace::LogTraceSink;

/// Configuration loader that handles JSON files with fallbacks
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a configuration file with fallback to defaults
    pub fn load_config<T>(path: &str, config_name: &str) -> BenchmarkResult<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        match fs::read_to_string(path) {
            Ok(content) => {
                serde_json::from_str(&content).map_err(|e| BenchmarkError::ConfigParse {
                    path: path.to_string(),
                    source: e,
                })
            }
            Err(_) => {
                warn!(
                    "Config file '{}' not found, using default configuration for {}",
                    path, config_name
                );
                Ok(T::default())
            }
        }
    }

    pub fn load_benchmark_config(path: &str) -> BenchmarkResult<BenchmarkConfig> {
        Self::load_config(path, "benchmark")
    }
}

/// Runs a configured benchmark with the reference engine.
pub struct BenchmarkRunner;

impl BenchmarkRunner {
    pub fn run(config: &BenchmarkConfig) -> BenchmarkResult<BenchmarkSummary> {
        config.validate()?;

        info!("{}", "=".repeat(80));
        info!("Benchmark '{}': {}", config.name, config.model_path.display());
        info!("{}", "=".repeat(80));

        let mut model = BenchmarkModel::<InstructionEngine>::init_model(
            &config.model_path,
            config.use_acceleration,
            config.dump_intermediates,
        )?
        .with_trace_sink(LogTraceSink::default());
        if let Some(shape) = &config.input_shape {
            model.resize_input_tensors(shape)?;
        }

        let dataset = Self::load_dataset(config)?;

        if let Some(dump_dir) = &config.dump_dir {
            let files = model.dump_all_layers(&dataset, dump_dir, dataset.sequence_set())?;
            info!("Wrote {} layer dumps to {}", files, dump_dir.display());
        }

        let results = match config.min_inferences {
            Some(min_inferences) => model.run_complete_input_set(
                &dataset,
                dataset.sequence_set(),
                min_inferences,
                config.timeout_sec,
                config.run_flags(),
            )?,
            None => model.run_benchmark(
                &dataset,
                dataset.sequence_set(),
                config.inferences_max_count,
                config.timeout_sec,
                config.run_flags(),
            )?,
        };
        if dataset.outstanding_pins() != 0 {
            warn!(
                "{} dataset arrays are still borrowed after the run",
                dataset.outstanding_pins()
            );
        }

        let mut summary = BenchmarkSummary::from_inference_results(&config.name, &results);
        if let Some(name) = &config.evaluator {
            let evaluator = create_evaluator(name)?;
            summary = summary.with_evaluator_results(evaluator.evaluate(&dataset, &results)?);
        }

        if let Some(path) = &config.results_path {
            let json = serde_json::to_string_pretty(&summary).map_err(std::io::Error::from)?;
            fs::write(path, json)?;
            info!("Results written to {}", path.display());
        }

        Ok(summary)
    }

    fn load_dataset(config: &BenchmarkConfig) -> BenchmarkResult<Dataset> {
        let mut dataset = Dataset::new(&config.name, config.datasets[0].output_element_type);
        for dataset_config in &config.datasets {
            let sequence_index = dataset.load_sequence(
                &dataset_config.input_path,
                dataset_config.golden_output_path.as_deref(),
                dataset_config.input_size_bytes,
            )?;
            if let Some(classes) = &dataset_config.expected_classes {
                dataset.set_expected_classes(sequence_index, classes);
            }
        }
        info!(
            "Loaded {} samples in {} sequences",
            dataset.sample_count(),
            dataset.sequences().len()
        );
        Ok(dataset)
    }
}
