//! Aggregation of benchmark results.

use serde::Serialize;

use crate::benchmark_model::InferenceResult;

/// Summary of one benchmark run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BenchmarkSummary {
    pub test_info: String,
    pub total_time_sec: f32,
    pub iterations: usize,
    /// Population standard deviation of the per-inference times.
    pub time_std_deviation: f32,
    pub sum_of_mses: f32,
    pub max_single_error: f32,
    pub evaluator_results: Vec<(String, f32)>,
}

impl BenchmarkSummary {
    pub fn from_inference_results(test_info: impl Into<String>, results: &[InferenceResult]) -> Self {
        let iterations = results.len();
        let mut total_time_sec = 0.0f32;
        let mut sum_of_mses = 0.0f32;
        let mut max_single_error = 0.0f32;
        for result in results {
            total_time_sec += result.compute_time_sec();
            sum_of_mses += result.mean_square_error();
            max_single_error = max_single_error.max(result.max_single_error());
        }

        let time_std_deviation = if iterations == 0 {
            0.0
        } else {
            let mean = total_time_sec / iterations as f32;
            let variance = results
                .iter()
                .map(|result| {
                    let delta = result.compute_time_sec() - mean;
                    delta * delta
                })
                .sum::<f32>()
                / iterations as f32;
            variance.sqrt()
        };

        Self {
            test_info: test_info.into(),
            total_time_sec,
            iterations,
            time_std_deviation,
            sum_of_mses,
            max_single_error,
            evaluator_results: Vec::new(),
        }
    }

    pub fn with_evaluator_results(mut self, evaluator_results: Vec<(String, f32)>) -> Self {
        self.evaluator_results = evaluator_results;
        self
    }

    pub fn mean_time_sec(&self) -> f32 {
        if self.iterations == 0 {
            return 0.0;
        }
        self.total_time_sec / self.iterations as f32
    }

    /// Mean squared error over all inferences.
    pub fn mean_square_error(&self) -> f32 {
        if self.iterations == 0 {
            return 0.0;
        }
        self.sum_of_mses / self.iterations as f32
    }

    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(80));
        println!("Benchmark Results: {}", self.test_info);
        println!("{}", "=".repeat(80));
        println!(
            "   Mean time: {:.3} ms (std dev {:.3} ms)",
            self.mean_time_sec() * 1000.0,
            self.time_std_deviation * 1000.0
        );
        println!("   Total time: {:.3} s", self.total_time_sec);
        println!("   Iterations: {}", self.iterations);
        println!("   Mean squared error: {}", self.mean_square_error());
        println!("   Max single error: {}", self.max_single_error);
        for (key, value) in &self.evaluator_results {
            println!("   {}: {}", key, value);
        }
    }
}
