//! Configuration-driven benchmark runs and result aggregation.

pub mod benchmark_runner;
pub mod benchmark_types;
pub mod performance_metrics;

pub use benchmark_runner::{BenchmarkRunner, ConfigLoader};
pub use benchmark_types::{BenchmarkConfig, DatasetConfig};
pub use performance_metrics::BenchmarkSummary;
