//! Benchmark CLI executable.

use std::env;

use log::error;
use nn_benchmark::benchmarks::{BenchmarkRunner, ConfigLoader};
use nn_benchmark::errors::BenchmarkResult;

const DEFAULT_CONFIG: &str = "configs/benchmark.json";

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        error!("Benchmark execution failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> BenchmarkResult<()> {
    let args: Vec<String> = env::args().collect();

    let config_path = match args.len() {
        1 => DEFAULT_CONFIG,
        2 if args[1] == "--help" || args[1] == "-h" => {
            print_usage();
            return Ok(());
        }
        2 => args[1].as_str(),
        _ => {
            eprintln!("Expected at most one config path, got {}", args.len() - 1);
            print_usage();
            std::process::exit(1);
        }
    };

    let config = ConfigLoader::load_benchmark_config(config_path)?;
    let summary = BenchmarkRunner::run(&config)?;
    summary.print_summary();
    Ok(())
}

fn print_usage() {
    println!("Usage:");
    println!("  cargo run --bin nn_benchmark --release                  # Use {}", DEFAULT_CONFIG);
    println!("  cargo run --bin nn_benchmark --release -- <config.json>");
    println!();
    println!("Set RUST_LOG=info (or debug/trace) for progress output.");
}
