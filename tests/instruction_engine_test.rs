//! Benchmarks the bundled recurrent reference model end to end.

mod common;

use std::fs;

use common::{float_bytes, manifest_path, read_floats, temp_dir};
use nn_benchmark::benchmark_model::{BenchmarkModel, RunFlags};
use nn_benchmark::engine::{ElementType, InferenceEngine, InstructionEngine};
use nn_benchmark::errors::{BenchmarkError, EngineError};
use nn_benchmark::{Dataset, SampleData};

const NO_TIMEOUT: f32 = 1.0e6;

fn tiny_rnn_dataset() -> Dataset {
    let mut dataset = Dataset::new("tiny_rnn", ElementType::Float32);
    dataset
        .load_sequence(
            &manifest_path("data/tiny_rnn_input.bin"),
            Some(&manifest_path("data/tiny_rnn_golden.bin")),
            8,
        )
        .expect("bundled data should load");
    dataset
}

fn tiny_rnn(use_acceleration: bool) -> BenchmarkModel<InstructionEngine> {
    BenchmarkModel::init_model(manifest_path("models/tiny_rnn.json"), use_acceleration, false)
        .expect("bundled model should load")
}

#[test]
fn matches_golden_outputs_with_and_without_acceleration() {
    let dataset = tiny_rnn_dataset();

    for use_acceleration in [true, false] {
        let mut model = tiny_rnn(use_acceleration);
        let results = model
            .run_benchmark(&dataset, dataset.sequence_set(), 8, NO_TIMEOUT, RunFlags::default())
            .expect("benchmark should succeed");

        assert_eq!(results.len(), 8);
        for result in &results {
            assert!(result.mean_square_error() < 1e-8, "mse {}", result.mean_square_error());
            assert!(result.max_single_error() < 1e-4);
        }
    }
}

#[test]
fn recurrent_state_resets_at_sequence_start() {
    let dataset = tiny_rnn_dataset();
    let mut model = tiny_rnn(true);

    let results = model
        .run_benchmark(&dataset, dataset.sequence_set(), 8, NO_TIMEOUT, RunFlags::from_bits(0))
        .expect("benchmark should succeed");

    let outputs: Vec<f32> = results
        .iter()
        .map(|r| read_floats(r.inference_output().expect("outputs are kept"))[0])
        .collect();
    // The second pass starts from a cleared state, so it repeats the first.
    for index in 0..4 {
        assert!((outputs[index] - outputs[index + 4]).abs() < 1e-6);
    }
}

#[test]
fn state_carries_between_samples_of_a_sequence() {
    let mut dataset = Dataset::new("repeat", ElementType::Float32);
    let sample = SampleData {
        input: float_bytes(&[1.0, 0.0]),
        expected_output: None,
        expected_class: None,
    };
    dataset.add_sequence(vec![sample.clone(), sample]);
    let mut model = tiny_rnn(false);

    let results = model
        .run_benchmark(
            &dataset,
            dataset.sequence_set(),
            2,
            NO_TIMEOUT,
            RunFlags::from_bits(RunFlags::IGNORE_GOLDEN_OUTPUT),
        )
        .expect("benchmark should succeed");

    let first = read_floats(results[0].inference_output().expect("outputs are kept"))[0];
    let second = read_floats(results[1].inference_output().expect("outputs are kept"))[0];
    assert!((first - 0.40147792).abs() < 1e-5);
    assert!((first - second).abs() > 1e-3);
}

#[test]
fn complete_input_set_covers_every_sample() {
    let dataset = tiny_rnn_dataset();
    let mut model = tiny_rnn(true);

    let results = model
        .run_complete_input_set(
            &dataset,
            dataset.sequence_set(),
            6,
            NO_TIMEOUT,
            RunFlags::from_bits(RunFlags::DISCARD_INFERENCE_OUTPUT),
        )
        .expect("benchmark should succeed");
    assert_eq!(results.len(), 8);
    assert!(results.iter().all(|r| r.inference_output().is_none()));
}

#[test]
fn resize_checks_element_count() {
    let dataset = tiny_rnn_dataset();
    let mut model = tiny_rnn(true);

    model
        .resize_input_tensors(&[2])
        .expect("two values fit the input layer");
    assert_eq!(model.engine().input_shape(), &[2]);
    model
        .run_benchmark(&dataset, dataset.sequence_set(), 4, NO_TIMEOUT, RunFlags::default())
        .expect("benchmark should succeed");

    assert!(matches!(
        model.resize_input_tensors(&[1, 3]),
        Err(BenchmarkError::Allocation {
            source: EngineError::Allocation { .. }
        })
    ));
    assert!(!model.is_usable());
}

#[test]
fn oversized_resize_is_an_allocation_error() {
    let mut model = tiny_rnn(true);

    assert!(matches!(
        model.resize_input_tensors(&[i32::MAX, i32::MAX, i32::MAX]),
        Err(BenchmarkError::Allocation {
            source: EngineError::Allocation { .. }
        })
    ));
    assert!(!model.is_usable());
}

#[test]
fn load_failures_are_reported() {
    match BenchmarkModel::<InstructionEngine>::init_model("models/missing.json", true, false) {
        Err(BenchmarkError::ModelLoad {
            source: EngineError::Io { .. },
            ..
        }) => {}
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("missing model should not load"),
    }

    let dir = temp_dir("invalid_model");
    let path = dir.join("model.json");
    fs::write(&path, "{ \"model\": 3 }").expect("temp file should be writable");
    match BenchmarkModel::<InstructionEngine>::init_model(&path, true, false) {
        Err(BenchmarkError::ModelLoad {
            source: EngineError::Parse { .. },
            ..
        }) => {}
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("invalid model should not load"),
    }

    fs::write(
        &path,
        r#"{
            "input": { "element_type": "float32" },
            "model": {
                "feature_size": 2,
                "computation_buffer_sizes": [3, 1],
                "instructions": [{ "type": "DOT", "input": 0, "output": 1, "weights": 0 }],
                "weights": [[[1.0, 1.0, 1.0]]],
                "bias": [[0.0]]
            }
        }"#,
    )
    .expect("temp file should be writable");
    match BenchmarkModel::<InstructionEngine>::init_model(&path, true, false) {
        Err(BenchmarkError::ModelLoad {
            source: EngineError::InvalidModel(_),
            ..
        }) => {}
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("inconsistent model should not load"),
    }

    fs::write(
        &path,
        r#"{
            "input": { "element_type": "float32" },
            "model": {
                "feature_size": 1,
                "computation_buffer_sizes": [1, 2],
                "instructions": [
                    { "type": "COPY", "input": 0, "output": 1, "internal_index": 18446744073709551615 }
                ],
                "weights": [],
                "bias": []
            }
        }"#,
    )
    .expect("temp file should be writable");
    match BenchmarkModel::<InstructionEngine>::init_model(&path, true, false) {
        Err(BenchmarkError::ModelLoad {
            source: EngineError::InvalidModel(_),
            ..
        }) => {}
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("out of range copy should not load"),
    }

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn engine_reports_its_element_types() {
    let engine = InstructionEngine::load(
        &manifest_path("models/tiny_rnn.json"),
        Default::default(),
    )
    .expect("bundled model should load");
    assert_eq!(engine.input_element_type(), ElementType::Float32);
    assert_eq!(engine.output().element_type, ElementType::Float32);
    assert_eq!(engine.output().bytes.len(), 4);
    assert_eq!(engine.input_shape(), &[1, 2]);
}
