//! Every borrowed host array is returned exactly once, whatever way a call ends.

mod common;

use common::{FaultyHost, ScriptedEngine, byte_dataset, byte_sample, scripted_model};
use nn_benchmark::benchmark_model::{BenchmarkModel, RunFlags};
use nn_benchmark::engine::ElementType;
use nn_benchmark::errors::{BenchmarkError, BufferRole, ValidationError};
use nn_benchmark::foreign_buffer::HostError;
use nn_benchmark::{Dataset, SampleSource};

const NO_TIMEOUT: f32 = 1.0e6;

fn assert_balanced(dataset: &Dataset, expected_pins: usize) {
    assert_eq!(dataset.pin_count(), expected_pins);
    assert_eq!(dataset.unpin_count(), expected_pins);
    assert_eq!(dataset.outstanding_pins(), 0);
}

#[test]
fn successful_run_releases_every_array() {
    let dataset = byte_dataset(&[&[1, 2], &[3]]);
    let mut model = scripted_model(ElementType::UInt8, 1);

    model
        .run_benchmark(&dataset, dataset.sequence_set(), 10, NO_TIMEOUT, RunFlags::default())
        .expect("benchmark should succeed");

    // Three inputs and three golden outputs, pinned once per call.
    assert_balanced(&dataset, 6);
}

#[test]
fn arrays_are_pinned_once_per_call() {
    let dataset = byte_dataset(&[&[1]]);
    let mut model = scripted_model(ElementType::UInt8, 1);

    for _ in 0..3 {
        model
            .run_benchmark(&dataset, dataset.sequence_set(), 4, NO_TIMEOUT, RunFlags::default())
            .expect("benchmark should succeed");
    }
    assert_balanced(&dataset, 6);
}

#[test]
fn missing_golden_output_releases_earlier_arrays() {
    let mut dataset = Dataset::new("bytes", ElementType::UInt8);
    dataset.add_sequence(vec![byte_sample(1, Some(1)), byte_sample(2, Some(2))]);
    dataset.add_sequence(vec![byte_sample(3, None)]);
    let mut model = scripted_model(ElementType::UInt8, 1);

    let error = model
        .run_benchmark(&dataset, dataset.sequence_set(), 3, NO_TIMEOUT, RunFlags::default())
        .expect_err("the last sample has no golden output");
    assert!(matches!(
        error,
        BenchmarkError::Validation(ValidationError::MissingGoldenOutput {
            sequence_index: 1,
            sample_index: 0
        })
    ));
    // Two complete samples plus the input of the invalid one.
    assert_balanced(&dataset, 5);
    assert_eq!(model.engine().runs, 0);
}

#[test]
fn refused_pin_releases_earlier_arrays() {
    let dataset = byte_dataset(&[&[1, 2, 3]]);
    let mut host = FaultyHost::new(&dataset);
    // Handles 1..=6 alternate input and golden output; 4 is the second golden output.
    host.refused = Some(4);
    let mut model = scripted_model(ElementType::UInt8, 1);

    let error = model
        .run_benchmark(&host, dataset.sequence_set(), 3, NO_TIMEOUT, RunFlags::default())
        .expect_err("the host refuses one array");
    assert!(matches!(
        error,
        BenchmarkError::Validation(ValidationError::Host {
            sequence_index: 0,
            sample_index: 1,
            role: BufferRole::ExpectedOutput,
            handle: 4,
            source: HostError::Refused { handle: 4 },
        })
    ));
    assert_balanced(&dataset, 3);
    assert_eq!(*host.unpinned.borrow(), vec![3, 2, 1]);
}

#[test]
fn null_array_is_still_released() {
    let dataset = byte_dataset(&[&[1, 2]]);
    let mut host = FaultyHost::new(&dataset);
    host.null = Some(3);
    let mut model = scripted_model(ElementType::UInt8, 1);

    let error = model
        .run_benchmark(&host, dataset.sequence_set(), 2, NO_TIMEOUT, RunFlags::default())
        .expect_err("one array comes back null");
    assert!(matches!(
        error,
        BenchmarkError::Validation(ValidationError::NullBuffer {
            sequence_index: 0,
            sample_index: 1,
            role: BufferRole::Input,
            ..
        })
    ));
    assert_balanced(&dataset, 3);
    assert!(host.unpinned.borrow().contains(&3));
}

#[test]
fn unknown_handle_is_reported_without_release() {
    let dataset = byte_dataset(&[&[1]]);
    let mut model = scripted_model(ElementType::UInt8, 1);
    let source = vec![vec![SampleSource::new(1, Some(99))]];

    let error = model
        .run_benchmark(&dataset, source, 1, NO_TIMEOUT, RunFlags::default())
        .expect_err("array 99 does not exist");
    assert!(matches!(
        error,
        BenchmarkError::Validation(ValidationError::Host {
            source: HostError::UnknownArray { handle: 99 },
            ..
        })
    ));
    assert_balanced(&dataset, 1);
}

#[test]
fn inference_failure_releases_every_array() {
    let dataset = byte_dataset(&[&[1, 2], &[3, 4]]);
    let mut engine = ScriptedEngine::new(ElementType::UInt8, 1);
    engine.fail_at_run = Some(5);
    let mut model = BenchmarkModel::from_engine(engine, true, false);

    assert!(matches!(
        model.run_benchmark(&dataset, dataset.sequence_set(), 8, NO_TIMEOUT, RunFlags::default()),
        Err(BenchmarkError::Inference { iteration: 5, .. })
    ));
    assert_balanced(&dataset, 8);
}

#[test]
fn rejected_input_releases_every_array() {
    let dataset = byte_dataset(&[&[1, 2]]);
    let mut model = scripted_model(ElementType::UInt8, 3);

    assert!(matches!(
        model.run_benchmark(&dataset, dataset.sequence_set(), 2, NO_TIMEOUT, RunFlags::default()),
        Err(BenchmarkError::InputRejected { .. })
    ));
    assert_balanced(&dataset, 4);
}

#[test]
fn incomplete_input_set_releases_every_array() {
    let dataset = byte_dataset(&[&[1, 2, 3]]);
    let mut model = scripted_model(ElementType::UInt8, 1);

    assert!(matches!(
        model.run_complete_input_set(&dataset, dataset.sequence_set(), 3, -1.0, RunFlags::default()),
        Err(BenchmarkError::IncompleteInputSet { .. })
    ));
    assert_balanced(&dataset, 6);
}

#[test]
fn dump_releases_every_array() {
    let dataset = byte_dataset(&[&[1, 2]]);
    let mut model = BenchmarkModel::from_engine(
        ScriptedEngine::new(ElementType::UInt8, 1).with_dump(),
        true,
        true,
    );
    let dir = common::temp_dir("release_dump");

    let files = model
        .dump_all_layers(&dataset, &dir, dataset.sequence_set())
        .expect("dump should succeed");
    assert_eq!(files, 4);
    assert_balanced(&dataset, 4);

    std::fs::remove_dir_all(&dir).ok();
}
