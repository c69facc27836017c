mod common;

use std::fs;

use common::{ScriptedEngine, byte_dataset, manifest_path, read_floats, temp_dir};
use nn_benchmark::benchmark_model::BenchmarkModel;
use nn_benchmark::engine::{ElementType, InstructionEngine};
use nn_benchmark::errors::BenchmarkError;
use nn_benchmark::layer_dump::dump_file_name;
use nn_benchmark::{Dataset, SampleData};

fn dumping_model(input_len: usize) -> BenchmarkModel<ScriptedEngine> {
    BenchmarkModel::from_engine(
        ScriptedEngine::new(ElementType::UInt8, input_len).with_dump(),
        true,
        true,
    )
}

#[test]
fn writes_every_tensor_of_every_sample() {
    let dataset = byte_dataset(&[&[1, 2], &[3]]);
    let mut model = dumping_model(1);
    let dir = temp_dir("dump_names");

    let files = model
        .dump_all_layers(&dataset, &dir, dataset.sequence_set())
        .expect("dump should succeed");
    assert_eq!(files, 6);

    let mut names: Vec<String> = fs::read_dir(&dir)
        .expect("dump dir is readable")
        .map(|entry| {
            entry
                .expect("entry is readable")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "dump_000_seq_000_tensor_000",
            "dump_000_seq_000_tensor_001",
            "dump_000_seq_001_tensor_000",
            "dump_000_seq_001_tensor_001",
            "dump_001_seq_000_tensor_000",
            "dump_001_seq_000_tensor_001",
        ]
    );

    let second_output = fs::read(dir.join(dump_file_name(1, 0, 1))).expect("file was written");
    assert_eq!(second_output, vec![2]);
    let other_sequence = fs::read(dir.join(dump_file_name(0, 1, 0))).expect("file was written");
    assert_eq!(other_sequence, vec![3]);

    // Each sample runs exactly once and state resets at both sequence starts.
    assert_eq!(model.engine().runs, 3);
    assert_eq!(model.engine().resets, vec![0, 2]);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn golden_outputs_are_not_required() {
    let mut dataset = Dataset::new("inputs", ElementType::UInt8);
    dataset.add_sequence(vec![SampleData {
        input: vec![5],
        expected_output: None,
        expected_class: None,
    }]);
    let mut model = dumping_model(1);
    let dir = temp_dir("dump_no_golden");

    let files = model
        .dump_all_layers(&dataset, &dir, dataset.sequence_set())
        .expect("dump should succeed");
    assert_eq!(files, 2);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn requires_dump_enabled_model() {
    let dataset = byte_dataset(&[&[1]]);
    let mut model =
        BenchmarkModel::from_engine(ScriptedEngine::new(ElementType::UInt8, 1), true, false);
    let dir = temp_dir("dump_disabled");

    assert!(matches!(
        model.dump_all_layers(&dataset, &dir, dataset.sequence_set()),
        Err(BenchmarkError::DumpDisabled)
    ));
    assert_eq!(dataset.pin_count(), 0);
    assert_eq!(model.engine().runs, 0);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn requires_existing_directory() {
    let dataset = byte_dataset(&[&[1]]);
    let mut model = dumping_model(1);
    let dir = temp_dir("dump_missing").join("does_not_exist");

    assert!(matches!(
        model.dump_all_layers(&dataset, &dir, dataset.sequence_set()),
        Err(BenchmarkError::DumpDirectory { .. })
    ));
    assert_eq!(dataset.pin_count(), 0);
}

#[test]
fn dumps_reference_model_layers() {
    let input = fs::read(manifest_path("data/tiny_rnn_input.bin")).expect("input data exists");
    let mut dataset = Dataset::new("tiny_rnn", ElementType::Float32);
    dataset.add_sequence(
        input
            .chunks(8)
            .map(|chunk| SampleData {
                input: chunk.to_vec(),
                expected_output: None,
                expected_class: None,
            })
            .collect(),
    );

    let mut model =
        BenchmarkModel::<InstructionEngine>::init_model(manifest_path("models/tiny_rnn.json"), false, true)
            .expect("model should load");
    let dir = temp_dir("dump_tiny_rnn");

    let files = model
        .dump_all_layers(&dataset, &dir, dataset.sequence_set())
        .expect("dump should succeed");
    // Six computation layers plus the output tensor per sample.
    assert_eq!(files, 4 * 7);

    let first_input =
        read_floats(&fs::read(dir.join(dump_file_name(0, 0, 0))).expect("file was written"));
    assert_eq!(first_input, vec![1.0, 0.0]);

    let golden = read_floats(&fs::read(manifest_path("data/tiny_rnn_golden.bin")).expect("golden data exists"));
    for (sample_index, expected) in golden.iter().enumerate() {
        let output = read_floats(
            &fs::read(dir.join(dump_file_name(sample_index, 0, 6))).expect("file was written"),
        );
        assert_eq!(output.len(), 1);
        assert!((output[0] - expected).abs() < 1e-4);
    }

    fs::remove_dir_all(&dir).ok();
}
