//! Writes every intermediate tensor of every sample to disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::benchmark_model::{BenchmarkModel, feed_input};
use crate::engine::InferenceEngine;
use crate::errors::{BenchmarkError, BenchmarkResult};
use crate::foreign_buffer::BufferHost;
use crate::sequence::{SequenceSet, SequenceSetSource};

/// File name of one dumped tensor.
pub fn dump_file_name(sample_index: usize, sequence_index: usize, tensor_index: usize) -> String {
    format!(
        "dump_{:03}_seq_{:03}_tensor_{:03}",
        sample_index, sequence_index, tensor_index
    )
}

impl<E: InferenceEngine> BenchmarkModel<E> {
    /// Runs each sample of `source` exactly once and writes all of the engine's tensors
    /// after each inference into `dump_dir`.
    ///
    /// Needs a model loaded with intermediate dumping enabled. Expected outputs are neither
    /// required nor scored. A write failure stops the dump and leaves the files written so
    /// far in place. Returns the number of files written.
    pub fn dump_all_layers<H: BufferHost + ?Sized>(
        &mut self,
        host: &H,
        dump_dir: impl AsRef<Path>,
        source: SequenceSetSource<'_>,
    ) -> BenchmarkResult<usize> {
        let dump_dir = dump_dir.as_ref();
        self.ensure_usable()?;
        if !self.dump_intermediates {
            return Err(BenchmarkError::DumpDisabled);
        }
        if !dump_dir.is_dir() {
            return Err(BenchmarkError::DumpDirectory {
                path: dump_dir.to_path_buf(),
            });
        }

        let mut set = SequenceSet::acquire(host, source, false)?;
        let flat_index = set.flat_index();
        let mut files_written = 0;

        for (iteration, &(sequence_index, sample_index)) in flat_index.iter().enumerate() {
            if sample_index == 0 {
                self.engine
                    .reset_state()
                    .map_err(|source| BenchmarkError::Inference { iteration, source })?;
            }

            let sample = set.sample_mut(sequence_index, sample_index);
            feed_input(&mut self.engine, sample, sequence_index, sample_index)?;
            self.timed_run(iteration)?;

            let tensors = self
                .engine
                .intermediate_tensors()
                .map_err(|source| BenchmarkError::Inference { iteration, source })?;
            for (tensor_index, tensor) in tensors.iter().enumerate() {
                let path: PathBuf =
                    dump_dir.join(dump_file_name(sample_index, sequence_index, tensor_index));
                fs::write(&path, tensor.bytes)
                    .map_err(|source| BenchmarkError::DumpIo { path, source })?;
                files_written += 1;
            }
        }

        log::info!(
            "Dumped {} tensors for {} samples into {}",
            files_written,
            flat_index.len(),
            dump_dir.display()
        );
        Ok(files_written)
    }
}
