//! C ABI of the harness.
//!
//! A host process owns every byte array and result container. It lends arrays through the
//! pin/unpin callbacks of [`NnbHost`] and receives results through [`NnbResultSink`].
//! Boolean returns report success; failures are logged. A panic inside the harness is a
//! fatal condition and aborts the process instead of unwinding into the host.

use std::ffi::{CStr, c_char, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::ptr;
use std::slice;

use crate::benchmark_model::{BenchmarkModel, InferenceResult, RunFlags};
use crate::engine::InstructionEngine;
use crate::errors::BenchmarkError;
use crate::foreign_buffer::{ArrayHandle, BufferHost, HostError, PinnedBytes};
use crate::sequence::{SampleSource, SequenceSetSource};
use crate::trace::LogTraceSink;

/// Opaque model handle owned by the host between init and destroy.
pub type NnbModel = BenchmarkModel<InstructionEngine>;

/// Writes the location of the array `handle` into `ptr`/`len` and returns true, or returns
/// false when the array can not be borrowed.
pub type NnbPinFn = unsafe extern "C" fn(
    user_data: *mut c_void,
    handle: ArrayHandle,
    ptr: *mut *const u8,
    len: *mut usize,
) -> bool;

/// Returns a borrow obtained from the pin callback. Must be callable with a host error
/// pending.
pub type NnbUnpinFn =
    unsafe extern "C" fn(user_data: *mut c_void, handle: ArrayHandle, ptr: *const u8, len: usize);

/// Fills `len` bytes at `dest` with the next input. Returns false on failure.
pub type NnbProducerFn =
    unsafe extern "C" fn(producer_data: *mut c_void, dest: *mut u8, len: usize) -> bool;

/// Receives one result. The output pointer is only valid during the call. Returning false
/// stops publication.
pub type NnbPushFn =
    unsafe extern "C" fn(user_data: *mut c_void, result: *const NnbInferenceResult) -> bool;

#[repr(C)]
pub struct NnbHost {
    pub user_data: *mut c_void,
    pub pin: Option<NnbPinFn>,
    pub unpin: Option<NnbUnpinFn>,
}

/// One sample. `input` is an array handle unless `producer` is set; a zero
/// `expected_output` means no golden output.
#[repr(C)]
pub struct NnbSample {
    pub input: ArrayHandle,
    pub producer: Option<NnbProducerFn>,
    pub producer_data: *mut c_void,
    pub expected_output: ArrayHandle,
}

#[repr(C)]
pub struct NnbSequence {
    pub samples: *const NnbSample,
    pub len: usize,
}

#[repr(C)]
pub struct NnbInferenceResult {
    pub compute_time_sec: f32,
    pub mean_square_error: f32,
    pub max_single_error: f32,
    /// Null when the output was discarded.
    pub output: *const u8,
    pub output_len: usize,
    pub sequence_index: usize,
    pub sample_index: usize,
}

#[repr(C)]
pub struct NnbResultSink {
    pub user_data: *mut c_void,
    pub push: Option<NnbPushFn>,
}

struct CallbackHost<'a> {
    host: &'a NnbHost,
}

impl BufferHost for CallbackHost<'_> {
    fn pin(&self, handle: ArrayHandle) -> Result<PinnedBytes, HostError> {
        let pin = self.host.pin.ok_or(HostError::Refused { handle })?;
        let mut ptr: *const u8 = ptr::null();
        let mut len = 0usize;
        // SAFETY: the host promised a valid pin callback for `user_data`.
        let pinned = unsafe { pin(self.host.user_data, handle, &mut ptr, &mut len) };
        if !pinned {
            return Err(HostError::Refused { handle });
        }
        Ok(PinnedBytes::new(ptr, len))
    }

    fn unpin(&self, handle: ArrayHandle, bytes: PinnedBytes) {
        if let Some(unpin) = self.host.unpin {
            // SAFETY: releases a borrow returned by the matching pin callback.
            unsafe { unpin(self.host.user_data, handle, bytes.ptr, bytes.len) };
        }
    }
}

/// Runs `body`, aborting the process if it panics.
fn guard<T>(function: &str, body: impl FnOnce() -> T) -> T {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(value) => value,
        Err(_) => {
            log::error!("{}: fatal error, aborting", function);
            std::process::abort();
        }
    }
}

fn report(function: &str, error: &BenchmarkError) -> bool {
    log::error!("{}: {}", function, error);
    false
}

/// # Safety
/// `path` must be null or a valid NUL-terminated string.
unsafe fn path_from_raw(path: *const c_char) -> Option<PathBuf> {
    if path.is_null() {
        return None;
    }
    // SAFETY: checked non-null; the caller guarantees NUL termination.
    let path = unsafe { CStr::from_ptr(path) };
    path.to_str().ok().map(PathBuf::from)
}

/// # Safety
/// `sequences` must point to `count` valid sequences whose sample arrays and producer data
/// outlive the returned source.
unsafe fn source_from_raw(
    sequences: *const NnbSequence,
    count: usize,
) -> Option<SequenceSetSource<'static>> {
    if count == 0 {
        return Some(Vec::new());
    }
    if sequences.is_null() {
        return None;
    }

    // SAFETY: checked non-null, length provided by the caller.
    let sequences = unsafe { slice::from_raw_parts(sequences, count) };
    let mut source = Vec::with_capacity(count);
    for sequence in sequences {
        if sequence.samples.is_null() && sequence.len > 0 {
            return None;
        }
        let samples = if sequence.len == 0 {
            &[][..]
        } else {
            // SAFETY: checked non-null, length provided by the caller.
            unsafe { slice::from_raw_parts(sequence.samples, sequence.len) }
        };

        let samples = samples
            .iter()
            .map(|sample| {
                let expected_output = (sample.expected_output != 0).then_some(sample.expected_output);
                match sample.producer {
                    Some(producer) => {
                        let data = sample.producer_data;
                        SampleSource::lazy(
                            move |dest: &mut [u8]| {
                                // SAFETY: `dest` is a writable region of `dest.len()` bytes.
                                unsafe { producer(data, dest.as_mut_ptr(), dest.len()) }
                            },
                            expected_output,
                        )
                    }
                    None => SampleSource::new(sample.input, expected_output),
                }
            })
            .collect();
        source.push(samples);
    }
    Some(source)
}

fn publish(sink: &NnbResultSink, results: Vec<InferenceResult>) -> bool {
    let Some(push) = sink.push else {
        log::error!("nnb_run_benchmark: result sink has no push callback");
        return false;
    };

    for result in results {
        let output = result.inference_output();
        let raw = NnbInferenceResult {
            compute_time_sec: result.compute_time_sec(),
            mean_square_error: result.mean_square_error(),
            max_single_error: result.max_single_error(),
            output: output.map_or(ptr::null(), <[u8]>::as_ptr),
            output_len: output.map_or(0, <[u8]>::len),
            sequence_index: result.sequence_index(),
            sample_index: result.sample_index(),
        };
        // SAFETY: `raw` and the output bytes outlive the call.
        if !unsafe { push(sink.user_data, &raw) } {
            log::error!("nnb_run_benchmark: the host rejected a result");
            return false;
        }
    }
    true
}

/// Loads a model. Returns null on failure.
///
/// # Safety
/// `model_path` must be a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nnb_init_model(
    model_path: *const c_char,
    use_acceleration: bool,
    dump_intermediates: bool,
) -> *mut NnbModel {
    guard("nnb_init_model", || {
        // SAFETY: forwarded caller guarantee.
        let Some(path) = (unsafe { path_from_raw(model_path) }) else {
            log::error!("nnb_init_model: invalid model path");
            return ptr::null_mut();
        };
        match NnbModel::init_model(&path, use_acceleration, dump_intermediates) {
            Ok(model) => Box::into_raw(Box::new(model.with_trace_sink(LogTraceSink::default()))),
            Err(error) => {
                report("nnb_init_model", &error);
                ptr::null_mut()
            }
        }
    })
}

/// Destroys a model handle.
///
/// # Safety
/// `model` must be null or a handle from [`nnb_init_model`] not destroyed yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nnb_destroy_model(model: *mut NnbModel) {
    if model.is_null() {
        return;
    }
    guard("nnb_destroy_model", || {
        // SAFETY: the handle was created by Box::into_raw and is destroyed exactly once.
        drop(unsafe { Box::from_raw(model) });
    });
}

/// Resizes the input tensor. After a failure the handle can only be destroyed.
///
/// # Safety
/// `model` must be a live handle and `shape` must point to `len` values.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nnb_resize_input_tensors(
    model: *mut NnbModel,
    shape: *const i32,
    len: usize,
) -> bool {
    guard("nnb_resize_input_tensors", || {
        // SAFETY: live handle per the caller.
        let Some(model) = (unsafe { model.as_mut() }) else {
            return false;
        };
        if shape.is_null() {
            return false;
        }
        // SAFETY: checked non-null, length provided by the caller.
        let shape = unsafe { slice::from_raw_parts(shape, len) };
        match model.resize_input_tensors(shape) {
            Ok(()) => true,
            Err(error) => report("nnb_resize_input_tensors", &error),
        }
    })
}

/// Runs the benchmark loop and pushes every result into `sink`.
///
/// Results are only published when the whole run succeeded. Borrowed arrays are
/// released before this function returns.
///
/// # Safety
/// All pointers must be valid for the duration of the call; see the field docs.
#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn nnb_run_benchmark(
    model: *mut NnbModel,
    host: *const NnbHost,
    sequences: *const NnbSequence,
    sequence_count: usize,
    inferences_max_count: usize,
    timeout_sec: f32,
    flags: u32,
    sink: *const NnbResultSink,
) -> bool {
    guard("nnb_run_benchmark", || {
        // SAFETY: pointers are valid per the caller.
        let (Some(model), Some(host), Some(sink)) =
            (unsafe { (model.as_mut(), host.as_ref(), sink.as_ref()) })
        else {
            log::error!("nnb_run_benchmark: null handle, host or sink");
            return false;
        };
        // SAFETY: forwarded caller guarantee.
        let Some(source) = (unsafe { source_from_raw(sequences, sequence_count) }) else {
            log::error!("nnb_run_benchmark: invalid sequence array");
            return false;
        };

        let host = CallbackHost { host };
        match model.run_benchmark(
            &host,
            source,
            inferences_max_count,
            timeout_sec,
            RunFlags::from_bits(flags),
        ) {
            Ok(results) => publish(sink, results),
            Err(error) => report("nnb_run_benchmark", &error),
        }
    })
}

/// Runs every sample once and writes every intermediate tensor into `dump_dir`.
///
/// # Safety
/// All pointers must be valid for the duration of the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nnb_dump_all_layers(
    model: *mut NnbModel,
    host: *const NnbHost,
    dump_dir: *const c_char,
    sequences: *const NnbSequence,
    sequence_count: usize,
) -> bool {
    guard("nnb_dump_all_layers", || {
        // SAFETY: pointers are valid per the caller.
        let (Some(model), Some(host)) = (unsafe { (model.as_mut(), host.as_ref()) }) else {
            log::error!("nnb_dump_all_layers: null handle or host");
            return false;
        };
        // SAFETY: forwarded caller guarantee.
        let Some(dump_dir) = (unsafe { path_from_raw(dump_dir) }) else {
            log::error!("nnb_dump_all_layers: invalid dump directory");
            return false;
        };
        // SAFETY: forwarded caller guarantee.
        let Some(source) = (unsafe { source_from_raw(sequences, sequence_count) }) else {
            log::error!("nnb_dump_all_layers: invalid sequence array");
            return false;
        };

        let host = CallbackHost { host };
        match model.dump_all_layers(&host, &dump_dir, source) {
            Ok(_) => true,
            Err(error) => report("nnb_dump_all_layers", &error),
        }
    })
}
