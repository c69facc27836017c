//! Borrowed views over host-owned memory.
//!
//! The harness never owns the bytes it benchmarks with. A [`BufferHost`] pins a host array and
//! hands back a pointer; the harness records the pin in a release list immediately and
//! unpins it exactly once when the list is dropped, whatever path the call takes.

use std::fmt;

use thiserror::Error;

/// Host-side identity of a byte array.
pub type ArrayHandle = u64;

/// Fills the engine's input region on demand. Returns `false` when the host failed to
/// produce the data.
pub type InputProducer<'a> = Box<dyn FnMut(&mut [u8]) -> bool + 'a>;

/// Raw location of pinned host bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinnedBytes {
    pub ptr: *const u8,
    pub len: usize,
}

impl PinnedBytes {
    pub fn new(ptr: *const u8, len: usize) -> Self {
        Self { ptr, len }
    }

    /// Null is only acceptable for an empty array.
    pub fn is_valid(&self) -> bool {
        !self.ptr.is_null() || self.len == 0
    }
}

/// Errors raised by a host while pinning an array.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("unknown array handle {handle}")]
    UnknownArray { handle: ArrayHandle },

    #[error("the host refused to pin array {handle}")]
    Refused { handle: ArrayHandle },
}

/// The borrow protocol of the process that owns the benchmark data.
pub trait BufferHost {
    /// Borrows the bytes of `handle` without copying them. The bytes must stay valid and
    /// unmoved until [`BufferHost::unpin`] is called for the same pin.
    fn pin(&self, handle: ArrayHandle) -> Result<PinnedBytes, HostError>;

    /// Returns a borrow obtained from [`BufferHost::pin`]. Implementations must accept this
    /// call while a host-side error is pending; nothing else is called on the release path.
    fn unpin(&self, handle: ArrayHandle, bytes: PinnedBytes);
}

/// Read-only view of pinned host bytes.
///
/// Views are only created by a release list and are neither `Clone` nor `Copy`, so they can
/// only be reached through the sequence set that owns the list.
pub struct BufferView {
    bytes: PinnedBytes,
}

impl BufferView {
    pub fn len(&self) -> usize {
        self.bytes.len
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        if self.bytes.len == 0 {
            return &[];
        }
        // SAFETY: the pointer was checked non-null at acquisition and the host keeps the
        // array pinned until the owning ReleaseList is dropped, which outlives `self`.
        unsafe { std::slice::from_raw_parts(self.bytes.ptr, self.bytes.len) }
    }
}

impl fmt::Debug for BufferView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferView")
            .field("len", &self.bytes.len)
            .finish()
    }
}

/// Failure to fill a destination region from a foreign buffer.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MaterializeError {
    #[error("the input producer reported a failure")]
    ProducerFailed,

    #[error("the buffer holds {actual} bytes but the destination expects {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// A sample input: either bytes the host already supplied or a producer invoked right
/// before the inference that consumes it.
pub enum ForeignBuffer<'a> {
    Direct(BufferView),
    Lazy(InputProducer<'a>),
}

impl ForeignBuffer<'_> {
    /// Fills `dest` from this buffer.
    pub fn materialize(&mut self, dest: &mut [u8]) -> Result<(), MaterializeError> {
        match self {
            ForeignBuffer::Direct(view) => {
                let bytes = view.as_slice();
                if bytes.len() != dest.len() {
                    return Err(MaterializeError::SizeMismatch {
                        expected: dest.len(),
                        actual: bytes.len(),
                    });
                }
                dest.copy_from_slice(bytes);
                Ok(())
            }
            ForeignBuffer::Lazy(producer) => {
                if producer(dest) {
                    Ok(())
                } else {
                    Err(MaterializeError::ProducerFailed)
                }
            }
        }
    }
}

impl fmt::Debug for ForeignBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForeignBuffer::Direct(view) => f.debug_tuple("Direct").field(view).finish(),
            ForeignBuffer::Lazy(_) => f.debug_tuple("Lazy").finish(),
        }
    }
}

#[derive(Debug)]
struct PinnedArray {
    handle: ArrayHandle,
    bytes: PinnedBytes,
}

/// Every array pinned during one harness call, released together on drop.
pub(crate) struct ReleaseList<'h, H: BufferHost + ?Sized> {
    host: &'h H,
    pinned: Vec<PinnedArray>,
}

impl<'h, H: BufferHost + ?Sized> ReleaseList<'h, H> {
    pub fn new(host: &'h H) -> Self {
        Self {
            host,
            pinned: Vec::new(),
        }
    }

    /// Pins `handle` and returns a view of its bytes.
    ///
    /// A successful pin is recorded before the returned bytes are checked, so an invalid
    /// pin is still released.
    pub fn acquire(&mut self, handle: ArrayHandle) -> Result<Acquired, HostError> {
        let bytes = self.host.pin(handle)?;
        self.pinned.push(PinnedArray { handle, bytes });
        if bytes.is_valid() {
            Ok(Acquired::View(BufferView { bytes }))
        } else {
            Ok(Acquired::Null { len: bytes.len })
        }
    }

    pub fn len(&self) -> usize {
        self.pinned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty()
    }
}

/// Result of pinning one array.
#[derive(Debug)]
pub(crate) enum Acquired {
    View(BufferView),
    Null { len: usize },
}

impl<H: BufferHost + ?Sized> Drop for ReleaseList<'_, H> {
    fn drop(&mut self) {
        let count = self.pinned.len();
        while let Some(array) = self.pinned.pop() {
            self.host.unpin(array.handle, array.bytes);
        }
        if count > 0 {
            log::debug!("Released {} borrowed host arrays", count);
        }
    }
}
