//! Shared sample buffer
//!
//! Single-writer, multi-reader growing buffer holding the full sample stream
//! of a session. The writer appends under a short write lock and then
//! publishes the committed length; readers load the length first and copy
//! only that prefix, so they never see uncommitted samples.

use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Default)]
struct Shared {
    samples: RwLock<Vec<f64>>,
    committed: AtomicUsize,
}

/// Create a new empty buffer, returning its writer and a reader.
#[must_use]
pub fn sample_buffer() -> (SampleWriter, SampleReader) {
    let shared = Arc::new(Shared::default());
    (SampleWriter { shared: Arc::clone(&shared) }, SampleReader { shared })
}

/// Exclusive append handle. Not `Clone`: there is exactly one writer.
#[derive(Debug)]
pub struct SampleWriter {
    shared: Arc<Shared>,
}

impl SampleWriter {
    /// Append samples in order and publish the new length
    pub fn append(&mut self, samples: &[f64]) {
        if samples.is_empty() {
            return;
        }
        let mut guard = self.shared.samples.write().unwrap_or_else(PoisonError::into_inner);
        guard.extend_from_slice(samples);
        self.shared.committed.store(guard.len(), Ordering::Release);
    }

    /// Committed length
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.committed.load(Ordering::Acquire)
    }

    /// True if nothing has been written
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create another reader for this buffer
    #[must_use]
    pub fn reader(&self) -> SampleReader {
        SampleReader { shared: Arc::clone(&self.shared) }
    }
}

/// Read-only handle to the buffer.
#[derive(Clone, Debug)]
pub struct SampleReader {
    shared: Arc<Shared>,
}

impl SampleReader {
    /// Committed length
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.committed.load(Ordering::Acquire)
    }

    /// True if nothing has been committed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the committed samples in `range`, clamped to the committed length
    #[must_use]
    pub fn slice(&self, range: Range<usize>) -> Vec<f64> {
        let len = self.len();
        let end = range.end.min(len);
        let start = range.start.min(end);
        let guard = self.shared.samples.read().unwrap_or_else(PoisonError::into_inner);
        guard[start..end].to_vec()
    }

    /// Copy of every committed sample
    #[must_use]
    pub fn snapshot(&self) -> Vec<f64> {
        self.slice(0..usize::MAX)
    }
}
