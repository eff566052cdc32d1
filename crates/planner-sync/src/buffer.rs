//! Pending-update buffer
//!
//! Accumulates local edits between flushes. Empty between flush cycles.

use crate::patch::Patch;

/// Edits made since the last flush began
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingBuffer {
    patch: Patch,
}

impl PendingBuffer {
    /// Create empty buffer
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a new edit; its fields overwrite buffered values
    #[inline]
    pub fn absorb(&mut self, edit: Patch) {
        self.patch.merge_newer(edit);
    }

    /// Drain everything for an outgoing flush
    #[inline]
    #[must_use]
    pub fn take(&mut self) -> Patch {
        self.patch.take()
    }

    /// Put a failed payload back under any edits made since it was taken
    #[inline]
    pub fn restore(&mut self, failed: Patch) {
        self.patch.merge_under(failed);
    }

    /// Copy of the buffered fields
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> Patch {
        self.patch.clone()
    }

    /// Borrow the buffered fields
    #[inline]
    #[must_use]
    pub fn as_patch(&self) -> &Patch {
        &self.patch
    }

    /// Check if nothing is buffered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patch.is_empty()
    }

    /// Number of buffered fields
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.patch.len()
    }
}
