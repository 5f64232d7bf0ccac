//! Deferred release of upload buffers

use super::types::BufferDescriptor;

/// Upload buffers the backend still needs until the current frame ends
#[derive(Debug, Default)]
pub struct ReleaseQueue {
    pending: Vec<BufferDescriptor>,
}

impl ReleaseQueue {
    /// Hold `buffer` until the next [`purge`](Self::purge)
    pub fn schedule_destroy(&mut self, buffer: BufferDescriptor) {
        self.pending.push(buffer);
    }

    /// Release every held buffer, returning how many were released
    pub fn purge(&mut self) -> usize {
        let count = self.pending.len();
        for buffer in self.pending.drain(..) {
            buffer.release();
        }
        count
    }

    /// Number of buffers waiting for release
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
