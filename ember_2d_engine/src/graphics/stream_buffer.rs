//! Streaming buffer trait for per-frame CPU-written GPU data
//!
//! A stream buffer is a persistently mapped, CPU-visible buffer written
//! linearly each frame (batched vertices, quad indices, uniform snapshots).
//! The frame loop calls `next_frame()` when the buffer's frame slot becomes
//! current again, which recycles the write cursor; the in-flight fences of
//! the frame loop guarantee the GPU has finished reading by then.

use crate::graphics::BufferUsage;
use crate::error::Ember2dResult as Result;

/// Streaming buffer trait
///
/// Implemented by backend-specific stream buffers (e.g., VulkanStreamBuffer).
pub trait StreamBuffer: Send + Sync {
    /// Map the region at the current write cursor
    ///
    /// Returns a writable slice of at least `min_size` bytes starting at the
    /// cursor. Fails if less than `min_size` bytes remain this frame.
    fn map(&mut self, min_size: usize) -> Result<&mut [u8]>;

    /// Finish writing `used_size` bytes of a mapped region
    ///
    /// Returns the byte offset the written data starts at, for use as a
    /// vertex/index buffer bind offset.
    fn unmap(&mut self, used_size: usize) -> usize;

    /// Advance the write cursor without a map/unmap pair
    fn mark_used(&mut self, size: usize);

    /// Recycle the buffer for a new frame, resetting the write cursor
    fn next_frame(&mut self);

    /// Bytes still writable this frame
    fn usable_size(&self) -> usize;

    /// Total size in bytes
    fn size(&self) -> usize;

    /// Usage this buffer was created with
    fn usage(&self) -> BufferUsage;

    /// Backend handle as an opaque integer (raw `VkBuffer` for Vulkan)
    fn native_handle(&self) -> u64;
}
