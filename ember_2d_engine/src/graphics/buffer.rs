//! GPU buffer trait and creation descriptor

use crate::error::Ember2dResult as Result;

/// What a buffer will be bound as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Per-vertex attribute data
    Vertex,
    /// Triangle indices
    Index,
    /// Shader uniform block
    Uniform,
    /// Read/write shader storage
    Storage,
}

/// Requested size and usage for buffer creation
#[derive(Debug, Clone)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    /// Bind point the buffer is created for
    pub usage: BufferUsage,
}

/// GPU buffer resource
///
/// Backends provide the concrete type (VulkanBuffer for the Vulkan
/// backend); dropping it releases the GPU allocation.
pub trait Buffer: Send + Sync {
    /// Size of the buffer in bytes
    fn size(&self) -> u64;

    /// Usage this buffer was created with
    fn usage(&self) -> BufferUsage;

    /// Write `data` into the buffer starting at byte `offset`
    ///
    /// Fails if the range runs past the end of the buffer or the buffer
    /// is not CPU-writable.
    fn update(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// Raw pointer to persistently mapped memory
    ///
    /// Returns None if the buffer is not CPU-accessible (device-local only).
    /// The pointer remains valid for the lifetime of the buffer.
    fn mapped_ptr(&self) -> Option<*mut u8>;

    /// Backend handle as an opaque integer
    ///
    /// For the Vulkan backend this is the raw `VkBuffer`, letting the
    /// backend rebind buffers it did not create itself without downcasting.
    fn native_handle(&self) -> u64;
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
