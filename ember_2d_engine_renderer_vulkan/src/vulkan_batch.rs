/// BatchedDrawBuffers - per-frame-slot streaming buffer set
///
/// Each frame slot owns one set so the CPU can write frame k+1 while the
/// GPU still reads frame k. The constant color stream is a 16-byte vertex
/// buffer holding opaque white, bound at the synthesized color binding for
/// draws whose vertex format carries no color attribute.

use std::sync::Arc;

use ember_2d_engine::ember2d::Result;
use ember_2d_engine::ember2d::graphics::{BufferUsage, StreamBuffer};

use crate::vulkan_buffer::VulkanStreamBuffer;
use crate::vulkan_context::GpuContext;

/// Largest quad count a single indexed draw can cover with 16-bit indices
pub const MAX_QUADS_PER_DRAW: u32 = 65535 / 4;

/// Initial sizes that should be good enough for most cases.
const VERTEX_STREAM_1_SIZE: usize = 1024 * 1024;
const VERTEX_STREAM_2_SIZE: usize = 256 * 1024;
const INDEX_STREAM_SIZE: usize = 2 * 65535;
const CONSTANT_COLOR_SIZE: usize = 16;

/// Streaming buffers for one frame slot
pub struct BatchedDrawBuffers {
    pub vertex_stream_1: VulkanStreamBuffer,
    pub vertex_stream_2: VulkanStreamBuffer,
    pub index_stream: VulkanStreamBuffer,
    /// Prefilled with opaque white, never rewritten and never rotated
    pub constant_color: VulkanStreamBuffer,
}

impl BatchedDrawBuffers {
    /// Create the streaming set for one frame slot
    pub fn new(ctx: &Arc<GpuContext>) -> Result<Self> {
        let vertex_stream_1 =
            VulkanStreamBuffer::new(Arc::clone(ctx), BufferUsage::Vertex, VERTEX_STREAM_1_SIZE)?;
        let vertex_stream_2 =
            VulkanStreamBuffer::new(Arc::clone(ctx), BufferUsage::Vertex, VERTEX_STREAM_2_SIZE)?;
        let index_stream =
            VulkanStreamBuffer::new(Arc::clone(ctx), BufferUsage::Index, INDEX_STREAM_SIZE)?;

        // Sometimes the vertex color is not set, so we manually adjust it
        // to white color
        let mut constant_color =
            VulkanStreamBuffer::new(Arc::clone(ctx), BufferUsage::Vertex, CONSTANT_COLOR_SIZE)?;
        let white: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
        let mapped = constant_color.map(CONSTANT_COLOR_SIZE)?;
        mapped[..CONSTANT_COLOR_SIZE].copy_from_slice(bytemuck::cast_slice(&white));
        constant_color.unmap(CONSTANT_COLOR_SIZE);

        Ok(Self {
            vertex_stream_1,
            vertex_stream_2,
            index_stream,
            constant_color,
        })
    }

    /// Recycle the rotating streams for a new frame
    ///
    /// The slot's in-flight fence has been waited by the time this runs,
    /// so the GPU no longer reads the previous contents. The constant
    /// color stream keeps its fill.
    pub fn next_frame(&mut self) {
        self.vertex_stream_1.next_frame();
        self.vertex_stream_2.next_frame();
        self.index_stream.next_frame();
    }
}

/// Split a quad draw into chunks that fit 16-bit indexed draws
///
/// Yields `(base_vertex, quad_count)` pairs; `base_vertex` starts at
/// `start * 4` and advances by four vertices per quad drawn.
pub fn quad_chunks(start: u32, count: u32) -> impl Iterator<Item = (u32, u32)> {
    let mut base_vertex = start * 4;
    let mut remaining = count;

    std::iter::from_fn(move || {
        if remaining == 0 {
            return None;
        }
        let quad_count = remaining.min(MAX_QUADS_PER_DRAW);
        let chunk = (base_vertex, quad_count);
        base_vertex += quad_count * 4;
        remaining -= quad_count;
        Some(chunk)
    })
}

#[cfg(test)]
#[path = "vulkan_batch_tests.rs"]
mod tests;
