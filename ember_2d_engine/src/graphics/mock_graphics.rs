//! Mock graphics backend for unit tests (no GPU required)
//!
//! Implements the full `Graphics` trait with CPU-side stand-ins so the
//! engine singleton and draw bookkeeping can be tested without a device.
//! The mock stream buffer is functional (heap storage with a write
//! cursor) to exercise the streaming contract.

use std::sync::{Arc, Mutex};
use glam::Vec4;

use crate::error::Ember2dResult as Result;
use crate::graphics::{
    Buffer, BufferDesc, BufferBindings, BufferUsage, DrawIndexedCommand,
    Graphics, GraphicsCapabilities, GraphicsStats, PixelFormat, PixelFormatUsage,
    RendererInfo, Shader, ShaderStages, StreamBuffer, Texture, VertexAttributes,
};
use crate::engine_bail;

// ============================================================================
// Mock Buffer
// ============================================================================

pub struct MockBuffer {
    pub size: u64,
    pub usage: BufferUsage,
}

impl Buffer for MockBuffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        if offset + data.len() as u64 > self.size {
            engine_bail!("ember2d::mock", "Buffer update out of bounds");
        }
        Ok(())
    }

    fn mapped_ptr(&self) -> Option<*mut u8> {
        None
    }

    fn native_handle(&self) -> u64 {
        0
    }
}

// ============================================================================
// Mock StreamBuffer
// ============================================================================

/// Functional stream buffer over heap memory
pub struct MockStreamBuffer {
    data: Vec<u8>,
    used: usize,
    usage: BufferUsage,
}

impl MockStreamBuffer {
    pub fn new(usage: BufferUsage, size: usize) -> Self {
        Self {
            data: vec![0; size],
            used: 0,
            usage,
        }
    }
}

impl StreamBuffer for MockStreamBuffer {
    fn map(&mut self, min_size: usize) -> Result<&mut [u8]> {
        if self.used + min_size > self.data.len() {
            engine_bail!(
                "ember2d::mock",
                "Stream buffer overflow: {} bytes requested, {} available",
                min_size,
                self.data.len() - self.used
            );
        }
        Ok(&mut self.data[self.used..])
    }

    fn unmap(&mut self, used_size: usize) -> usize {
        let offset = self.used;
        self.used += used_size;
        offset
    }

    fn mark_used(&mut self, size: usize) {
        self.used += size;
    }

    fn next_frame(&mut self) {
        self.used = 0;
    }

    fn usable_size(&self) -> usize {
        self.data.len() - self.used
    }

    fn size(&self) -> usize {
        self.data.len()
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn native_handle(&self) -> u64 {
        0
    }
}

// ============================================================================
// Mock Shader / Texture
// ============================================================================

pub struct MockShader;

impl Shader for MockShader {}

pub struct MockTexture {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl Texture for MockTexture {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn format(&self) -> PixelFormat {
        self.format
    }

    fn native_view_handle(&self) -> u64 {
        0
    }

    fn native_sampler_handle(&self) -> u64 {
        0
    }
}

// ============================================================================
// Mock Graphics
// ============================================================================

/// Mock backend recording draw statistics without touching a GPU
pub struct MockGraphics {
    created: bool,
    viewport: (u32, u32),
    color: Vec4,
    stats: GraphicsStats,
    /// Frames presented since creation
    pub present_count: u32,
}

impl MockGraphics {
    pub fn new() -> Self {
        Self {
            created: false,
            viewport: (0, 0),
            color: Vec4::ONE,
            stats: GraphicsStats::default(),
            present_count: 0,
        }
    }

    pub fn current_color(&self) -> Vec4 {
        self.color
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }
}

impl Graphics for MockGraphics {
    fn set_mode(&mut self, width: u32, height: u32) -> Result<()> {
        self.viewport = (width, height);
        self.created = true;
        Ok(())
    }

    fn unset_mode(&mut self) {
        self.created = false;
    }

    fn is_created(&self) -> bool {
        self.created
    }

    fn new_buffer(&mut self, desc: BufferDesc) -> Result<Arc<dyn Buffer>> {
        Ok(Arc::new(MockBuffer {
            size: desc.size,
            usage: desc.usage,
        }))
    }

    fn new_stream_buffer(&mut self, usage: BufferUsage, size: usize) -> Result<Box<dyn StreamBuffer>> {
        Ok(Box::new(MockStreamBuffer::new(usage, size)))
    }

    fn new_shader(&mut self, _stages: ShaderStages) -> Result<Arc<dyn Shader>> {
        Ok(Arc::new(MockShader))
    }

    fn draw(&mut self, cmd: &DrawIndexedCommand) -> Result<()> {
        if !self.created {
            engine_bail!("ember2d::mock", "draw called without a mode set");
        }
        self.stats.draw_calls += 1;
        self.stats.triangles += cmd.index_count / 3;
        Ok(())
    }

    fn draw_quads(
        &mut self,
        _start: u32,
        count: u32,
        _attributes: &VertexAttributes,
        _buffers: &BufferBindings,
        _texture: Option<&dyn Texture>,
    ) -> Result<()> {
        if !self.created {
            engine_bail!("ember2d::mock", "draw_quads called without a mode set");
        }
        self.stats.draw_calls += 1;
        self.stats.triangles += count * 2;
        Ok(())
    }

    fn set_viewport_size(&mut self, width: u32, height: u32) -> Result<()> {
        self.viewport = (width, height);
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        if !self.created {
            engine_bail!("ember2d::mock", "present called without a mode set");
        }
        self.present_count += 1;
        self.stats = GraphicsStats::default();
        Ok(())
    }

    fn renderer_info(&self) -> Result<RendererInfo> {
        Ok(RendererInfo {
            name: "Mock".to_string(),
            version: "0.0.0.0".to_string(),
            vendor: "unknown".to_string(),
            device: "Mock Device".to_string(),
        })
    }

    fn set_color(&mut self, color: Vec4) {
        self.color = color;
    }

    fn supports_pixel_format(&self, format: PixelFormat, _usage: PixelFormatUsage) -> bool {
        !matches!(format, PixelFormat::UNKNOWN)
    }

    fn capabilities(&self) -> GraphicsCapabilities {
        GraphicsCapabilities {
            max_texture_size: 4096,
            max_anisotropy: 1.0,
            point_size_range: (1.0, 1.0),
        }
    }

    fn stats(&self) -> GraphicsStats {
        self.stats
    }

    fn wait_idle(&self) -> Result<()> {
        Ok(())
    }
}

// Keeps the mock registrable through the same path as real backends
pub fn register_mock_plugin() {
    crate::graphics::register_graphics_plugin("mock", |_window, _shader, _config| {
        Ok(Arc::new(Mutex::new(MockGraphics::new())) as Arc<Mutex<dyn Graphics>>)
    });
}

#[cfg(test)]
#[path = "mock_graphics_tests.rs"]
mod tests;
