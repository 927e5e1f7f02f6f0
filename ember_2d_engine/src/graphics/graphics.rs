//! Graphics backend trait, configuration, and the plugin registry
//!
//! The `Graphics` trait is the surface a rendering backend implements:
//! mode lifecycle, resource creation, draw submission, and presentation.
//! Backends are created either directly (e.g. `VulkanGraphics::new`) or
//! through the plugin registry, and are usually registered as the engine
//! graphics singleton afterwards.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use glam::{Mat4, Vec4};
use winit::window::Window;

use crate::error::{Ember2dError as Error, Ember2dResult as Result};
use crate::graphics::{
    Buffer, BufferDesc, BufferBindings, BufferUsage, IndexType, PixelFormat,
    PixelFormatUsage, Shader, ShaderStages, StreamBuffer, Texture, VertexAttributes,
};

// ===== CONFIGURATION AND DIAGNOSTICS =====

/// Graphics backend configuration
#[derive(Debug, Clone)]
pub struct GraphicsConfig {
    /// Enable validation/debug layers
    pub enable_validation: bool,
    /// Application name
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),
    /// Lock presentation to the display refresh rate
    ///
    /// When false the backend prefers a low-latency present mode where the
    /// device offers one (MAILBOX on Vulkan) and falls back to FIFO.
    /// When true the backend always presents with FIFO.
    pub vsync: bool,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            enable_validation: cfg!(debug_assertions),
            app_name: "Ember2D Application".to_string(),
            app_version: (1, 0, 0),
            vsync: false,
        }
    }
}

/// Identity of the active backend and the device it runs on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererInfo {
    /// Backend name (e.g. "Vulkan")
    pub name: String,
    /// Backend API version string
    pub version: String,
    /// GPU vendor name
    pub vendor: String,
    /// GPU device name
    pub device: String,
}

/// Per-frame graphics statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphicsStats {
    /// Number of draw calls recorded this frame
    pub draw_calls: u32,
    /// Number of triangles submitted this frame
    pub triangles: u32,
    /// Entries currently held by the backend pipeline cache
    pub pipeline_cache_entries: u32,
    /// Entries currently held by the backend descriptor set cache
    pub descriptor_cache_entries: u32,
}

/// Device limits captured when the backend is created
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphicsCapabilities {
    /// Maximum width/height of a 2D texture
    pub max_texture_size: u32,
    /// Maximum sampler anisotropy
    pub max_anisotropy: f32,
    /// Supported point size range (min, max)
    pub point_size_range: (f32, f32),
}

// ===== DRAW COMMANDS AND BUILTIN UNIFORMS =====

/// An indexed draw call with explicit vertex and index sources
///
/// `texture: None` draws with the backend's default texture (1x1 opaque
/// white), which leaves the shader's texture modulation a no-op.
pub struct DrawIndexedCommand<'a> {
    /// Enabled vertex attributes and their layouts
    pub attributes: &'a VertexAttributes,
    /// Vertex buffers bound to the attribute buffer slots
    pub buffers: &'a BufferBindings,
    /// Texture sampled by the fragment stage
    pub texture: Option<&'a dyn Texture>,
    /// Buffer the indices are read from
    pub index_buffer: &'a dyn Buffer,
    /// Byte offset of the first index in `index_buffer`
    pub index_buffer_offset: u64,
    /// Element type of the indices
    pub index_type: IndexType,
    /// Number of indices to draw
    pub index_count: u32,
    /// Number of instances to draw
    pub instance_count: u32,
}

impl<'a> DrawIndexedCommand<'a> {
    /// Create a single-instance draw starting at index buffer offset 0
    pub fn new(
        attributes: &'a VertexAttributes,
        buffers: &'a BufferBindings,
        index_buffer: &'a dyn Buffer,
        index_type: IndexType,
        index_count: u32,
    ) -> Self {
        Self {
            attributes,
            buffers,
            texture: None,
            index_buffer,
            index_buffer_offset: 0,
            index_type,
            index_count,
            instance_count: 1,
        }
    }
}

/// Uniform block the default shader pair reads at binding 0
///
/// The layout matches the GLSL `BuiltinUniforms` block in
/// [`default_shader_source`](crate::graphics::default_shader_source):
/// two mat4s, the normal matrix packed as three vec4 rows, screen-size
/// parameters, and the constant draw color. The spare `w` lanes of the
/// normal matrix carry the DPI scale (`[0].w`) and point size (`[1].w`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuiltinUniformData {
    pub transform: Mat4,
    pub projection: Mat4,
    pub normal_matrix: [Vec4; 3],
    pub screen_size_params: Vec4,
    pub constant_color: Vec4,
}

// Mat4 and Vec4 are Pod via glam's bytemuck feature; the block is repr(C)
// with 16-byte-aligned fields only, so it has no padding.
unsafe impl bytemuck::Zeroable for BuiltinUniformData {}
unsafe impl bytemuck::Pod for BuiltinUniformData {}

impl Default for BuiltinUniformData {
    fn default() -> Self {
        Self {
            transform: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            normal_matrix: [Vec4::ZERO; 3],
            screen_size_params: Vec4::ZERO,
            constant_color: Vec4::ONE,
        }
    }
}

impl BuiltinUniformData {
    /// View the block as raw bytes for uniform buffer uploads
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// Convert an sRGB-encoded draw color to linear space
///
/// Backends render into sRGB swapchain targets, so colors supplied in
/// sRGB must be linearized before the shader multiplies them in. Alpha
/// passes through unchanged.
pub fn gamma_correct_color(color: Vec4) -> Vec4 {
    Vec4::new(
        gamma_to_linear(color.x),
        gamma_to_linear(color.y),
        gamma_to_linear(color.z),
        color.w,
    )
}

fn gamma_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

// ===== GRAPHICS TRAIT =====

/// Rendering backend trait
///
/// Implemented by backend crates (e.g. `VulkanGraphics`). A backend is
/// constructed against a window, then `set_mode` brings up the
/// presentable state (swapchain, passes, per-frame buffers) and starts
/// recording the first frame. Draw calls record into the current frame
/// until `present` submits it and rotates to the next one.
///
/// Recording is single-threaded; the engine singleton wraps the backend
/// in `Arc<Mutex<dyn Graphics>>` to make that explicit.
pub trait Graphics: Send + Sync {
    /// Create the presentable state for a drawable area of `width` x `height`
    ///
    /// After this returns the backend is recording the first frame and
    /// `is_created()` reports true. Calling it while a mode is already
    /// set tears the old mode down first.
    fn set_mode(&mut self, width: u32, height: u32) -> Result<()>;

    /// Tear down the presentable state
    ///
    /// Waits for the device to go idle, then destroys everything
    /// `set_mode` created. The backend itself stays usable; `set_mode`
    /// may be called again.
    fn unset_mode(&mut self);

    /// Whether a presentable mode is currently set
    fn is_created(&self) -> bool;

    /// Create a GPU buffer
    ///
    /// # Arguments
    ///
    /// * `desc` - Size and usage of the buffer
    fn new_buffer(&mut self, desc: BufferDesc) -> Result<Arc<dyn Buffer>>;

    /// Create a persistently mapped streaming buffer
    ///
    /// # Arguments
    ///
    /// * `usage` - How the buffer will be bound (vertex, index, uniform)
    /// * `size` - Total size in bytes
    fn new_stream_buffer(&mut self, usage: BufferUsage, size: usize) -> Result<Box<dyn StreamBuffer>>;

    /// Create a shader from compiled SPIR-V stages
    fn new_shader(&mut self, stages: ShaderStages) -> Result<Arc<dyn Shader>>;

    /// Record an indexed draw into the current frame
    fn draw(&mut self, cmd: &DrawIndexedCommand) -> Result<()>;

    /// Record a batched quad draw into the current frame
    ///
    /// Draws `count` quads whose vertices start at quad index `start` in
    /// the bound vertex buffers, using the backend's shared quad index
    /// buffer. Draws exceeding the 16-bit index range are split into
    /// multiple calls internally.
    ///
    /// # Arguments
    ///
    /// * `start` - Index of the first quad (4 vertices each)
    /// * `count` - Number of quads to draw
    /// * `attributes` - Enabled vertex attributes and layouts
    /// * `buffers` - Vertex buffers for the attribute buffer slots
    /// * `texture` - Texture to sample, or None for the default texture
    fn draw_quads(
        &mut self,
        start: u32,
        count: u32,
        attributes: &VertexAttributes,
        buffers: &BufferBindings,
        texture: Option<&dyn Texture>,
    ) -> Result<()>;

    /// Notify the backend that the drawable area changed size
    ///
    /// Stores the new size, resets the orthographic projection, and
    /// recreates the swapchain-dependent resources.
    fn set_viewport_size(&mut self, width: u32, height: u32) -> Result<()>;

    /// Submit the current frame and present it
    ///
    /// Flushes pending batched draws, submits the recorded commands,
    /// queues the image for presentation, rotates the per-frame streaming
    /// buffers, and immediately begins recording the next frame.
    fn present(&mut self) -> Result<()>;

    /// Identity of the backend and the device it runs on
    fn renderer_info(&self) -> Result<RendererInfo>;

    /// Set the constant draw color (sRGB, straight alpha)
    ///
    /// Feeds the builtin uniform block's constant color after gamma
    /// correction; draws without a color attribute are tinted with it.
    fn set_color(&mut self, color: Vec4);

    /// Whether the device supports a pixel format for the given usages
    fn supports_pixel_format(&self, format: PixelFormat, usage: PixelFormatUsage) -> bool;

    /// Device limits captured at creation
    fn capabilities(&self) -> GraphicsCapabilities;

    /// Statistics for the frame being recorded
    fn stats(&self) -> GraphicsStats;

    /// Wait for all GPU operations to complete
    fn wait_idle(&self) -> Result<()>;
}

// ===== PLUGIN SYSTEM FOR REGISTERING BACKENDS =====

/// Graphics plugin factory function type
type GraphicsPluginFactory =
    Box<dyn Fn(&Window, ShaderStages, GraphicsConfig) -> Result<Arc<Mutex<dyn Graphics>>> + Send + Sync>;

/// Plugin registry for graphics backends
pub struct GraphicsPluginRegistry {
    plugins: HashMap<&'static str, GraphicsPluginFactory>,
}

impl GraphicsPluginRegistry {
    /// Create a new plugin registry
    fn new() -> Self {
        Self {
            plugins: HashMap::new(),
        }
    }

    /// Register a plugin
    ///
    /// # Arguments
    ///
    /// * `name` - Plugin name (e.g. "vulkan")
    /// * `factory` - Factory function creating the backend
    pub fn register_plugin<F>(&mut self, name: &'static str, factory: F)
    where
        F: Fn(&Window, ShaderStages, GraphicsConfig) -> Result<Arc<Mutex<dyn Graphics>>>
            + Send
            + Sync
            + 'static,
    {
        self.plugins.insert(name, Box::new(factory));
    }

    /// Create a backend using a registered plugin
    ///
    /// # Arguments
    ///
    /// * `plugin_name` - Name of the plugin to use
    /// * `window` - Window to render to
    /// * `default_shader` - Compiled SPIR-V stages of the default shader
    /// * `config` - Backend configuration
    ///
    /// # Returns
    ///
    /// A shared, thread-safe backend instance
    pub fn create_graphics(
        &self,
        plugin_name: &str,
        window: &Window,
        default_shader: ShaderStages,
        config: GraphicsConfig,
    ) -> Result<Arc<Mutex<dyn Graphics>>> {
        self.plugins
            .get(plugin_name)
            .ok_or_else(|| Error::InitializationFailed(format!("Plugin '{}' not found", plugin_name)))?
            (window, default_shader, config)
    }

    /// Names of the registered plugins
    pub fn plugin_names(&self) -> Vec<&'static str> {
        self.plugins.keys().copied().collect()
    }
}

static GRAPHICS_REGISTRY: Mutex<Option<GraphicsPluginRegistry>> = Mutex::new(None);

/// Get the global graphics plugin registry
pub fn graphics_plugin_registry() -> &'static Mutex<Option<GraphicsPluginRegistry>> {
    // Initialize on first access
    let mut registry = GRAPHICS_REGISTRY.lock().unwrap();
    if registry.is_none() {
        *registry = Some(GraphicsPluginRegistry::new());
    }
    drop(registry);
    &GRAPHICS_REGISTRY
}

/// Register a graphics plugin in the global registry
///
/// # Arguments
///
/// * `name` - Plugin name
/// * `factory` - Factory function
pub fn register_graphics_plugin<F>(name: &'static str, factory: F)
where
    F: Fn(&Window, ShaderStages, GraphicsConfig) -> Result<Arc<Mutex<dyn Graphics>>>
        + Send
        + Sync
        + 'static,
{
    graphics_plugin_registry()
        .lock()
        .unwrap()
        .as_mut()
        .unwrap()
        .register_plugin(name, factory);
}

#[cfg(test)]
#[path = "graphics_tests.rs"]
mod tests;
