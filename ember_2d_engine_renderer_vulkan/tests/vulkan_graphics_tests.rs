//! Integration tests for the VulkanGraphics backend
//!
//! These tests verify that VulkanGraphics correctly implements the Graphics
//! trait. All tests require a GPU and are marked with #[ignore]. They share
//! one hidden window and run serialized, one backend alive at a time.
//!
//! Run with: cargo test --test vulkan_graphics_tests -- --ignored

use std::sync::OnceLock;

use ember_2d_engine::ember2d::graphics::{
    graphics_plugin_registry, Buffer, BufferBindings, BufferDesc, BufferUsage, DataFormat,
    DrawIndexedCommand, Graphics, GraphicsConfig, IndexType, PixelFormat, PixelFormatUsage,
    ShaderStages, StreamBuffer, VertexAttributes, ATTRIB_POS, ATTRIB_TEXCOORD,
};
use ember_2d_engine_renderer_vulkan::VulkanGraphics;
use serial_test::serial;
#[cfg(not(target_os = "windows"))]
use winit::event_loop::EventLoop;
#[cfg(target_os = "windows")]
use winit::event_loop::EventLoopBuilder;
#[cfg(target_os = "windows")]
use winit::platform::windows::EventLoopBuilderExtWindows;
use winit::window::Window;

static TEST_WINDOW: OnceLock<Window> = OnceLock::new();

/// Hidden window shared by every test in this binary
///
/// winit refuses to build a second event loop in one process, so the first
/// caller creates the loop plus window and the loop is leaked.
#[allow(deprecated)]
fn test_window() -> &'static Window {
    TEST_WINDOW.get_or_init(|| {
        // cargo test runs tests off the main thread; Windows needs any_thread
        #[cfg(target_os = "windows")]
        let event_loop = EventLoopBuilder::new().with_any_thread(true).build().unwrap();
        #[cfg(not(target_os = "windows"))]
        let event_loop = EventLoop::new().unwrap();
        let attrs = Window::default_attributes()
            .with_title("ember2d Vulkan tests")
            .with_inner_size(winit::dpi::LogicalSize::new(800, 600))
            .with_visible(false);
        let window = event_loop.create_window(attrs).unwrap();
        std::mem::forget(event_loop);
        window
    })
}

/// Validation layers may be missing on test machines, so they stay off
fn test_config() -> GraphicsConfig {
    GraphicsConfig {
        enable_validation: false,
        ..Default::default()
    }
}

/// Minimal SPIR-V stages for the default shader slot
///
/// `void main() {}` per stage: passes reflection and module creation, and
/// pipelines built from it are legal even though they rasterize nothing.
fn minimal_shader_stages() -> ShaderStages {
    ShaderStages::new(assemble_empty_stage(0), assemble_empty_stage(4))
}

/// Assemble an empty `main` as SPIR-V 1.0 words (execution model 0 =
/// vertex, 4 = fragment)
#[rustfmt::skip]
fn assemble_empty_stage(execution_model: u32) -> Vec<u32> {
    let mut words = vec![
        0x0723_0203, 0x0001_0000, 0, 6, 0,              // header, bound 6
        0x0002_0011, 1,                                  // OpCapability Shader
        0x0003_000E, 0, 1,                               // OpMemoryModel Logical GLSL450
        0x0005_000F, execution_model, 4, 0x6E69_616D, 0, // OpEntryPoint <model> %4 "main"
    ];
    if execution_model == 4 {
        words.extend_from_slice(&[0x0003_0010, 4, 7]); // OpExecutionMode OriginUpperLeft
    }
    words.extend_from_slice(&[
        0x0002_0013, 2,             // OpTypeVoid %2
        0x0003_0021, 3, 2,          // OpTypeFunction %3 %2
        0x0005_0036, 2, 4, 0, 3,    // OpFunction %2 %4 None %3
        0x0002_00F8, 5,             // OpLabel %5
        0x0001_00FD,                // OpReturn
        0x0001_0038,                // OpFunctionEnd
    ]);
    words
}

/// Position + texcoord attributes on buffer slot 0, 16-byte vertices
fn test_vertex_layout() -> VertexAttributes {
    let mut attributes = VertexAttributes::new();
    attributes.set(ATTRIB_POS, DataFormat::FLOAT_VEC2, 0, 0);
    attributes.set(ATTRIB_TEXCOORD, DataFormat::FLOAT_VEC2, 8, 0);
    attributes.set_buffer_layout(0, 16);
    attributes
}

// ============================================================================
// BACKEND CREATION TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_backend_creation() {
    let window = test_window();
    let graphics = VulkanGraphics::new(window, ShaderStages::default(), test_config()).unwrap();

    // No presentable mode exists until set_mode
    assert!(!graphics.is_created());
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_renderer_info() {
    let window = test_window();
    let graphics = VulkanGraphics::new(window, ShaderStages::default(), test_config()).unwrap();

    let info = graphics.renderer_info().unwrap();
    assert_eq!(info.name, "Vulkan");
    assert!(!info.device.is_empty());
    assert!(!info.vendor.is_empty());
    assert!(!info.version.is_empty());
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_capabilities() {
    let window = test_window();
    let graphics = VulkanGraphics::new(window, ShaderStages::default(), test_config()).unwrap();

    // Every Vulkan implementation guarantees at least 4096 for 2D images
    let caps = graphics.capabilities();
    assert!(caps.max_texture_size >= 4096);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_plugin_registration() {
    let window = test_window();

    ember_2d_engine_renderer_vulkan::register();

    let registry = graphics_plugin_registry().lock().unwrap();
    let graphics = registry
        .as_ref()
        .unwrap()
        .create_graphics("vulkan", window, ShaderStages::default(), test_config())
        .unwrap();
    drop(registry);

    let info = graphics.lock().unwrap().renderer_info().unwrap();
    assert_eq!(info.name, "Vulkan");
}

// ============================================================================
// BUFFER TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_create_vertex_buffer() {
    let window = test_window();
    let mut graphics = VulkanGraphics::new(window, ShaderStages::default(), test_config()).unwrap();

    let buffer = graphics
        .new_buffer(BufferDesc {
            size: 1024,
            usage: BufferUsage::Vertex,
        })
        .unwrap();

    assert_eq!(buffer.size(), 1024);
    assert_eq!(buffer.usage(), BufferUsage::Vertex);

    let data = vec![0u8; 256];
    buffer.update(0, &data).unwrap();
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_create_index_buffer_with_data() {
    let window = test_window();
    let mut graphics = VulkanGraphics::new(window, ShaderStages::default(), test_config()).unwrap();

    let buffer = graphics
        .new_buffer(BufferDesc {
            size: 512,
            usage: BufferUsage::Index,
        })
        .unwrap();

    let indices: Vec<u16> = vec![0, 1, 2, 2, 1, 3];
    let data: Vec<u8> = indices.iter().flat_map(|&i| i.to_le_bytes()).collect();
    buffer.update(0, &data).unwrap();
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_stream_buffer_cursor() {
    let window = test_window();
    let mut graphics = VulkanGraphics::new(window, ShaderStages::default(), test_config()).unwrap();

    let mut stream = graphics.new_stream_buffer(BufferUsage::Vertex, 4096).unwrap();
    assert_eq!(stream.size(), 4096);
    assert_eq!(stream.usable_size(), 4096);

    // First region starts at offset zero
    let mapped = stream.map(256).unwrap();
    mapped[..256].fill(0xAB);
    assert_eq!(stream.unmap(256), 0);

    // The cursor advances by the bytes actually used
    let _ = stream.map(128).unwrap();
    assert_eq!(stream.unmap(128), 256);
    assert_eq!(stream.usable_size(), 4096 - 384);

    stream.next_frame();
    assert_eq!(stream.usable_size(), 4096);
}

// ============================================================================
// SHADER TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_shader_rejects_invalid_spirv() {
    let window = test_window();
    let mut graphics = VulkanGraphics::new(window, ShaderStages::default(), test_config()).unwrap();

    // A bare SPIR-V header with no entry point must be rejected up front
    let stages = ShaderStages {
        vertex: vec![0x0723_0203, 0x0001_0000, 0, 1, 0],
        fragment: vec![0x0723_0203, 0x0001_0000, 0, 1, 0],
    };

    assert!(graphics.new_shader(stages).is_err());
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_set_mode_rejects_empty_shaders() {
    let window = test_window();
    let mut graphics = VulkanGraphics::new(window, ShaderStages::default(), test_config()).unwrap();

    // The default stages carry no SPIR-V, so mode creation stops at the shader
    assert!(graphics.set_mode(800, 600).is_err());
    assert!(!graphics.is_created());

    // A failed mode leaves the backend usable
    graphics.unset_mode();
    graphics.wait_idle().unwrap();
}

// ============================================================================
// MODE AND FRAME CYCLE TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_mode_clear_present_cycle() {
    let window = test_window();
    let mut graphics = VulkanGraphics::new(window, minimal_shader_stages(), test_config()).unwrap();

    graphics.set_mode(800, 600).unwrap();
    assert!(graphics.is_created());

    // Three clear-only frames walk through both frame slots and wrap
    graphics.present().unwrap();
    graphics.present().unwrap();
    graphics.present().unwrap();

    // Resizing while created rebuilds the swapchain, then frames keep flowing
    graphics.set_viewport_size(640, 480).unwrap();
    graphics.present().unwrap();

    graphics.wait_idle().unwrap();
    graphics.unset_mode();
    assert!(!graphics.is_created());

    // A new mode can be set after teardown
    graphics.set_mode(800, 600).unwrap();
    assert!(graphics.is_created());
    graphics.present().unwrap();
    graphics.wait_idle().unwrap();
    graphics.unset_mode();
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_quad_draw_cycle() {
    let window = test_window();
    let mut graphics = VulkanGraphics::new(window, minimal_shader_stages(), test_config()).unwrap();

    graphics.set_mode(800, 600).unwrap();

    // One quad: four vertices of vec2 position + vec2 texcoord
    let corners: [f32; 16] = [
        100.0, 100.0, 0.0, 0.0, //
        100.0, 200.0, 0.0, 1.0, //
        200.0, 100.0, 1.0, 0.0, //
        200.0, 200.0, 1.0, 1.0, //
    ];
    let data: Vec<u8> = corners.iter().flat_map(|v| v.to_le_bytes()).collect();

    let vertex_buffer = graphics
        .new_buffer(BufferDesc {
            size: data.len() as u64,
            usage: BufferUsage::Vertex,
        })
        .unwrap();
    vertex_buffer.update(0, &data).unwrap();

    let attributes = test_vertex_layout();
    let mut bindings = BufferBindings::new();
    bindings.set(0, vertex_buffer, 0);

    graphics.draw_quads(0, 1, &attributes, &bindings, None).unwrap();

    // The first draw compiles the pipeline and allocates the descriptor sets
    let stats = graphics.stats();
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.triangles, 2);
    assert_eq!(stats.pipeline_cache_entries, 1);
    assert_eq!(stats.descriptor_cache_entries, 1);

    graphics.present().unwrap();
    assert_eq!(graphics.stats().draw_calls, 0);

    // The same configuration on the next frame hits both caches
    graphics.draw_quads(0, 1, &attributes, &bindings, None).unwrap();
    let stats = graphics.stats();
    assert_eq!(stats.pipeline_cache_entries, 1);
    assert_eq!(stats.descriptor_cache_entries, 1);

    graphics.present().unwrap();

    // Swapchain recreation drops both caches; the next draw rebuilds them
    graphics.set_viewport_size(640, 480).unwrap();
    let stats = graphics.stats();
    assert_eq!(stats.pipeline_cache_entries, 0);
    assert_eq!(stats.descriptor_cache_entries, 0);

    graphics.draw_quads(0, 1, &attributes, &bindings, None).unwrap();
    let stats = graphics.stats();
    assert_eq!(stats.pipeline_cache_entries, 1);
    assert_eq!(stats.descriptor_cache_entries, 1);

    graphics.present().unwrap();
    graphics.wait_idle().unwrap();
    graphics.unset_mode();
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_indexed_draw_cycle() {
    let window = test_window();
    let mut graphics = VulkanGraphics::new(window, minimal_shader_stages(), test_config()).unwrap();

    graphics.set_mode(800, 600).unwrap();

    let corners: [f32; 16] = [
        100.0, 100.0, 0.0, 0.0, //
        100.0, 200.0, 0.0, 1.0, //
        200.0, 100.0, 1.0, 0.0, //
        200.0, 200.0, 1.0, 1.0, //
    ];
    let vertex_data: Vec<u8> = corners.iter().flat_map(|v| v.to_le_bytes()).collect();
    let vertex_buffer = graphics
        .new_buffer(BufferDesc {
            size: vertex_data.len() as u64,
            usage: BufferUsage::Vertex,
        })
        .unwrap();
    vertex_buffer.update(0, &vertex_data).unwrap();

    let indices: [u16; 6] = [0, 1, 2, 2, 1, 3];
    let index_data: Vec<u8> = indices.iter().flat_map(|i| i.to_le_bytes()).collect();
    let index_buffer = graphics
        .new_buffer(BufferDesc {
            size: index_data.len() as u64,
            usage: BufferUsage::Index,
        })
        .unwrap();
    index_buffer.update(0, &index_data).unwrap();

    let attributes = test_vertex_layout();
    let mut bindings = BufferBindings::new();
    bindings.set(0, vertex_buffer, 0);

    let cmd = DrawIndexedCommand::new(&attributes, &bindings, &*index_buffer, IndexType::Uint16, 6);
    graphics.draw(&cmd).unwrap();

    let stats = graphics.stats();
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.triangles, 2);

    graphics.present().unwrap();
    graphics.wait_idle().unwrap();
    graphics.unset_mode();
}

// ============================================================================
// DRAW STATE TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_draw_without_mode_errors() {
    let window = test_window();
    let mut graphics = VulkanGraphics::new(window, ShaderStages::default(), test_config()).unwrap();

    let attributes = VertexAttributes::new();
    let buffers = BufferBindings::default();
    assert!(graphics.draw_quads(0, 1, &attributes, &buffers, None).is_err());
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_present_without_mode_errors() {
    let window = test_window();
    let mut graphics = VulkanGraphics::new(window, ShaderStages::default(), test_config()).unwrap();

    assert!(graphics.present().is_err());
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_set_viewport_size_without_mode() {
    let window = test_window();
    let mut graphics = VulkanGraphics::new(window, ShaderStages::default(), test_config()).unwrap();

    // Without a mode this only records the size for the next set_mode
    graphics.set_viewport_size(1024, 768).unwrap();
    graphics.set_viewport_size(1920, 1080).unwrap();
}

// ============================================================================
// QUERY TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_supports_sampled_rgba8() {
    let window = test_window();
    let graphics = VulkanGraphics::new(window, ShaderStages::default(), test_config()).unwrap();

    assert!(graphics.supports_pixel_format(
        PixelFormat::RGBA8_UNORM,
        PixelFormatUsage::SAMPLE | PixelFormatUsage::LINEAR,
    ));
    assert!(!graphics.supports_pixel_format(PixelFormat::UNKNOWN, PixelFormatUsage::SAMPLE));
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_stats_start_empty() {
    let window = test_window();
    let graphics = VulkanGraphics::new(window, ShaderStages::default(), test_config()).unwrap();

    let stats = graphics.stats();
    assert_eq!(stats.draw_calls, 0);
    assert_eq!(stats.triangles, 0);
    assert_eq!(stats.pipeline_cache_entries, 0);
    assert_eq!(stats.descriptor_cache_entries, 0);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_wait_idle() {
    let window = test_window();
    let graphics = VulkanGraphics::new(window, ShaderStages::default(), test_config()).unwrap();

    graphics.wait_idle().unwrap();
}
