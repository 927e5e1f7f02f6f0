/// VulkanGraphics - Vulkan implementation of the Graphics trait
///
/// Construction brings up the device-level state (instance, surface,
/// physical device selection, logical device, allocator); `set_mode`
/// builds the presentable state on top of it (swapchain, render pass,
/// per-frame buffers and sync) and starts recording the first frame.
/// Draws record into the acquired image's command buffer until `present`
/// submits the frame and rotates to the next slot.

use std::ffi::{c_char, CStr, CString};
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};

use ash::vk;
use ash::vk::Handle;
use glam::{Mat4, Vec4};
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::window::Window;

use ember_2d_engine::ember2d::graphics::{
    fill_quad_indices, quad_index_count, Buffer, BufferBindings, BufferDesc, BufferUsage,
    DrawIndexedCommand, Graphics, GraphicsCapabilities, GraphicsConfig, GraphicsStats,
    PixelFormat, PixelFormatUsage, RendererInfo, Shader, ShaderStages, StreamBuffer, Texture,
    VertexAttributes, MAX_VERTEX_BUFFERS,
};
use ember_2d_engine::ember2d::{Error, Result};
use ember_2d_engine::{engine_debug, engine_err, engine_error, engine_info, engine_warn};

use crate::debug::{
    cleanup_debug_config, init_debug_config, vulkan_debug_callback, DebugConfig, DebugSeverity,
};
use crate::vulkan_batch::{quad_chunks, BatchedDrawBuffers};
use crate::vulkan_buffer::{VulkanBuffer, VulkanStreamBuffer};
use crate::vulkan_context::GpuContext;
use crate::vulkan_descriptor::{
    allocate_descriptor_sets, builtin_uniform_snapshot, create_descriptor_pool,
    create_descriptor_set_layout, write_descriptor_sets, DescriptorSetCache,
    DescriptorSetConfiguration, UniformBufferCache,
};
use crate::vulkan_device::{find_queue_families, pick_physical_device, query_swapchain_support};
use crate::vulkan_format::{api_version_string, index_type_to_vk, pixel_format_to_vk, vendor_name};
use crate::vulkan_frame::{next_frame_slot, FrameSync, MAX_FRAMES_IN_FLIGHT};
use crate::vulkan_pipeline::{build_vertex_format, create_graphics_pipeline, PipelineCache};
use crate::vulkan_shader::VulkanShader;
use crate::vulkan_texture::VulkanTexture;

const LOG_SOURCE: &str = "ember2d::vulkan";

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Vulkan rendering backend
pub struct VulkanGraphics {
    /// Keeps the loaded Vulkan library alive for the lifetime of the backend
    _entry: ash::Entry,
    instance: ash::Instance,
    surface_loader: ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
    ctx: Arc<GpuContext>,
    present_queue: vk::Queue,
    present_queue_family: u32,
    swapchain_loader: ash::khr::swapchain::Device,
    capabilities: GraphicsCapabilities,
    info: RendererInfo,
    config: GraphicsConfig,
    default_shader_stages: ShaderStages,

    // Presentable state, created by set_mode and torn down by unset_mode
    swapchain: vk::SwapchainKHR,
    swapchain_images: Vec<vk::Image>,
    swapchain_image_views: Vec<vk::ImageView>,
    swapchain_format: vk::Format,
    swapchain_extent: vk::Extent2D,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
    command_pool: vk::CommandPool,
    command_buffers: Vec<vk::CommandBuffer>,
    descriptor_set_layout: vk::DescriptorSetLayout,
    descriptor_pool: vk::DescriptorPool,
    default_shader: Option<VulkanShader>,
    default_texture: Option<VulkanTexture>,
    quad_index_buffer: Option<VulkanStreamBuffer>,
    batched_buffers: Vec<BatchedDrawBuffers>,
    pipeline_cache: PipelineCache,
    current_pipeline: vk::Pipeline,
    pipeline_layout: vk::PipelineLayout,
    descriptor_cache: DescriptorSetCache,
    uniform_cache: UniformBufferCache,
    frame_sync: FrameSync,
    current_frame: usize,
    image_index: u32,
    created: bool,

    // Draw state feeding the builtin uniform block
    width: u32,
    height: u32,
    transform: Mat4,
    projection: Mat4,
    draw_color: Vec4,

    frame_draw_calls: u32,
    frame_triangles: u32,
}

impl VulkanGraphics {
    /// Create the backend against a window
    ///
    /// Brings up the instance (with the validation messenger when
    /// requested), the surface, the highest-scoring physical device, the
    /// logical device with its queues, and the GPU allocator. The result
    /// has no presentable mode yet; call `set_mode` to create one.
    pub fn new(window: &Window, default_shader: ShaderStages, config: GraphicsConfig) -> Result<Self> {
        engine_info!(LOG_SOURCE, "Initializing Vulkan backend for '{}'", config.app_name);

        let entry = unsafe { ash::Entry::load() }.map_err(|e| {
            engine_error!(LOG_SOURCE, "Failed to load the Vulkan library: {}", e);
            Error::InitializationFailed(format!("Failed to load the Vulkan library: {}", e))
        })?;

        if config.enable_validation && !validation_layers_available(&entry)? {
            engine_error!(LOG_SOURCE, "validation layers requested, but not available");
            return Err(Error::InitializationFailed(
                "validation layers requested, but not available".to_string(),
            ));
        }

        let display_handle = window
            .display_handle()
            .map_err(|e| {
                engine_error!(LOG_SOURCE, "Failed to get display handle: {}", e);
                Error::InitializationFailed(format!("Failed to get display handle: {}", e))
            })?
            .as_raw();
        let window_handle = window
            .window_handle()
            .map_err(|e| {
                engine_error!(LOG_SOURCE, "Failed to get window handle: {}", e);
                Error::InitializationFailed(format!("Failed to get window handle: {}", e))
            })?
            .as_raw();

        let app_name = CString::new(config.app_name.as_str()).unwrap_or_default();
        let (major, minor, patch) = config.app_version;
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, major, minor, patch))
            .engine_name(c"Ember2D")
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_3);

        let mut extension_names = ash_window::enumerate_required_extensions(display_handle)
            .map_err(|e| {
                engine_error!(LOG_SOURCE, "Failed to enumerate required window extensions: {:?}", e);
                Error::InitializationFailed(format!(
                    "Failed to enumerate required window extensions: {:?}",
                    e
                ))
            })?
            .to_vec();
        if config.enable_validation {
            extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
        }

        let layer_names: Vec<*const c_char> = if config.enable_validation {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            Vec::new()
        };

        let instance_create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extension_names)
            .enabled_layer_names(&layer_names);

        let instance = unsafe { entry.create_instance(&instance_create_info, None) }.map_err(|e| {
            engine_error!(LOG_SOURCE, "couldn't create vulkan instance: {:?}", e);
            Error::InitializationFailed(format!("couldn't create vulkan instance: {:?}", e))
        })?;

        let (debug_utils_loader, debug_messenger) = if config.enable_validation {
            let debug_config = DebugConfig::default();
            let severity = match debug_config.severity {
                DebugSeverity::ErrorsOnly => vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
                DebugSeverity::ErrorsAndWarnings => {
                    vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                        | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                }
                DebugSeverity::All => {
                    vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                        | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                        | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                        | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                }
            };
            init_debug_config(debug_config);

            let loader = ash::ext::debug_utils::Instance::new(&entry, &instance);
            let messenger_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
                .message_severity(severity)
                .message_type(
                    vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                )
                .pfn_user_callback(Some(vulkan_debug_callback));
            let messenger = unsafe { loader.create_debug_utils_messenger(&messenger_info, None) }
                .map_err(|e| {
                    engine_error!(LOG_SOURCE, "Failed to create debug messenger: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create debug messenger: {:?}", e))
                })?;
            engine_debug!(LOG_SOURCE, "Vulkan validation messenger enabled");
            (Some(loader), Some(messenger))
        } else {
            (None, None)
        };

        let surface = unsafe {
            ash_window::create_surface(&entry, &instance, display_handle, window_handle, None)
        }
        .map_err(|e| {
            engine_error!(LOG_SOURCE, "Failed to create window surface: {:?}", e);
            Error::InitializationFailed(format!("Failed to create window surface: {:?}", e))
        })?;
        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

        let physical_device = pick_physical_device(&instance, &surface_loader, surface)?;
        let queue_families = find_queue_families(&instance, &surface_loader, physical_device, surface);
        let graphics_queue_family = queue_families.graphics_family.ok_or_else(|| {
            Error::InitializationFailed("failed to find a graphics queue family".to_string())
        })?;
        let present_queue_family = queue_families.present_family.ok_or_else(|| {
            Error::InitializationFailed("failed to find a present queue family".to_string())
        })?;

        let queue_priorities = [1.0f32];
        let mut unique_families = vec![graphics_queue_family];
        if present_queue_family != graphics_queue_family {
            unique_families.push(present_queue_family);
        }
        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        let device_extensions = [ash::khr::swapchain::NAME.as_ptr()];
        let features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(true);
        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&device_extensions)
            .enabled_features(&features);

        let device = unsafe { instance.create_device(physical_device, &device_create_info, None) }
            .map_err(|e| {
                engine_error!(LOG_SOURCE, "failed to create logical device: {:?}", e);
                Error::InitializationFailed(format!("failed to create logical device: {:?}", e))
            })?;

        let graphics_queue = unsafe { device.get_device_queue(graphics_queue_family, 0) };
        let present_queue = unsafe { device.get_device_queue(present_queue_family, 0) };

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .map_err(|e| {
            engine_error!(LOG_SOURCE, "Failed to create GPU allocator: {:?}", e);
            Error::InitializationFailed(format!("Failed to create GPU allocator: {:?}", e))
        })?;

        let upload_pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(graphics_queue_family);
        let upload_command_pool = unsafe { device.create_command_pool(&upload_pool_info, None) }
            .map_err(|e| {
                engine_error!(LOG_SOURCE, "Failed to create upload command pool: {:?}", e);
                Error::InitializationFailed(format!("Failed to create upload command pool: {:?}", e))
            })?;

        let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &device);

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let capabilities = GraphicsCapabilities {
            max_texture_size: properties.limits.max_image_dimension2_d,
            max_anisotropy: properties.limits.max_sampler_anisotropy,
            point_size_range: (
                properties.limits.point_size_range[0],
                properties.limits.point_size_range[1],
            ),
        };
        let device_name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();
        let info = RendererInfo {
            name: "Vulkan".to_string(),
            version: api_version_string(properties.api_version),
            vendor: vendor_name(properties.vendor_id).to_string(),
            device: device_name,
        };
        engine_info!(
            LOG_SOURCE,
            "Using device: {} ({}, Vulkan {})",
            info.device,
            info.vendor,
            info.version
        );

        let ctx = Arc::new(GpuContext::new(
            device,
            Arc::new(Mutex::new(allocator)),
            graphics_queue,
            graphics_queue_family,
            upload_command_pool,
            instance.clone(),
            debug_utils_loader,
            debug_messenger,
        ));

        Ok(Self {
            _entry: entry,
            instance,
            surface_loader,
            surface,
            physical_device,
            ctx,
            present_queue,
            present_queue_family,
            swapchain_loader,
            capabilities,
            info,
            config,
            default_shader_stages: default_shader,
            swapchain: vk::SwapchainKHR::null(),
            swapchain_images: Vec::new(),
            swapchain_image_views: Vec::new(),
            swapchain_format: vk::Format::UNDEFINED,
            swapchain_extent: vk::Extent2D { width: 0, height: 0 },
            render_pass: vk::RenderPass::null(),
            framebuffers: Vec::new(),
            command_pool: vk::CommandPool::null(),
            command_buffers: Vec::new(),
            descriptor_set_layout: vk::DescriptorSetLayout::null(),
            descriptor_pool: vk::DescriptorPool::null(),
            default_shader: None,
            default_texture: None,
            quad_index_buffer: None,
            batched_buffers: Vec::new(),
            pipeline_cache: PipelineCache::new(),
            current_pipeline: vk::Pipeline::null(),
            pipeline_layout: vk::PipelineLayout::null(),
            descriptor_cache: DescriptorSetCache::new(),
            uniform_cache: UniformBufferCache::new(),
            frame_sync: FrameSync {
                image_available: Vec::new(),
                render_finished: Vec::new(),
                in_flight: Vec::new(),
                images_in_flight: Vec::new(),
            },
            current_frame: 0,
            image_index: 0,
            created: false,
            width: 0,
            height: 0,
            transform: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            draw_color: Vec4::ONE,
            frame_draw_calls: 0,
            frame_triangles: 0,
        })
    }

    fn create_swapchain(&mut self) -> Result<()> {
        let support =
            query_swapchain_support(&self.surface_loader, self.physical_device, self.surface)?;
        let surface_format = choose_surface_format(&support.formats);
        let present_mode = choose_present_mode(&support.present_modes, self.config.vsync);
        let extent = choose_extent(&support.capabilities, self.width, self.height);
        let image_count = choose_image_count(&support.capabilities);

        engine_debug!(
            LOG_SOURCE,
            "Creating swapchain: {}x{}, {:?}, {:?}, {} images",
            extent.width,
            extent.height,
            surface_format.format,
            present_mode,
            image_count
        );

        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let family_indices = [self.ctx.graphics_queue_family, self.present_queue_family];
        if self.ctx.graphics_queue_family != self.present_queue_family {
            create_info = create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices);
        } else {
            create_info = create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE);
        }

        unsafe {
            self.swapchain = self
                .swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(|e| {
                    engine_error!(LOG_SOURCE, "failed to create swap chain: {:?}", e);
                    Error::InitializationFailed(format!("failed to create swap chain: {:?}", e))
                })?;
            self.swapchain_images = self
                .swapchain_loader
                .get_swapchain_images(self.swapchain)
                .map_err(|e| {
                    engine_error!(LOG_SOURCE, "Failed to get swapchain images: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get swapchain images: {:?}", e))
                })?;
        }
        self.swapchain_format = surface_format.format;
        self.swapchain_extent = extent;
        Ok(())
    }

    fn create_image_views(&mut self) -> Result<()> {
        let subresource_range = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        };

        self.swapchain_image_views = self
            .swapchain_images
            .iter()
            .map(|&image| {
                let create_info = vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(self.swapchain_format)
                    .components(vk::ComponentMapping {
                        r: vk::ComponentSwizzle::IDENTITY,
                        g: vk::ComponentSwizzle::IDENTITY,
                        b: vk::ComponentSwizzle::IDENTITY,
                        a: vk::ComponentSwizzle::IDENTITY,
                    })
                    .subresource_range(subresource_range);

                unsafe { self.ctx.device.create_image_view(&create_info, None) }.map_err(|e| {
                    engine_error!(LOG_SOURCE, "failed to create image views: {:?}", e);
                    Error::InitializationFailed(format!("failed to create image views: {:?}", e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(())
    }

    fn create_render_pass(&mut self) -> Result<()> {
        let attachments = [vk::AttachmentDescription::default()
            .format(self.swapchain_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)];

        let color_attachment_refs = [vk::AttachmentReference::default()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];

        let subpasses = [vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_attachment_refs)];

        let dependencies = [vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)];

        let render_pass_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        self.render_pass = unsafe { self.ctx.device.create_render_pass(&render_pass_info, None) }
            .map_err(|e| {
                engine_error!(LOG_SOURCE, "failed to create render pass: {:?}", e);
                Error::InitializationFailed(format!("failed to create render pass: {:?}", e))
            })?;
        Ok(())
    }

    fn create_framebuffers(&mut self) -> Result<()> {
        self.framebuffers = self
            .swapchain_image_views
            .iter()
            .map(|&view| {
                let attachments = [view];
                let create_info = vk::FramebufferCreateInfo::default()
                    .render_pass(self.render_pass)
                    .attachments(&attachments)
                    .width(self.swapchain_extent.width)
                    .height(self.swapchain_extent.height)
                    .layers(1);

                unsafe { self.ctx.device.create_framebuffer(&create_info, None) }.map_err(|e| {
                    engine_error!(LOG_SOURCE, "failed to create framebuffers: {:?}", e);
                    Error::InitializationFailed(format!("failed to create framebuffers: {:?}", e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(())
    }

    fn create_command_pool(&mut self) -> Result<()> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(self.ctx.graphics_queue_family);

        self.command_pool = unsafe { self.ctx.device.create_command_pool(&create_info, None) }
            .map_err(|e| {
                engine_error!(LOG_SOURCE, "failed to create command pool: {:?}", e);
                Error::InitializationFailed(format!("failed to create command pool: {:?}", e))
            })?;
        Ok(())
    }

    fn create_command_buffers(&mut self) -> Result<()> {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(self.framebuffers.len() as u32);

        self.command_buffers = unsafe { self.ctx.device.allocate_command_buffers(&allocate_info) }
            .map_err(|e| {
                engine_error!(LOG_SOURCE, "failed to allocate command buffers: {:?}", e);
                Error::InitializationFailed(format!("failed to allocate command buffers: {:?}", e))
            })?;
        Ok(())
    }

    /// Fill the shared quad index buffer covering the full 16-bit vertex range
    fn create_quad_index_buffer(&mut self) -> Result<()> {
        if self.quad_index_buffer.is_some() {
            return Ok(());
        }

        let vertex_count = u16::MAX as usize;
        let size = quad_index_count(vertex_count) * std::mem::size_of::<u16>();
        let mut buffer = VulkanStreamBuffer::new(Arc::clone(&self.ctx), BufferUsage::Index, size)?;

        let mapped = buffer.map(size)?;
        let indices: &mut [u16] = bytemuck::cast_slice_mut(&mut mapped[..size]);
        fill_quad_indices(0, vertex_count, indices);
        buffer.unmap(size);

        self.quad_index_buffer = Some(buffer);
        Ok(())
    }

    /// Wait for the frame slot's fence, acquire an image, and begin the
    /// render pass on its command buffer
    fn start_recording(&mut self) -> Result<()> {
        let fence = self.frame_sync.in_flight[self.current_frame];
        unsafe { self.ctx.device.wait_for_fences(&[fence], true, u64::MAX) }
            .map_err(|e| engine_err!(LOG_SOURCE, "Failed to wait for in-flight fence: {:?}", e))?;

        loop {
            let acquired = unsafe {
                self.swapchain_loader.acquire_next_image(
                    self.swapchain,
                    u64::MAX,
                    self.frame_sync.image_available[self.current_frame],
                    vk::Fence::null(),
                )
            };
            match acquired {
                Ok((index, _suboptimal)) => {
                    self.image_index = index;
                    break;
                }
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                    self.recreate_swapchain()?;
                    continue;
                }
                Err(e) => {
                    return Err(engine_err!(
                        LOG_SOURCE,
                        "failed to acquire swap chain image: {:?}",
                        e
                    ));
                }
            }
        }

        let command_buffer = self.command_buffers[self.image_index as usize];
        unsafe {
            let begin_info = vk::CommandBufferBeginInfo::default();
            self.ctx
                .device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(|e| {
                    engine_err!(LOG_SOURCE, "failed to begin recording command buffer: {:?}", e)
                })?;

            let clear_values = [vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: [0.0, 0.0, 0.0, 1.0],
                },
            }];
            let render_pass_begin = vk::RenderPassBeginInfo::default()
                .render_pass(self.render_pass)
                .framebuffer(self.framebuffers[self.image_index as usize])
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent: self.swapchain_extent,
                })
                .clear_values(&clear_values);

            self.ctx.device.cmd_begin_render_pass(
                command_buffer,
                &render_pass_begin,
                vk::SubpassContents::INLINE,
            );
        }

        self.current_pipeline = vk::Pipeline::null();
        Ok(())
    }

    fn end_recording(&mut self) -> Result<()> {
        let command_buffer = self.command_buffers[self.image_index as usize];
        unsafe {
            self.ctx.device.cmd_end_render_pass(command_buffer);
            self.ctx
                .device
                .end_command_buffer(command_buffer)
                .map_err(|e| engine_err!(LOG_SOURCE, "failed to record command buffer: {:?}", e))?;
        }
        Ok(())
    }

    /// Rebuild everything that depends on the swapchain
    ///
    /// Callers follow up with `start_recording`; a recording in progress
    /// when this runs is abandoned with the freed command buffers.
    fn recreate_swapchain(&mut self) -> Result<()> {
        engine_debug!(LOG_SOURCE, "Recreating swapchain ({}x{})", self.width, self.height);

        unsafe { self.ctx.device.device_wait_idle() }
            .map_err(|e| engine_err!(LOG_SOURCE, "Failed to wait for device idle: {:?}", e))?;

        self.cleanup_swapchain();
        self.create_swapchain()?;
        self.create_image_views()?;
        self.create_render_pass()?;
        self.create_framebuffers()?;
        self.descriptor_pool = create_descriptor_pool(&self.ctx.device)?;
        self.create_command_buffers()?;
        self.frame_sync.resize_images_in_flight(self.swapchain_images.len());
        Ok(())
    }

    fn cleanup_swapchain(&mut self) {
        unsafe {
            if self.descriptor_pool != vk::DescriptorPool::null() {
                // Frees every set the descriptor cache handed out
                self.ctx.device.destroy_descriptor_pool(self.descriptor_pool, None);
                self.descriptor_pool = vk::DescriptorPool::null();
            }
            for framebuffer in self.framebuffers.drain(..) {
                self.ctx.device.destroy_framebuffer(framebuffer, None);
            }
            if !self.command_buffers.is_empty() {
                self.ctx
                    .device
                    .free_command_buffers(self.command_pool, &self.command_buffers);
                self.command_buffers.clear();
            }
            self.pipeline_cache.destroy(&self.ctx.device);
            self.current_pipeline = vk::Pipeline::null();
            self.pipeline_layout = vk::PipelineLayout::null();
            if self.render_pass != vk::RenderPass::null() {
                self.ctx.device.destroy_render_pass(self.render_pass, None);
                self.render_pass = vk::RenderPass::null();
            }
            for view in self.swapchain_image_views.drain(..) {
                self.ctx.device.destroy_image_view(view, None);
            }
            if self.swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
                self.swapchain = vk::SwapchainKHR::null();
            }
        }
        self.swapchain_images.clear();
        self.uniform_cache.clear();
        self.descriptor_cache.clear();
    }

    /// Tear down everything `set_mode` created
    ///
    /// Safe to call on partial state after a failed `set_mode`; the
    /// device-level state survives for another `set_mode`.
    fn teardown_mode(&mut self) {
        self.created = false;

        if let Err(e) = unsafe { self.ctx.device.device_wait_idle() } {
            engine_warn!(LOG_SOURCE, "Failed to wait for device idle: {:?}", e);
        }

        self.cleanup_swapchain();
        self.batched_buffers.clear();
        self.quad_index_buffer = None;
        self.default_texture = None;
        self.default_shader = None;
        self.frame_sync.destroy(&self.ctx.device);

        unsafe {
            if self.descriptor_set_layout != vk::DescriptorSetLayout::null() {
                self.ctx
                    .device
                    .destroy_descriptor_set_layout(self.descriptor_set_layout, None);
                self.descriptor_set_layout = vk::DescriptorSetLayout::null();
            }
            if self.command_pool != vk::CommandPool::null() {
                self.ctx.device.destroy_command_pool(self.command_pool, None);
                self.command_pool = vk::CommandPool::null();
            }
        }
    }

    /// Bind the pipeline, descriptor set, and vertex buffers for a draw
    fn prepare_draw(
        &mut self,
        attributes: &VertexAttributes,
        buffers: &BufferBindings,
        texture: Option<&dyn Texture>,
    ) -> Result<()> {
        let command_buffer = self.command_buffers[self.image_index as usize];
        let (config, needs_constant_color) = build_vertex_format(attributes)?;

        // The synthesized constant color binding sits last in the derived config
        let constant_color_binding = if needs_constant_color {
            config.binding_descriptions.last().map(|b| b.binding)
        } else {
            None
        };

        let pipeline = match self.pipeline_cache.find(&config) {
            Some(pipeline) => pipeline,
            None => {
                let shader = self
                    .default_shader
                    .as_ref()
                    .ok_or_else(|| Error::BackendError("no graphics mode is set".to_string()))?;
                let (pipeline, layout) = create_graphics_pipeline(
                    &self.ctx.device,
                    &config,
                    shader.vertex_module,
                    shader.fragment_module,
                    self.swapchain_extent,
                    self.render_pass,
                    self.descriptor_set_layout,
                )?;
                self.pipeline_cache.insert(config, pipeline);
                self.pipeline_cache.add_layout(layout);
                self.pipeline_layout = layout;
                pipeline
            }
        };

        if pipeline != self.current_pipeline {
            unsafe {
                self.ctx.device.cmd_bind_pipeline(
                    command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    pipeline,
                );
            }
            self.current_pipeline = pipeline;
        }

        let uniform_data = builtin_uniform_snapshot(
            self.transform,
            self.projection,
            self.swapchain_extent,
            1.0,
            1.0,
            self.draw_color,
        );
        let uniform_buffer = self.uniform_cache.buffer_for(&self.ctx, &uniform_data)?;

        let (view_handle, sampler_handle) = match texture {
            Some(texture) => (texture.native_view_handle(), texture.native_sampler_handle()),
            None => {
                let default = self
                    .default_texture
                    .as_ref()
                    .ok_or_else(|| Error::BackendError("no graphics mode is set".to_string()))?;
                (default.native_view_handle(), default.native_sampler_handle())
            }
        };

        let descriptor_config = DescriptorSetConfiguration {
            image_view: vk::ImageView::from_raw(view_handle),
            sampler: vk::Sampler::from_raw(sampler_handle),
            uniform_buffer,
        };

        let descriptor_set = match self.descriptor_cache.find(&descriptor_config, self.current_frame)
        {
            Some(set) => set,
            None => {
                let sets = allocate_descriptor_sets(
                    &self.ctx.device,
                    self.descriptor_pool,
                    self.descriptor_set_layout,
                )?;
                write_descriptor_sets(&self.ctx.device, &sets, &descriptor_config);
                let set = sets[self.current_frame];
                self.descriptor_cache.insert(descriptor_config, sets);
                set
            }
        };

        unsafe {
            self.ctx.device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline_layout,
                0,
                &[descriptor_set],
                &[],
            );

            for i in 0..MAX_VERTEX_BUFFERS as u32 {
                if !buffers.is_used(i) {
                    continue;
                }
                if let Some(binding) = &buffers.info[i as usize] {
                    self.ctx.device.cmd_bind_vertex_buffers(
                        command_buffer,
                        i,
                        &[vk::Buffer::from_raw(binding.buffer.native_handle())],
                        &[binding.offset],
                    );
                }
            }

            if let Some(binding) = constant_color_binding {
                let constant_color =
                    self.batched_buffers[self.current_frame].constant_color.native_handle();
                self.ctx.device.cmd_bind_vertex_buffers(
                    command_buffer,
                    binding,
                    &[vk::Buffer::from_raw(constant_color)],
                    &[0],
                );
            }
        }

        Ok(())
    }
}

impl Graphics for VulkanGraphics {
    fn set_mode(&mut self, width: u32, height: u32) -> Result<()> {
        if self.created {
            self.teardown_mode();
        }
        engine_info!(LOG_SOURCE, "Creating graphics mode ({}x{})", width, height);

        self.width = width;
        self.height = height;
        self.projection = device_projection(width, height);
        self.frame_draw_calls = 0;
        self.frame_triangles = 0;

        self.create_swapchain()?;
        self.create_image_views()?;
        self.create_render_pass()?;
        self.default_shader = Some(VulkanShader::new(
            Arc::clone(&self.ctx),
            self.default_shader_stages.clone(),
        )?);
        self.descriptor_set_layout = create_descriptor_set_layout(&self.ctx.device)?;
        self.create_framebuffers()?;
        self.create_command_pool()?;
        self.create_command_buffers()?;
        self.default_texture = Some(VulkanTexture::default_white(Arc::clone(&self.ctx))?);
        self.create_quad_index_buffer()?;
        self.descriptor_pool = create_descriptor_pool(&self.ctx.device)?;
        self.frame_sync = FrameSync::new(&self.ctx.device, self.swapchain_images.len())?;

        self.current_frame = 0;
        self.start_recording()?;
        self.created = true;

        self.batched_buffers.clear();
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            self.batched_buffers.push(BatchedDrawBuffers::new(&self.ctx)?);
        }
        self.batched_buffers[self.current_frame].next_frame();

        engine_info!(LOG_SOURCE, "Graphics mode ready ({}x{})", width, height);
        Ok(())
    }

    fn unset_mode(&mut self) {
        if !self.created {
            return;
        }
        engine_info!(LOG_SOURCE, "Tearing down graphics mode");
        self.teardown_mode();
    }

    fn is_created(&self) -> bool {
        self.created
    }

    fn new_buffer(&mut self, desc: BufferDesc) -> Result<Arc<dyn Buffer>> {
        Ok(Arc::new(VulkanBuffer::new(Arc::clone(&self.ctx), desc)?))
    }

    fn new_stream_buffer(&mut self, usage: BufferUsage, size: usize) -> Result<Box<dyn StreamBuffer>> {
        Ok(Box::new(VulkanStreamBuffer::new(
            Arc::clone(&self.ctx),
            usage,
            size,
        )?))
    }

    fn new_shader(&mut self, stages: ShaderStages) -> Result<Arc<dyn Shader>> {
        Ok(Arc::new(VulkanShader::new(Arc::clone(&self.ctx), stages)?))
    }

    fn draw(&mut self, cmd: &DrawIndexedCommand) -> Result<()> {
        if !self.created {
            return Err(engine_err!(LOG_SOURCE, "draw requires an active graphics mode"));
        }
        self.prepare_draw(cmd.attributes, cmd.buffers, cmd.texture)?;

        let command_buffer = self.command_buffers[self.image_index as usize];
        unsafe {
            self.ctx.device.cmd_bind_index_buffer(
                command_buffer,
                vk::Buffer::from_raw(cmd.index_buffer.native_handle()),
                cmd.index_buffer_offset,
                index_type_to_vk(cmd.index_type),
            );
            self.ctx.device.cmd_draw_indexed(
                command_buffer,
                cmd.index_count,
                cmd.instance_count,
                0,
                0,
                0,
            );
        }

        self.frame_draw_calls += 1;
        self.frame_triangles += cmd.index_count / 3 * cmd.instance_count;
        Ok(())
    }

    fn draw_quads(
        &mut self,
        start: u32,
        count: u32,
        attributes: &VertexAttributes,
        buffers: &BufferBindings,
        texture: Option<&dyn Texture>,
    ) -> Result<()> {
        if !self.created {
            return Err(engine_err!(LOG_SOURCE, "draw requires an active graphics mode"));
        }
        self.prepare_draw(attributes, buffers, texture)?;

        let quad_index_buffer = match &self.quad_index_buffer {
            Some(buffer) => vk::Buffer::from_raw(buffer.native_handle()),
            None => return Err(engine_err!(LOG_SOURCE, "quad index buffer missing")),
        };

        let command_buffer = self.command_buffers[self.image_index as usize];
        unsafe {
            self.ctx.device.cmd_bind_index_buffer(
                command_buffer,
                quad_index_buffer,
                0,
                vk::IndexType::UINT16,
            );
        }

        for (base_vertex, quad_count) in quad_chunks(start, count) {
            unsafe {
                self.ctx.device.cmd_draw_indexed(
                    command_buffer,
                    quad_count * 6,
                    1,
                    0,
                    base_vertex as i32,
                    0,
                );
            }
            self.frame_draw_calls += 1;
            self.frame_triangles += quad_count * 2;
        }
        Ok(())
    }

    fn set_viewport_size(&mut self, width: u32, height: u32) -> Result<()> {
        self.width = width;
        self.height = height;
        self.projection = device_projection(width, height);

        if !self.created {
            return Ok(());
        }
        self.recreate_swapchain()?;
        self.start_recording()
    }

    fn present(&mut self) -> Result<()> {
        if !self.created {
            return Err(engine_err!(LOG_SOURCE, "present requires an active graphics mode"));
        }
        self.end_recording()?;

        let needs_recreate = unsafe {
            let image_in_flight = self.frame_sync.images_in_flight[self.image_index as usize];
            if image_in_flight != vk::Fence::null() {
                self.ctx
                    .device
                    .wait_for_fences(&[image_in_flight], true, u64::MAX)
                    .map_err(|e| {
                        engine_err!(LOG_SOURCE, "Failed to wait for image fence: {:?}", e)
                    })?;
            }
            self.frame_sync.images_in_flight[self.image_index as usize] =
                self.frame_sync.in_flight[self.current_frame];

            let wait_semaphores = [self.frame_sync.image_available[self.current_frame]];
            let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
            let command_buffers = [self.command_buffers[self.image_index as usize]];
            let signal_semaphores = [self.frame_sync.render_finished[self.current_frame]];
            let submit_info = vk::SubmitInfo::default()
                .wait_semaphores(&wait_semaphores)
                .wait_dst_stage_mask(&wait_stages)
                .command_buffers(&command_buffers)
                .signal_semaphores(&signal_semaphores);

            self.ctx
                .device
                .reset_fences(&[self.frame_sync.in_flight[self.current_frame]])
                .map_err(|e| engine_err!(LOG_SOURCE, "Failed to reset in-flight fence: {:?}", e))?;
            self.ctx
                .device
                .queue_submit(
                    self.ctx.graphics_queue,
                    &[submit_info],
                    self.frame_sync.in_flight[self.current_frame],
                )
                .map_err(|e| {
                    engine_err!(LOG_SOURCE, "failed to submit draw command buffer: {:?}", e)
                })?;

            let swapchains = [self.swapchain];
            let image_indices = [self.image_index];
            let present_info = vk::PresentInfoKHR::default()
                .wait_semaphores(&signal_semaphores)
                .swapchains(&swapchains)
                .image_indices(&image_indices);

            match self.swapchain_loader.queue_present(self.present_queue, &present_info) {
                Ok(suboptimal) => suboptimal,
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => true,
                Err(e) => {
                    return Err(engine_err!(
                        LOG_SOURCE,
                        "failed to present swap chain image: {:?}",
                        e
                    ));
                }
            }
        };

        self.frame_draw_calls = 0;
        self.frame_triangles = 0;

        // Advance the slot before any recreation so the acquire below waits
        // on the same slot the submit just used
        self.current_frame = next_frame_slot(self.current_frame);
        self.batched_buffers[self.current_frame].next_frame();

        if needs_recreate {
            self.recreate_swapchain()?;
        }
        self.start_recording()
    }

    fn renderer_info(&self) -> Result<RendererInfo> {
        Ok(self.info.clone())
    }

    fn set_color(&mut self, color: Vec4) {
        self.draw_color = color;
    }

    fn supports_pixel_format(&self, format: PixelFormat, usage: PixelFormatUsage) -> bool {
        let mapping = match pixel_format_to_vk(format) {
            Ok(mapping) => mapping,
            Err(_) => return false,
        };

        let properties = unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, mapping.format)
        };
        properties
            .optimal_tiling_features
            .contains(required_format_features(usage))
    }

    fn capabilities(&self) -> GraphicsCapabilities {
        self.capabilities
    }

    fn stats(&self) -> GraphicsStats {
        GraphicsStats {
            draw_calls: self.frame_draw_calls,
            triangles: self.frame_triangles,
            pipeline_cache_entries: self.pipeline_cache.len() as u32,
            descriptor_cache_entries: self.descriptor_cache.len() as u32,
        }
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe { self.ctx.device.device_wait_idle() }
            .map_err(|e| engine_err!(LOG_SOURCE, "Failed to wait for device idle: {:?}", e))
    }
}

impl Drop for VulkanGraphics {
    fn drop(&mut self) {
        engine_info!(LOG_SOURCE, "Shutting down Vulkan backend");

        if let Err(e) = unsafe { self.ctx.device.device_wait_idle() } {
            engine_warn!(LOG_SOURCE, "Failed to wait for device idle during shutdown: {:?}", e);
        }
        self.teardown_mode();

        match Arc::get_mut(&mut self.ctx) {
            Some(ctx) => unsafe {
                let upload_pool = *ctx.upload_command_pool.lock().unwrap();
                ctx.device.destroy_command_pool(upload_pool, None);
                ManuallyDrop::drop(&mut ctx.allocator);
                ctx.device.destroy_device(None);
                if let (Some(loader), Some(messenger)) =
                    (ctx.debug_utils_loader.as_ref(), ctx.debug_messenger)
                {
                    loader.destroy_debug_utils_messenger(messenger, None);
                }
                self.surface_loader.destroy_surface(self.surface, None);
                self.instance.destroy_instance(None);
            },
            None => {
                // Destroying the device while user buffers or textures still
                // reference it would be worse than the leak
                engine_warn!(
                    LOG_SOURCE,
                    "GPU resources still referenced at shutdown; leaking the Vulkan device"
                );
            }
        }

        cleanup_debug_config();
    }
}

/// Orthographic projection with the origin at the top-left
///
/// Vulkan clip space points Y down, so mapping the drawable height to the
/// far end of the Y range puts pixel (0, 0) at the top-left corner.
pub(crate) fn device_projection(width: u32, height: u32) -> Mat4 {
    Mat4::orthographic_rh(0.0, width as f32, 0.0, height as f32, -1.0, 1.0)
}

/// Prefer B8G8R8A8_SRGB with a non-linear sRGB color space
pub(crate) fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .unwrap_or_else(|| formats.first().copied().unwrap_or_default())
}

/// MAILBOX when available and vsync is off, FIFO otherwise
pub(crate) fn choose_present_mode(modes: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if vsync {
        return vk::PresentModeKHR::FIFO;
    }
    if modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// The surface's fixed extent, or the drawable size clamped to its limits
pub(crate) fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One image above the minimum, clamped to the maximum when one exists
pub(crate) fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 && count > capabilities.max_image_count {
        count = capabilities.max_image_count;
    }
    count
}

/// Format features a usage set requires on the optimal tiling path
pub(crate) fn required_format_features(usage: PixelFormatUsage) -> vk::FormatFeatureFlags {
    let mut required = vk::FormatFeatureFlags::empty();
    if usage.contains(PixelFormatUsage::SAMPLE) {
        required |= vk::FormatFeatureFlags::SAMPLED_IMAGE;
    }
    if usage.contains(PixelFormatUsage::LINEAR) {
        required |= vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR;
    }
    if usage.contains(PixelFormatUsage::RENDER_TARGET) {
        required |= vk::FormatFeatureFlags::COLOR_ATTACHMENT;
    }
    if usage.contains(PixelFormatUsage::BLEND) {
        required |= vk::FormatFeatureFlags::COLOR_ATTACHMENT_BLEND;
    }
    if usage.contains(PixelFormatUsage::MSAA) {
        required |= vk::FormatFeatureFlags::COLOR_ATTACHMENT;
    }
    if usage.contains(PixelFormatUsage::COMPUTE_WRITE) {
        required |= vk::FormatFeatureFlags::STORAGE_IMAGE;
    }
    required
}

fn validation_layers_available(entry: &ash::Entry) -> Result<bool> {
    let layers = unsafe { entry.enumerate_instance_layer_properties() }
        .map_err(|e| engine_err!(LOG_SOURCE, "Failed to enumerate instance layers: {:?}", e))?;
    Ok(layers.iter().any(|layer| {
        let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
        name == VALIDATION_LAYER
    }))
}

#[cfg(test)]
#[path = "vulkan_tests.rs"]
mod tests;
