/// VulkanTexture - Vulkan implementation of the Texture trait
///
/// The backend itself only instantiates this for its 1x1 opaque white
/// default texture; draws that pass no texture sample it so the shader's
/// texture modulation is a no-op. Externally created textures reach the
/// draw path through the trait's native view/sampler handles.

use ash::vk;
use ash::vk::Handle;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

use ember_2d_engine::ember2d::{Error, Result};
use ember_2d_engine::ember2d::graphics::{PixelFormat, Texture};
use ember_2d_engine::{engine_err, engine_error};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::pixel_format_to_vk;

/// Texture backed by a sampled Vulkan image
pub struct VulkanTexture {
    /// Shared GPU context (device, allocator, queue, upload pool)
    ctx: Arc<GpuContext>,
    /// Image holding the pixel data
    image: vk::Image,
    /// Vulkan image view (carries the format's component swizzle)
    view: vk::ImageView,
    /// Sampler owned by the texture
    sampler: vk::Sampler,
    /// Backing allocation, taken out in Drop
    allocation: Option<Allocation>,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl VulkanTexture {
    /// Create the 1x1 opaque white default texture
    ///
    /// The image is transitioned to GENERAL and cleared to white through a
    /// single-time command buffer, then stays in GENERAL for sampling. All
    /// descriptor image writes use the GENERAL layout.
    pub fn default_white(ctx: Arc<GpuContext>) -> Result<Self> {
        unsafe {
            let format = PixelFormat::RGBA8_UNORM;
            let mapping = pixel_format_to_vk(format)?;

            let image_create_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(mapping.format)
                .extent(vk::Extent3D {
                    width: 1,
                    height: 1,
                    depth: 1,
                })
                .mip_levels(1)
                .array_layers(1)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST)
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = ctx.device.create_image(&image_create_info, None)
                .map_err(|e| engine_err!("ember2d::vulkan", "Failed to create default texture image: {:?}", e))?;

            let requirements = ctx.device.get_image_memory_requirements(image);

            let allocation = ctx.allocator.lock().unwrap().allocate(&AllocationCreateDesc {
                name: "texture",
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|_e| {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                engine_error!("ember2d::vulkan", "Out of GPU memory for texture (size: 1x1, {:.2} MB)", size_mb);
                ctx.device.destroy_image(image, None);
                Error::OutOfMemory
            })?;

            if let Err(e) = ctx.device.bind_image_memory(image, allocation.memory(), allocation.offset()) {
                ctx.allocator.lock().unwrap().free(allocation).ok();
                ctx.device.destroy_image(image, None);
                return Err(engine_err!("ember2d::vulkan", "Failed to bind texture image memory: {:?}", e));
            }

            let subresource_range = vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            };

            let view_create_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(mapping.format)
                .components(mapping.swizzle)
                .subresource_range(subresource_range);

            let view = ctx.device.create_image_view(&view_create_info, None)
                .map_err(|e| engine_err!("ember2d::vulkan", "Failed to create texture image view: {:?}", e))?;

            let sampler_create_info = vk::SamplerCreateInfo::default()
                .mag_filter(vk::Filter::LINEAR)
                .min_filter(vk::Filter::LINEAR)
                .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
                .address_mode_u(vk::SamplerAddressMode::REPEAT)
                .address_mode_v(vk::SamplerAddressMode::REPEAT)
                .address_mode_w(vk::SamplerAddressMode::REPEAT)
                .mip_lod_bias(0.0)
                .min_lod(0.0)
                .max_lod(vk::LOD_CLAMP_NONE)
                .border_color(vk::BorderColor::FLOAT_OPAQUE_BLACK)
                .unnormalized_coordinates(false)
                .compare_enable(false)
                .compare_op(vk::CompareOp::ALWAYS)
                .anisotropy_enable(false)
                .max_anisotropy(1.0);

            let sampler = ctx.device.create_sampler(&sampler_create_info, None)
                .map_err(|e| engine_err!("ember2d::vulkan", "Failed to create texture sampler: {:?}", e))?;

            let texture = Self {
                ctx,
                image,
                view,
                sampler,
                allocation: Some(allocation),
                width: 1,
                height: 1,
                format,
            };
            texture.clear_white(subresource_range)?;

            Ok(texture)
        }
    }

    /// Transition to GENERAL and fill with opaque white
    fn clear_white(&self, subresource_range: vk::ImageSubresourceRange) -> Result<()> {
        unsafe {
            let command_buffer = self.ctx.begin_single_time_commands()?;

            let barrier_to_general = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(vk::ImageLayout::GENERAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(self.image)
                .subresource_range(subresource_range)
                .src_access_mask(vk::AccessFlags::empty())
                .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE);

            self.ctx.device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier_to_general],
            );

            let clear_color = vk::ClearColorValue {
                float32: [1.0, 1.0, 1.0, 1.0],
            };

            self.ctx.device.cmd_clear_color_image(
                command_buffer,
                self.image,
                vk::ImageLayout::GENERAL,
                &clear_color,
                &[subresource_range],
            );

            // Make the clear visible to fragment shader sampling
            let barrier_to_sample = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::GENERAL)
                .new_layout(vk::ImageLayout::GENERAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(self.image)
                .subresource_range(subresource_range)
                .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(vk::AccessFlags::SHADER_READ);

            self.ctx.device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier_to_sample],
            );

            self.ctx.end_single_time_commands(command_buffer)
        }
    }
}

impl Texture for VulkanTexture {
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
        self.view.as_raw()
    }

    fn native_sampler_handle(&self) -> u64 {
        self.sampler.as_raw()
    }
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_sampler(self.sampler, None);
            self.ctx.device.destroy_image_view(self.view, None);

            // Hand the backing memory back to the allocator
            if let Some(allocation) = self.allocation.take() {
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }

            self.ctx.device.destroy_image(self.image, None);
        }
    }
}
