/// GpuContext - GPU state every Vulkan resource hangs on to
///
/// Buffers, textures, shaders and the per-frame streaming sets all need
/// the same three things to create and destroy themselves: the logical
/// device, the allocator, and a queue with an upload pool for one-shot
/// submissions. This struct carries them behind one `Arc`.

use ash::vk;
use gpu_allocator::vulkan::Allocator;
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};

use ember_2d_engine::ember2d::Result;
use ember_2d_engine::engine_err;

/// Device-level handles resources create and destroy themselves with.
///
/// The device and instance themselves are destroyed by VulkanGraphics::drop(),
/// never through this struct.
pub struct GpuContext {
    /// Logical device handle
    pub device: ash::Device,

    /// GPU memory allocator, mutex-guarded since resource creation can
    /// happen from any thread holding the context.
    /// ManuallyDrop: VulkanGraphics tears the allocator down before the device.
    pub allocator: ManuallyDrop<Arc<Mutex<Allocator>>>,

    /// Queue that takes both rendering and upload submissions
    pub graphics_queue: vk::Queue,

    /// Family index `graphics_queue` came from
    pub graphics_queue_family: u32,

    /// Pool for one-shot upload command buffers
    /// (created with TRANSIENT + RESET_COMMAND_BUFFER flags)
    pub upload_command_pool: Mutex<vk::CommandPool>,

    /// Instance the device was created from; VulkanGraphics destroys it
    #[allow(dead_code)]
    instance: ash::Instance,

    /// Debug utils loader, present when validation layers are enabled
    pub(crate) debug_utils_loader: Option<ash::ext::debug_utils::Instance>,

    /// Messenger receiving validation output
    pub(crate) debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl GpuContext {
    /// Bundle the device-level state created by VulkanGraphics::new()
    pub fn new(
        device: ash::Device,
        allocator: Arc<Mutex<Allocator>>,
        graphics_queue: vk::Queue,
        graphics_queue_family: u32,
        upload_command_pool: vk::CommandPool,
        instance: ash::Instance,
        debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
        debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    ) -> Self {
        Self {
            device,
            allocator: ManuallyDrop::new(allocator),
            graphics_queue,
            graphics_queue_family,
            upload_command_pool: Mutex::new(upload_command_pool),
            instance,
            debug_utils_loader,
            debug_messenger,
        }
    }

    /// Begin a one-shot command buffer from the upload pool
    ///
    /// Pairs with `end_single_time_commands`, which submits and waits.
    pub fn begin_single_time_commands(&self) -> Result<vk::CommandBuffer> {
        let pool = *self.upload_command_pool.lock().unwrap();

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        unsafe {
            let command_buffer = self
                .device
                .allocate_command_buffers(&alloc_info)
                .map_err(|e| engine_err!("ember2d::vulkan", "Failed to allocate one-shot command buffer: {:?}", e))?[0];

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

            self.device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(|e| engine_err!("ember2d::vulkan", "Failed to begin one-shot command buffer: {:?}", e))?;

            Ok(command_buffer)
        }
    }

    /// Submit a one-shot command buffer, wait for completion, and free it
    pub fn end_single_time_commands(&self, command_buffer: vk::CommandBuffer) -> Result<()> {
        unsafe {
            self.device
                .end_command_buffer(command_buffer)
                .map_err(|e| engine_err!("ember2d::vulkan", "Failed to end one-shot command buffer: {:?}", e))?;

            let command_buffers = [command_buffer];
            let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);

            self.device
                .queue_submit(self.graphics_queue, &[submit_info], vk::Fence::null())
                .map_err(|e| engine_err!("ember2d::vulkan", "Failed to submit one-shot commands: {:?}", e))?;

            self.device
                .queue_wait_idle(self.graphics_queue)
                .map_err(|e| engine_err!("ember2d::vulkan", "Failed to wait for one-shot commands: {:?}", e))?;

            let pool = *self.upload_command_pool.lock().unwrap();
            self.device.free_command_buffers(pool, &command_buffers);

            Ok(())
        }
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        // Teardown lives in VulkanGraphics::drop(), which destroys the
        // device and instance after every resource holding this context
        // is gone. Nothing to release here.
    }
}
