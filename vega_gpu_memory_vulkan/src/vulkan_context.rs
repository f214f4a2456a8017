/// GpuContext - Shared GPU resources for the Vulkan memory backend
///
/// Contains everything the backend needs for buffer operations:
/// - Device for Vulkan API calls
/// - Allocator for memory management
/// - Queue for command submission
/// - Command pool for one-shot upload/copy operations
///
/// The context is headless: no surface, no swapchain. It exists to serve
/// buffer memory, not presentation.

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};

use vega_gpu_memory::gpu_error;
use vega_gpu_memory::{Error, Result};

/// Vulkan backend configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Enable VK_LAYER_KHRONOS_validation and the debug messenger.
    /// Only honored when the `vulkan-validation` feature is compiled in.
    pub enable_validation: bool,
}

/// Shared GPU context for the Vulkan memory backend.
///
/// Shared (via `Arc`) by the memory device and the fence strategy so that
/// neither duplicates device/allocator/queue references.
pub struct GpuContext {
    /// Vulkan logical device
    pub device: ash::Device,

    /// GPU memory allocator (shared, requires mutex for thread safety)
    /// Wrapped in ManuallyDrop to ensure it's dropped BEFORE the device is destroyed
    pub allocator: ManuallyDrop<Arc<Mutex<Allocator>>>,

    /// Queue for upload/copy command submission
    pub queue: vk::Queue,

    /// Queue family index of `queue`
    pub queue_family: u32,

    /// Reusable command pool for one-shot upload/copy operations
    /// (created with TRANSIENT + RESET_COMMAND_BUFFER flags)
    pub upload_command_pool: Mutex<vk::CommandPool>,

    instance: ash::Instance,

    /// Keeps the Vulkan library loaded for the context's lifetime
    _entry: ash::Entry,

    /// Debug utils loader (for validation layers)
    debug_utils_loader: Option<ash::ext::debug_utils::Instance>,

    /// Debug messenger handle
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl GpuContext {
    /// Create a headless GPU context on the first Vulkan-capable device.
    pub fn new(config: Config) -> Result<Arc<Self>> {
        unsafe {
            // Create Vulkan Entry
            let entry = ash::Entry::load().map_err(|e| {
                gpu_error!("vega3d::vulkan", "Failed to load Vulkan library: {:?}", e);
                Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
            })?;

            // Application Info
            let app_info = vk::ApplicationInfo::default()
                .application_name(c"Vega3D Memory")
                .application_version(vk::make_api_version(0, 1, 0, 0))
                .engine_name(c"Vega3D")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let validation = cfg!(feature = "vulkan-validation") && config.enable_validation;

            // Headless: no surface extensions, only debug utils when validating
            let mut extension_names: Vec<*const std::os::raw::c_char> = Vec::new();
            let mut layer_names: Vec<*const std::os::raw::c_char> = Vec::new();
            if validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
                layer_names.push(c"VK_LAYER_KHRONOS_validation".as_ptr());
            }

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry.create_instance(&create_info, None).map_err(|e| {
                gpu_error!("vega3d::vulkan", "Failed to create Vulkan instance: {:?}", e);
                Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
            })?;

            // Setup debug messenger if validation is enabled
            #[allow(unused_mut)]
            let mut debug: (
                Option<ash::ext::debug_utils::Instance>,
                Option<vk::DebugUtilsMessengerEXT>,
            ) = (None, None);
            #[cfg(feature = "vulkan-validation")]
            if validation {
                let debug_utils = ash::ext::debug_utils::Instance::new(&entry, &instance);
                let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
                    .message_severity(
                        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                            | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
                    )
                    .message_type(
                        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                    )
                    .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

                let messenger = debug_utils
                    .create_debug_utils_messenger(&debug_info, None)
                    .map_err(|e| {
                        gpu_error!("vega3d::vulkan", "Failed to create debug messenger: {:?}", e);
                        Error::InitializationFailed(format!(
                            "Failed to create debug messenger: {:?}",
                            e
                        ))
                    })?;
                debug = (Some(debug_utils), Some(messenger));
            }
            let (debug_utils_loader, debug_messenger) = debug;

            // Pick Physical Device
            let physical_devices = instance.enumerate_physical_devices().map_err(|e| {
                gpu_error!("vega3d::vulkan", "Failed to enumerate physical devices: {:?}", e);
                Error::InitializationFailed(format!(
                    "Failed to enumerate physical devices: {:?}",
                    e
                ))
            })?;

            let physical_device = physical_devices.into_iter().next().ok_or_else(|| {
                gpu_error!("vega3d::vulkan", "No Vulkan-capable GPU found");
                Error::InitializationFailed("No Vulkan-capable GPU found".to_string())
            })?;

            // Find a queue family for uploads/copies (graphics implies transfer)
            let queue_families =
                instance.get_physical_device_queue_family_properties(physical_device);
            let queue_family = queue_families
                .iter()
                .enumerate()
                .find(|(_, qf)| qf.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                .map(|(i, _)| i as u32)
                .ok_or_else(|| {
                    gpu_error!("vega3d::vulkan", "No graphics queue family found");
                    Error::InitializationFailed("No graphics queue family found".to_string())
                })?;

            // Create Logical Device (headless: no device extensions needed)
            let queue_priorities = [1.0];
            let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
                .queue_family_index(queue_family)
                .queue_priorities(&queue_priorities)];

            let device_create_info =
                vk::DeviceCreateInfo::default().queue_create_infos(&queue_create_infos);

            let device = instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(|e| {
                    gpu_error!("vega3d::vulkan", "Failed to create logical device: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create device: {:?}", e))
                })?;

            let queue = device.get_device_queue(queue_family, 0);

            // Create GPU allocator
            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| {
                gpu_error!("vega3d::vulkan", "Failed to create GPU allocator: {:?}", e);
                Error::InitializationFailed(format!("Failed to create allocator: {:?}", e))
            })?;

            // Create upload command pool (TRANSIENT + RESET for reusable one-shot uploads)
            let upload_pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(queue_family)
                .flags(
                    vk::CommandPoolCreateFlags::TRANSIENT
                        | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
                );

            let upload_command_pool = device
                .create_command_pool(&upload_pool_create_info, None)
                .map_err(|e| {
                    gpu_error!("vega3d::vulkan", "Failed to create upload command pool: {:?}", e);
                    Error::InitializationFailed(format!(
                        "Failed to create upload command pool: {:?}",
                        e
                    ))
                })?;

            Ok(Arc::new(Self {
                device,
                allocator: ManuallyDrop::new(Arc::new(Mutex::new(allocator))),
                queue,
                queue_family,
                upload_command_pool: Mutex::new(upload_command_pool),
                instance,
                _entry: entry,
                debug_utils_loader,
                debug_messenger,
            }))
        }
    }

    /// Record and submit a one-shot command buffer, waiting for completion.
    ///
    /// Uploads and copies go through here; the pool mutex serializes them,
    /// which also serializes our submissions on the shared queue.
    pub(crate) fn submit_one_shot<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        unsafe {
            let pool = self.upload_command_pool.lock().unwrap();

            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(*pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffer = self
                .device
                .allocate_command_buffers(&alloc_info)
                .map_err(|e| {
                    gpu_error!("vega3d::vulkan", "Failed to allocate command buffer: {:?}", e);
                    Error::BackendError(format!("Failed to allocate command buffer: {:?}", e))
                })?[0];
            let command_buffers = [command_buffer];

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            if let Err(e) = self.device.begin_command_buffer(command_buffer, &begin_info) {
                self.device.free_command_buffers(*pool, &command_buffers);
                gpu_error!("vega3d::vulkan", "Failed to begin command buffer: {:?}", e);
                return Err(Error::BackendError(format!(
                    "Failed to begin command buffer: {:?}",
                    e
                )));
            }

            record(&self.device, command_buffer);

            let result = self
                .device
                .end_command_buffer(command_buffer)
                .and_then(|_| self.device.create_fence(&vk::FenceCreateInfo::default(), None))
                .and_then(|fence| {
                    let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
                    let submitted = self
                        .device
                        .queue_submit(self.queue, &[submit_info], fence)
                        .and_then(|_| self.device.wait_for_fences(&[fence], true, u64::MAX));
                    self.device.destroy_fence(fence, None);
                    submitted
                });

            self.device.free_command_buffers(*pool, &command_buffers);

            result.map_err(|e| {
                gpu_error!("vega3d::vulkan", "One-shot submit failed: {:?}", e);
                Error::BackendError(format!("One-shot submit failed: {:?}", e))
            })
        }
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            let pool = self.upload_command_pool.lock().unwrap();
            self.device.destroy_command_pool(*pool, None);
            drop(pool);

            // Allocator must release its device memory before the device dies
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);

            if let (Some(loader), Some(messenger)) =
                (&self.debug_utils_loader, self.debug_messenger)
            {
                loader.destroy_debug_utils_messenger(messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}
