use thiserror::Error;
use vulkanalia::vk;

/// Failures that abort startup. None of these are retried.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("Vulkan enumerated no physical devices.")]
    NoPhysicalDevice,
    #[error("No queue family supports graphics.")]
    NoGraphicsQueue,
    #[error("Queue family {0} cannot present to the window surface (WSI not supported).")]
    PresentNotSupported(u32),
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

/// A device call that failed after startup, or while (re)building the swapchain.
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("{call} failed: {code}")]
    Call {
        call: &'static str,
        code: vk::ErrorCode,
    },
    #[error("Acquired image {0} has no frame resources.")]
    UnknownImage(u32),
    #[error("Semaphore slot {0} does not exist.")]
    NoSemaphores(usize),
}

pub trait CallSite<T> {
    fn at(self, call: &'static str) -> Result<T, GpuError>;
}

impl<T> CallSite<T> for Result<T, vk::ErrorCode> {
    fn at(self, call: &'static str) -> Result<T, GpuError> {
        self.map_err(|code| GpuError::Call { call, code })
    }
}
