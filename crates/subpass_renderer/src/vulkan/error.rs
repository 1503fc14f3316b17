//! Vulkan error types shared by every layer of the renderer

use ash::vk;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Kinds of indexed resources the renderer hands out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Entry in the model table
    Model,
    /// Entry in the texture table
    Texture,
    /// Frame-in-flight slot
    FrameSlot,
    /// Swapchain image slot
    SwapchainImage,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Model => "model",
            Self::Texture => "texture",
            Self::FrameSlot => "frame slot",
            Self::SwapchainImage => "swapchain image",
        };
        f.write_str(name)
    }
}

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No physical device satisfies the renderer's requirements
    #[error("No suitable physical device: {reason}")]
    DeviceNotFound {
        /// Why the last candidate was rejected
        reason: String,
    },

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// None of the candidate formats support the required features
    #[error("No supported format for {purpose}")]
    UnsupportedFormat {
        /// What the format was needed for
        purpose: &'static str,
    },

    /// The swapchain no longer matches the surface and must be recreated
    #[error("Swapchain is out of date")]
    SwapchainOutOfDate,

    /// The logical device was lost; nothing can be recovered
    #[error("Device lost")]
    DeviceLost,

    /// Resource with specified index could not be found
    #[error("{kind} {index} not found")]
    ResourceNotFound {
        /// Table the lookup went to
        kind: ResourceKind,
        /// The offending index
        index: usize,
    },

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// A SPIR-V file could not be read
    #[error("Failed to load shader {path}: {source}")]
    ShaderLoad {
        /// File that failed to load
        path: PathBuf,
        /// Underlying I/O failure
        source: std::io::Error,
    },

    /// A texture file could not be decoded
    #[error("Failed to load texture {path}: {reason}")]
    TextureLoad {
        /// File that failed to load
        path: PathBuf,
        /// Decoder message
        reason: String,
    },
}

impl VulkanError {
    /// Classify a raw result from queue submission or presentation
    pub fn from_queue_result(result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_OUT_OF_DATE_KHR | vk::Result::SUBOPTIMAL_KHR => {
                Self::SwapchainOutOfDate
            }
            vk::Result::ERROR_DEVICE_LOST => Self::DeviceLost,
            other => Self::Api(other),
        }
    }

    /// Whether the caller can continue after recreating the swapchain
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SwapchainOutOfDate)
    }

    pub(crate) fn not_found(kind: ResourceKind, index: usize) -> Self {
        Self::ResourceNotFound { kind, index }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            reason: reason.into(),
        }
    }
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_date_is_recoverable() {
        let error = VulkanError::from_queue_result(vk::Result::ERROR_OUT_OF_DATE_KHR);
        assert!(error.is_recoverable());
        assert!(VulkanError::from_queue_result(vk::Result::SUBOPTIMAL_KHR).is_recoverable());
    }

    #[test]
    fn test_device_lost_is_not_recoverable() {
        let error = VulkanError::from_queue_result(vk::Result::ERROR_DEVICE_LOST);
        assert!(matches!(error, VulkanError::DeviceLost));
        assert!(!error.is_recoverable());
    }

    #[test]
    fn test_other_results_stay_api_errors() {
        let error = VulkanError::from_queue_result(vk::Result::ERROR_OUT_OF_HOST_MEMORY);
        assert!(matches!(error, VulkanError::Api(vk::Result::ERROR_OUT_OF_HOST_MEMORY)));
    }

    #[test]
    fn test_not_found_message_names_kind() {
        let error = VulkanError::not_found(ResourceKind::Texture, 7);
        assert_eq!(error.to_string(), "texture 7 not found");
    }
}
