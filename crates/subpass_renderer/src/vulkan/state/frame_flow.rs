//! Decisions `VulkanRenderer::draw` makes between the fallible stages of a frame
//!
//! ```text
//! before_acquire ── Skip ──────────────► FrameStatus::Skipped
//!        │ Rebuild ──────────────────► rebuild, FrameStatus::Recreated
//!        ▼ Proceed
//! after_acquire ─── out of date ─────► rebuild, FrameStatus::Recreated
//!        ▼ image
//! record + submit (slot fence now owned by the GPU; frame counter advances)
//!        ▼
//! after_present ─── Rebuild ─────────► rebuild, FrameStatus::Recreated
//!        ▼ Proceed
//! FrameStatus::Presented
//! ```

use crate::vulkan::{VulkanError, VulkanResult};

/// Next step of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameAction {
    /// Nothing can be drawn; leave every slot untouched
    Skip,
    /// Rebuild the swapchain targets
    Rebuild,
    /// Carry on with the frame
    Proceed,
}

/// Decide whether a frame can start. A zero-area framebuffer (minimised
/// window) wins over a pending resize since no swapchain can be built for it.
pub fn before_acquire(framebuffer_size: (u32, u32), resized: bool) -> FrameAction {
    if framebuffer_size.0 == 0 || framebuffer_size.1 == 0 {
        FrameAction::Skip
    } else if resized {
        FrameAction::Rebuild
    } else {
        FrameAction::Proceed
    }
}

/// Split an acquire result into the acquired image (with its suboptimal
/// flag) or `None` when the swapchain must be rebuilt first
pub fn after_acquire<T>(result: VulkanResult<(T, bool)>) -> VulkanResult<Option<(T, bool)>> {
    match result {
        Ok(acquired) => Ok(Some(acquired)),
        Err(VulkanError::SwapchainOutOfDate) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Decide what follows a present. A suboptimal acquire, a suboptimal or
/// out-of-date present, or a resize noticed mid-frame all rebuild.
pub fn after_present(
    result: VulkanResult<bool>,
    acquired_suboptimal: bool,
    resized: bool,
) -> VulkanResult<FrameAction> {
    match result {
        Ok(false) if !acquired_suboptimal && !resized => Ok(FrameAction::Proceed),
        Ok(_) | Err(VulkanError::SwapchainOutOfDate) => Ok(FrameAction::Rebuild),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sized_framebuffer_skips() {
        assert_eq!(before_acquire((0, 600), false), FrameAction::Skip);
        assert_eq!(before_acquire((800, 0), false), FrameAction::Skip);
        assert_eq!(before_acquire((0, 0), true), FrameAction::Skip);
    }

    #[test]
    fn test_pending_resize_rebuilds() {
        assert_eq!(before_acquire((800, 600), true), FrameAction::Rebuild);
        assert_eq!(before_acquire((800, 600), false), FrameAction::Proceed);
    }

    #[test]
    fn test_out_of_date_acquire_requests_rebuild() {
        let result: VulkanResult<(u32, bool)> = Err(VulkanError::SwapchainOutOfDate);
        assert!(matches!(after_acquire(result), Ok(None)));
    }

    #[test]
    fn test_acquired_image_passes_through() {
        assert!(matches!(after_acquire(Ok((2_u32, false))), Ok(Some((2, false)))));
        assert!(matches!(after_acquire(Ok((1_u32, true))), Ok(Some((1, true)))));
    }

    #[test]
    fn test_device_lost_on_acquire_is_fatal() {
        let result: VulkanResult<(u32, bool)> = Err(VulkanError::DeviceLost);
        assert!(matches!(after_acquire(result), Err(VulkanError::DeviceLost)));
    }

    #[test]
    fn test_clean_present_proceeds() {
        assert_eq!(after_present(Ok(false), false, false).unwrap(), FrameAction::Proceed);
    }

    #[test]
    fn test_suboptimal_or_out_of_date_present_rebuilds() {
        assert_eq!(after_present(Ok(true), false, false).unwrap(), FrameAction::Rebuild);
        assert_eq!(
            after_present(Err(VulkanError::SwapchainOutOfDate), false, false).unwrap(),
            FrameAction::Rebuild
        );
    }

    #[test]
    fn test_suboptimal_acquire_or_resize_rebuilds_after_present() {
        assert_eq!(after_present(Ok(false), true, false).unwrap(), FrameAction::Rebuild);
        assert_eq!(after_present(Ok(false), false, true).unwrap(), FrameAction::Rebuild);
    }

    #[test]
    fn test_device_lost_on_present_is_fatal() {
        assert!(matches!(
            after_present(Err(VulkanError::DeviceLost), false, false),
            Err(VulkanError::DeviceLost)
        ));
    }
}
