//! Frame pacing, synchronization and swapchain state

pub mod frame_flow;
pub mod per_image;
pub mod swapchain;
pub mod sync;

pub use frame_flow::FrameAction;
pub use per_image::{ImageIndex, PerImage};
pub use swapchain::{Swapchain, SwapchainImage};
pub use sync::{Fence, FrameCounter, FrameIndex, FrameSlots, FrameSync, Semaphore};
