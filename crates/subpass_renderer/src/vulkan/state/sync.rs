//! Vulkan synchronization primitives for GPU/CPU coordination
//!
//! Each frame-in-flight slot owns a [`FrameSync`]. The slot index advances
//! `(i + 1) % frames_in_flight` every frame, independently of which swapchain
//! image was acquired; [`FrameIndex`] and [`super::per_image::ImageIndex`] are
//! distinct types so the two cannot be mixed up.

use ash::{vk, Device};

use crate::vulkan::{ResourceKind, VulkanError, VulkanResult};

/// Semaphore wrapper with RAII cleanup
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new binary semaphore
    pub fn new(device: &Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        let semaphore = unsafe { device.create_semaphore(&create_info, None) }
            .map_err(VulkanError::Api)?;

        Ok(Self {
            device: device.clone(),
            semaphore,
        })
    }

    /// Get semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Fence wrapper with RAII cleanup
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a new fence, optionally already signaled
    pub fn new(device: &Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        let fence =
            unsafe { device.create_fence(&create_info, None) }.map_err(VulkanError::Api)?;

        Ok(Self {
            device: device.clone(),
            fence,
        })
    }

    /// Block until the fence is signaled
    pub fn wait(&self, timeout: u64) -> VulkanResult<()> {
        unsafe { self.device.wait_for_fences(&[self.fence], true, timeout) }
            .map_err(VulkanError::from_queue_result)
    }

    /// Return the fence to the unsignaled state
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe { self.device.reset_fences(&[self.fence]) }.map_err(VulkanError::Api)
    }

    /// Get fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// Synchronization objects for one frame-in-flight slot
pub struct FrameSync {
    /// Signaled when the acquired swapchain image is ready to be rendered to
    pub image_available: Semaphore,
    /// Signaled when rendering finishes; presentation waits on it
    pub render_finished: Semaphore,
    /// Signaled when the slot's submission completes; created signaled
    pub in_flight: Fence,
}

impl FrameSync {
    /// Create the slot's semaphores and a signaled fence
    pub fn new(device: &Device) -> VulkanResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(device)?,
            render_finished: Semaphore::new(device)?,
            in_flight: Fence::new(device, true)?,
        })
    }
}

/// Index of a frame-in-flight slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameIndex(usize);

impl FrameIndex {
    /// Raw slot index
    pub fn index(self) -> usize {
        self.0
    }
}

/// Cycles through `frames_in_flight` slots
#[derive(Debug, Clone)]
pub struct FrameCounter {
    current: usize,
    frames_in_flight: usize,
}

impl FrameCounter {
    /// Counter starting at slot 0
    pub fn new(frames_in_flight: usize) -> VulkanResult<Self> {
        if frames_in_flight == 0 {
            return Err(VulkanError::invalid("At least one frame in flight is required"));
        }
        Ok(Self {
            current: 0,
            frames_in_flight,
        })
    }

    /// Slot used by the frame being built
    pub fn current(&self) -> FrameIndex {
        FrameIndex(self.current)
    }

    /// Move to the next slot and return it
    pub fn advance(&mut self) -> FrameIndex {
        self.current = (self.current + 1) % self.frames_in_flight;
        self.current()
    }

    /// Number of slots
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }
}

/// One `T` per frame-in-flight slot, indexed by [`FrameIndex`]
pub struct FrameSlots<T> {
    slots: Vec<T>,
}

impl<T> FrameSlots<T> {
    /// Build one value per slot of `counter`
    pub fn try_new(
        counter: &FrameCounter,
        mut make: impl FnMut(FrameIndex) -> VulkanResult<T>,
    ) -> VulkanResult<Self> {
        let slots = (0..counter.frames_in_flight())
            .map(|i| make(FrameIndex(i)))
            .collect::<VulkanResult<Vec<_>>>()?;
        Ok(Self { slots })
    }

    /// Value for `frame`
    pub fn get(&self, frame: FrameIndex) -> VulkanResult<&T> {
        self.slots
            .get(frame.0)
            .ok_or_else(|| VulkanError::not_found(ResourceKind::FrameSlot, frame.0))
    }

    /// Swap in a new value for `frame`, returning the old one
    pub fn replace(&mut self, frame: FrameIndex, value: T) -> VulkanResult<T> {
        let slot = self
            .slots
            .get_mut(frame.0)
            .ok_or_else(|| VulkanError::not_found(ResourceKind::FrameSlot, frame.0))?;
        Ok(std::mem::replace(slot, value))
    }

    /// All slots in index order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter()
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether there are no slots
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_counter_cycles_through_every_slot() {
        let mut counter = FrameCounter::new(3).unwrap();
        let mut seen = HashSet::new();
        seen.insert(counter.current());
        for _ in 0..10_000 {
            let frame = counter.advance();
            assert!(frame.index() < 3);
            seen.insert(frame);
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_counter_order_wraps() {
        let mut counter = FrameCounter::new(2).unwrap();
        let order: Vec<usize> = (0..5).map(|_| counter.advance().index()).collect();
        assert_eq!(order, vec![1, 0, 1, 0, 1]);
    }

    #[test]
    fn test_zero_frames_rejected() {
        assert!(FrameCounter::new(0).is_err());
    }

    #[test]
    fn test_slots_never_index_out_of_bounds() {
        let mut counter = FrameCounter::new(2).unwrap();
        let slots = FrameSlots::try_new(&counter, |frame| Ok(frame.index() * 10)).unwrap();
        assert_eq!(slots.len(), 2);

        for _ in 0..1_000 {
            let frame = counter.advance();
            assert_eq!(*slots.get(frame).unwrap(), frame.index() * 10);
        }
    }

    #[test]
    fn test_slot_construction_error_propagates() {
        let counter = FrameCounter::new(2).unwrap();
        let result: VulkanResult<FrameSlots<u32>> = FrameSlots::try_new(&counter, |frame| {
            if frame.index() == 1 {
                Err(VulkanError::invalid("boom"))
            } else {
                Ok(0)
            }
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_replace_swaps_only_the_given_slot() {
        let counter = FrameCounter::new(3).unwrap();
        let mut slots = FrameSlots::try_new(&counter, |frame| Ok(frame.index() * 10)).unwrap();

        let old = slots.replace(FrameIndex(1), 99).unwrap();

        assert_eq!(old, 10);
        assert_eq!(slots.iter().copied().collect::<Vec<_>>(), vec![0, 99, 20]);
        assert!(slots.replace(FrameIndex(3), 0).is_err());
    }
}
