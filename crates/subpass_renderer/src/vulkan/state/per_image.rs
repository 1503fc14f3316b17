//! Per-swapchain-image storage keyed by generation-checked indices

use crate::vulkan::{ResourceKind, VulkanError, VulkanResult};

/// Index of an acquired swapchain image, stamped with the swapchain generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageIndex {
    index: u32,
    generation: u32,
}

impl ImageIndex {
    /// Index as returned by image acquisition for swapchain `generation`
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Raw image index, as presentation expects it
    pub fn index(self) -> u32 {
        self.index
    }

    /// Swapchain generation the index belongs to
    pub fn generation(self) -> u32 {
        self.generation
    }
}

/// One `T` per swapchain image of a single swapchain generation
#[derive(Debug)]
pub struct PerImage<T> {
    generation: u32,
    items: Vec<T>,
}

impl<T> Default for PerImage<T> {
    fn default() -> Self {
        Self {
            generation: 0,
            items: Vec::new(),
        }
    }
}

impl<T> PerImage<T> {
    /// Wrap values already ordered by image index
    pub fn new(generation: u32, items: Vec<T>) -> Self {
        Self { generation, items }
    }

    /// Build `count` values in image order
    pub fn try_from_fn(
        generation: u32,
        count: usize,
        mut make: impl FnMut(ImageIndex) -> VulkanResult<T>,
    ) -> VulkanResult<Self> {
        let items = (0..count)
            .map(|i| {
                let index = u32::try_from(i)
                    .map_err(|_| VulkanError::invalid("Too many swapchain images"))?;
                make(ImageIndex::new(index, generation))
            })
            .collect::<VulkanResult<Vec<_>>>()?;
        Ok(Self { generation, items })
    }

    /// Build a sibling table by mapping every entry
    pub fn try_map<U>(
        &self,
        mut make: impl FnMut(ImageIndex, &T) -> VulkanResult<U>,
    ) -> VulkanResult<PerImage<U>> {
        let items = self
            .indices()
            .zip(&self.items)
            .map(|(index, item)| make(index, item))
            .collect::<VulkanResult<Vec<_>>>()?;
        Ok(PerImage {
            generation: self.generation,
            items,
        })
    }

    fn check(&self, image: ImageIndex) -> VulkanResult<usize> {
        let index = image.index as usize;
        if image.generation != self.generation || index >= self.items.len() {
            return Err(VulkanError::not_found(ResourceKind::SwapchainImage, index));
        }
        Ok(index)
    }

    /// Value for `image`; fails for out-of-range or stale indices
    pub fn get(&self, image: ImageIndex) -> VulkanResult<&T> {
        let index = self.check(image)?;
        Ok(&self.items[index])
    }

    /// Mutable value for `image`
    pub fn get_mut(&mut self, image: ImageIndex) -> VulkanResult<&mut T> {
        let index = self.check(image)?;
        Ok(&mut self.items[index])
    }

    /// Every valid index of this generation
    pub fn indices(&self) -> impl Iterator<Item = ImageIndex> + '_ {
        (0..self.items.len()).map(move |i| ImageIndex::new(i as u32, self.generation))
    }

    /// Values in image order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Mutable values in image order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut()
    }

    /// Swapchain generation these values belong to
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Number of images
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether there are no images
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_current_generation() {
        let table = PerImage::new(4, vec!["a", "b", "c"]);
        assert_eq!(*table.get(ImageIndex::new(1, 4)).unwrap(), "b");
    }

    #[test]
    fn test_stale_generation_rejected() {
        let table = PerImage::new(4, vec!["a", "b", "c"]);
        let stale = ImageIndex::new(1, 3);
        assert!(matches!(
            table.get(stale),
            Err(VulkanError::ResourceNotFound {
                kind: ResourceKind::SwapchainImage,
                index: 1
            })
        ));
    }

    #[test]
    fn test_out_of_range_rejected() {
        let table = PerImage::new(0, vec![1, 2]);
        assert!(table.get(ImageIndex::new(2, 0)).is_err());
    }

    #[test]
    fn test_mapped_table_keeps_length_and_generation() {
        let images = PerImage::try_from_fn(7, 3, |image| Ok(image.index() * 2)).unwrap();
        let mapped = images.try_map(|image, value| Ok(image.index() + value)).unwrap();

        assert_eq!(mapped.len(), images.len());
        assert_eq!(mapped.generation(), 7);
        assert_eq!(mapped.iter().copied().collect::<Vec<_>>(), vec![0, 3, 6]);
    }

    #[test]
    fn test_indices_cover_every_image() {
        let table = PerImage::new(2, vec![(); 4]);
        let indices: Vec<u32> = table.indices().map(ImageIndex::index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_get_mut_writes_through() {
        let mut table = PerImage::new(1, vec![0, 0]);
        *table.get_mut(ImageIndex::new(1, 1)).unwrap() = 9;
        assert_eq!(table.iter().copied().collect::<Vec<_>>(), vec![0, 9]);
    }
}
