//! View/projection uniform block

use bytemuck::{Pod, Zeroable};

use crate::config::CameraConfig;
use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3};

/// Uniform block read by the geometry vertex shader (`set = 0, binding = 0`)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewProjection {
    /// Projection matrix, column-major
    pub projection: [[f32; 4]; 4],
    /// View matrix, column-major
    pub view: [[f32; 4]; 4],
}

unsafe impl Zeroable for ViewProjection {}
unsafe impl Pod for ViewProjection {}

impl ViewProjection {
    /// Pack view and projection matrices
    pub fn new(view: &Mat4, projection: &Mat4) -> Self {
        Self {
            projection: projection.to_cols_array_2d(),
            view: view.to_cols_array_2d(),
        }
    }
}

/// CPU-side camera state
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// View matrix
    pub view: Mat4,
    /// Projection matrix, already in Vulkan clip conventions
    pub projection: Mat4,
    settings: CameraConfig,
}

impl Camera {
    /// Build the camera described by `settings` for a viewport of `aspect`
    pub fn from_config(settings: &CameraConfig, aspect: f32) -> Self {
        let view = Mat4::look_at(
            Vec3::from(settings.eye),
            Vec3::from(settings.target),
            Vec3::from(settings.up),
        );
        let mut camera = Self {
            view,
            projection: Mat4::identity(),
            settings: settings.clone(),
        };
        camera.set_aspect(aspect);
        camera
    }

    /// Rebuild the projection for a new viewport aspect ratio
    pub fn set_aspect(&mut self, aspect: f32) {
        self.projection = Mat4::vulkan_projection(
            utils::deg_to_rad(self.settings.fov_y_degrees),
            aspect,
            self.settings.near,
            self.settings.far,
        );
    }

    /// Uniform block for the current matrices
    pub fn uniform(&self) -> ViewProjection {
        ViewProjection::new(&self.view, &self.projection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_uniform_block_size() {
        assert_eq!(std::mem::size_of::<ViewProjection>(), 128);
    }

    #[test]
    fn test_projection_comes_first() {
        let projection = Mat4::new_scaling(2.0);
        let block = ViewProjection::new(&Mat4::identity(), &projection);
        assert_eq!(block.projection[0][0], 2.0);
        assert_eq!(block.view[0][0], 1.0);
    }

    #[test]
    fn test_aspect_change_rescales_x() {
        let mut camera = Camera::from_config(&CameraConfig::default(), 1.0);
        let square = camera.projection[(0, 0)];
        camera.set_aspect(2.0);
        assert_relative_eq!(camera.projection[(0, 0)], square / 2.0, epsilon = 1e-6);
    }
}
