//! Math types and Vulkan-oriented matrix helpers built on nalgebra

pub use nalgebra::{Matrix4, Point3, Vector3};

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// Math utility functions
pub mod utils {
    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees.to_radians()
    }
}

/// Extension trait for Mat4 with camera construction helpers
pub trait Mat4Ext {
    /// Create a rotation matrix around the Y axis
    fn rotation_y(angle: f32) -> Mat4;

    /// Create a rotation matrix around the Z axis
    fn rotation_z(angle: f32) -> Mat4;

    /// Perspective projection mapping view depth `[near, far]` onto `[0, 1]`.
    ///
    /// Expects +Z forward input, so compose it with
    /// [`Mat4Ext::vulkan_coordinate_transform`] when starting from a
    /// right-handed view matrix.
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Right-handed look-at view matrix
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;

    /// Flips Y and Z so right-handed view space lines up with Vulkan clip space
    fn vulkan_coordinate_transform() -> Mat4;

    /// Full Vulkan projection: `perspective * vulkan_coordinate_transform`
    fn vulkan_projection(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Column-major array view used for GPU uploads
    fn to_cols_array_2d(&self) -> [[f32; 4]; 4];
}

impl Mat4Ext for Mat4 {
    fn rotation_y(angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::y_axis(), angle)
    }

    fn rotation_z(angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::z_axis(), angle)
    }

    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let tan_half_fovy = (fov_y * 0.5).tan();

        let mut result = Mat4::zeros();
        result[(0, 0)] = 1.0 / (aspect * tan_half_fovy);
        result[(1, 1)] = 1.0 / tan_half_fovy;
        result[(2, 2)] = far / (far - near);
        result[(2, 3)] = -(near * far) / (far - near);
        result[(3, 2)] = 1.0;
        result
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        let forward = (target - eye).normalize();
        let right = forward.cross(&up).normalize();
        let camera_up = right.cross(&forward);

        let translation = Mat4::new(
            1.0, 0.0, 0.0, -eye.x,
            0.0, 1.0, 0.0, -eye.y,
            0.0, 0.0, 1.0, -eye.z,
            0.0, 0.0, 0.0, 1.0,
        );

        let rotation = Mat4::new(
            right.x, right.y, right.z, 0.0,
            camera_up.x, camera_up.y, camera_up.z, 0.0,
            -forward.x, -forward.y, -forward.z, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );

        rotation * translation
    }

    fn vulkan_coordinate_transform() -> Mat4 {
        Mat4::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, -1.0, 0.0, 0.0,
            0.0, 0.0, -1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        )
    }

    fn vulkan_projection(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        Self::perspective(fov_y, aspect, near, far) * Self::vulkan_coordinate_transform()
    }

    fn to_cols_array_2d(&self) -> [[f32; 4]; 4] {
        let mut columns = [[0.0; 4]; 4];
        for (column, out) in columns.iter_mut().enumerate() {
            for (row, value) in out.iter_mut().enumerate() {
                *value = self[(row, column)];
            }
        }
        columns
    }
}
