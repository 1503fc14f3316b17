//! Renderer, shader, camera and window configuration

use super::{Config, ConfigError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directories searched when resolving shader file names
const SHADER_SEARCH_DIRS: [&str; 5] = [
    "target/shaders/",
    "shaders/",
    "resources/shaders/",
    "../target/shaders/",
    "./",
];

/// SPIR-V locations for the geometry and composition pipelines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderConfig {
    /// Geometry subpass vertex shader
    pub geometry_vertex: PathBuf,
    /// Geometry subpass fragment shader
    pub geometry_fragment: PathBuf,
    /// Composition subpass vertex shader (full-screen triangle)
    pub composition_vertex: PathBuf,
    /// Composition subpass fragment shader (reads input attachments)
    pub composition_fragment: PathBuf,
}

impl ShaderConfig {
    /// Resolve each file name against the usual shader output directories.
    ///
    /// Names that are not found anywhere fall back to `shaders/<name>` so the
    /// eventual load error names a sensible path.
    pub fn with_path_resolution(
        geometry_vertex: &str,
        geometry_fragment: &str,
        composition_vertex: &str,
        composition_fragment: &str,
    ) -> Self {
        Self {
            geometry_vertex: resolve_shader_path(geometry_vertex),
            geometry_fragment: resolve_shader_path(geometry_fragment),
            composition_vertex: resolve_shader_path(composition_vertex),
            composition_fragment: resolve_shader_path(composition_fragment),
        }
    }

    /// All four paths in pipeline order
    pub fn paths(&self) -> [&Path; 4] {
        [
            &self.geometry_vertex,
            &self.geometry_fragment,
            &self.composition_vertex,
            &self.composition_fragment,
        ]
    }

    /// Validate that shader files exist
    pub fn validate(&self) -> Result<(), ConfigError> {
        for path in self.paths() {
            if !path.exists() {
                return Err(ConfigError::Invalid(format!(
                    "Shader not found: {}",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::with_path_resolution(
            "geometry.vert.spv",
            "geometry.frag.spv",
            "composition.vert.spv",
            "composition.frag.spv",
        )
    }
}

fn resolve_shader_path(name: &str) -> PathBuf {
    SHADER_SEARCH_DIRS
        .iter()
        .map(|dir| Path::new(dir).join(name))
        .find(|candidate| candidate.exists())
        .unwrap_or_else(|| Path::new("shaders").join(name))
}

/// Initial camera placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Eye position in world space
    pub eye: [f32; 3],
    /// Point the camera looks at
    pub target: [f32; 3],
    /// World up direction
    pub up: [f32; 3],
    /// Vertical field of view in degrees
    pub fov_y_degrees: f32,
    /// Near clip distance
    pub near: f32,
    /// Far clip distance
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            eye: [10.0, 0.0, 2.0],
            target: [0.0, 0.0, 0.0],
            up: [0.0, 0.0, 1.0],
            fov_y_degrees: 45.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

/// Window creation parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Title bar text
    pub title: String,
    /// Initial width in screen coordinates
    pub width: u32,
    /// Initial height in screen coordinates
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Subpass Viewer".to_string(),
            width: 800,
            height: 600,
        }
    }
}

/// # Vulkan Renderer Configuration
///
/// Replaces process-wide constants: layer and extension lists, frame pacing,
/// texture pool sizing, clear colors, shader locations and the initial camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Application version (major, minor, patch)
    pub application_version: (u32, u32, u32),
    /// Number of frames the CPU may record ahead of the GPU
    pub frames_in_flight: usize,
    /// Whether to enable Vulkan validation layers; `None` follows the build type
    pub enable_validation: Option<bool>,
    /// Validation layers requested when validation is enabled
    pub validation_layers: Vec<String>,
    /// Extra device extensions; the swapchain extension is always added
    pub device_extensions: Vec<String>,
    /// Capacity of the texture table, including the default texture
    pub max_textures: u32,
    /// Directory texture file names are resolved against
    pub texture_directory: PathBuf,
    /// Clear value for the swapchain color attachment
    pub clear_color: [f32; 4],
    /// Clear value for the offscreen color attachment
    pub offscreen_clear_color: [f32; 4],
    /// Shader configuration
    pub shaders: ShaderConfig,
    /// Initial camera
    pub camera: CameraConfig,
}

impl RendererConfig {
    /// Create a new renderer configuration
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            application_version: (1, 0, 0),
            frames_in_flight: 2,
            enable_validation: None,
            validation_layers: vec!["VK_LAYER_KHRONOS_validation".to_string()],
            device_extensions: Vec::new(),
            max_textures: 20,
            texture_directory: PathBuf::from("textures"),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            offscreen_clear_color: [0.6, 0.65, 0.4, 1.0],
            shaders: ShaderConfig::default(),
            camera: CameraConfig::default(),
        }
    }

    /// Set application version
    pub fn with_version(mut self, major: u32, minor: u32, patch: u32) -> Self {
        self.application_version = (major, minor, patch);
        self
    }

    /// Set custom shader configuration
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Set the number of frames in flight
    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Set the texture table capacity
    pub fn with_max_textures(mut self, max_textures: u32) -> Self {
        self.max_textures = max_textures;
        self
    }

    /// Set the directory texture names resolve against
    pub fn with_texture_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.texture_directory = dir.into();
        self
    }

    /// Set the initial camera
    pub fn with_camera(mut self, camera: CameraConfig) -> Self {
        self.camera = camera;
        self
    }

    /// Whether validation layers should be requested
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_name.is_empty() {
            return Err(ConfigError::Invalid(
                "Application name cannot be empty".to_string(),
            ));
        }

        if !(1..=8).contains(&self.frames_in_flight) {
            return Err(ConfigError::Invalid(format!(
                "Frames in flight must be between 1 and 8, got {}",
                self.frames_in_flight
            )));
        }

        // Slot 0 is always taken by the default texture
        if self.max_textures < 2 {
            return Err(ConfigError::Invalid(
                "Texture table needs room for the default texture and at least one more"
                    .to_string(),
            ));
        }

        let camera = &self.camera;
        if camera.near <= 0.0 || camera.far <= camera.near {
            return Err(ConfigError::Invalid(format!(
                "Camera clip range {}..{} is not valid",
                camera.near, camera.far
            )));
        }
        if !(0.0..180.0).contains(&camera.fov_y_degrees) || camera.fov_y_degrees == 0.0 {
            return Err(ConfigError::Invalid(format!(
                "Field of view {} is out of range",
                camera.fov_y_degrees
            )));
        }

        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new("Subpass Renderer Application")
    }
}

impl Config for RendererConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RendererConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.frames_in_flight, 2);
        assert_eq!(config.offscreen_clear_color, [0.6, 0.65, 0.4, 1.0]);
    }

    #[test]
    fn test_frames_in_flight_bounds() {
        assert!(RendererConfig::default().with_frames_in_flight(0).validate().is_err());
        assert!(RendererConfig::default().with_frames_in_flight(9).validate().is_err());
        assert!(RendererConfig::default().with_frames_in_flight(1).validate().is_ok());
        assert!(RendererConfig::default().with_frames_in_flight(8).validate().is_ok());
    }

    #[test]
    fn test_texture_capacity_must_exceed_default_slot() {
        let config = RendererConfig::default().with_max_textures(1);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_invalid_clip_range_rejected() {
        let camera = CameraConfig {
            near: 10.0,
            far: 1.0,
            ..CameraConfig::default()
        };
        assert!(RendererConfig::default().with_camera(camera).validate().is_err());
    }

    #[test]
    fn test_validation_override() {
        assert!(RendererConfig::default().with_validation(true).validation_enabled());
        assert!(!RendererConfig::default().with_validation(false).validation_enabled());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = RendererConfig::new("round trip")
            .with_frames_in_flight(3)
            .with_validation(false);

        let text = toml::to_string_pretty(&config).expect("serialize");
        let parsed: RendererConfig = toml::from_str(&text).expect("parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_ron_round_trip() {
        let config = RendererConfig::new("round trip").with_max_textures(64);

        let text = ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::default())
            .expect("serialize");
        let parsed: RendererConfig = ron::from_str(&text).expect("parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: RendererConfig = toml::from_str("frames_in_flight = 3\n").expect("parse");
        assert_eq!(parsed.frames_in_flight, 3);
        assert_eq!(parsed.max_textures, 20);
    }

    #[test]
    fn test_unsupported_extension_rejected() {
        let path = std::env::temp_dir().join(format!("renderer_{}.yaml", std::process::id()));
        std::fs::write(&path, "frames_in_flight: 2\n").unwrap();

        let result = RendererConfig::load_from_file(path.to_str().unwrap());
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_unsupported_extension_checked_before_reading() {
        let result = RendererConfig::load_from_file("missing/renderer.yaml");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
