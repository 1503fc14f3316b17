//! Subpass viewer
//!
//! Opens a window, uploads a vertex-colored cube over a checkered floor as
//! one two-mesh model, and spins it about the world Z axis until the window
//! is closed.

mod scene;

use std::path::Path;

use subpass_renderer::config::ConfigError;
use subpass_renderer::foundation::logging;
use subpass_renderer::prelude::*;
use subpass_renderer::vulkan::WindowError;
use thiserror::Error;

/// Optional configuration file read from the working directory
const CONFIG_FILE: &str = "viewer.toml";

/// Spin rate in degrees per second
const SPIN_DEGREES_PER_SECOND: f32 = 30.0;

#[derive(Error, Debug)]
enum AppError {
    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    #[error("Renderer error: {0}")]
    Renderer(#[from] VulkanError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

fn load_config() -> Result<RendererConfig, AppError> {
    if Path::new(CONFIG_FILE).exists() {
        log::info!("Loading configuration from {CONFIG_FILE}");
        Ok(RendererConfig::load_from_file(CONFIG_FILE)?)
    } else {
        Ok(RendererConfig::new("Subpass Viewer"))
    }
}

fn run() -> Result<(), AppError> {
    let config = load_config()?;
    let mut window = Window::new(&WindowConfig::default())?;
    let mut renderer = VulkanRenderer::initialize(config, &mut window)?;

    let checker = renderer.create_texture(&scene::checkerboard(256, 8)?)?;
    let model = renderer.create_model(&[scene::floor(checker), scene::cube()])?;

    let mut angle = 0.0_f32;
    let mut last_time = window.time();
    let mut frames = 0_u64;

    while !window.should_close() {
        for event in window.poll_events() {
            if let WindowEvent::Resized(width, height) = event {
                log::debug!("Framebuffer resized to {width}x{height}");
                renderer.notify_resized();
            }
        }

        let now = window.time();
        let delta = (now - last_time) as f32;
        last_time = now;

        angle = (angle + SPIN_DEGREES_PER_SECOND * delta) % 360.0;
        renderer.update_model(model, Mat4::rotation_z(angle.to_radians()))?;

        match renderer.draw(&window)? {
            FrameStatus::Presented => frames += 1,
            FrameStatus::Recreated => log::debug!("Swapchain rebuilt"),
            FrameStatus::Skipped => window.wait_while_minimized(),
        }
    }

    log::info!("Presented {frames} frames");
    renderer.shutdown()?;
    Ok(())
}

fn main() {
    logging::init();

    if let Err(e) = run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}
