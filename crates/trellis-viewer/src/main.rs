//! Trellis viewer entry point
//!
//! Drives the renderer over a headless context for a fixed number of frames
//! and logs the statistics overlay.
//!
//! Environment:
//! - `TRELLIS_CONFIG` - renderer config file (RON); defaults to
//!   `<config dir>/trellis/renderer.ron`
//! - `TRELLIS_FRAMES` - number of frames to draw (default 240)
//! - `RUST_LOG` - log filter

mod demo_scene;

use std::path::PathBuf;

use trellis_core::Camera;
use trellis_renderer::{HeadlessContext, Renderer, RendererConfig};

use demo_scene::DemoScene;

const DEFAULT_FRAMES: u64 = 240;
const WIREFRAME_PERIOD: u64 = 60;
const STATS_PERIOD: u64 = 30;
const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;

/// Get the configuration file path
fn config_path() -> PathBuf {
    std::env::var_os("TRELLIS_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("trellis")
                .join("renderer.ron")
        })
}

fn load_config() -> RendererConfig {
    let path = config_path();
    if !path.exists() {
        tracing::info!("No config file found, using defaults");
        return RendererConfig::default();
    }
    match RendererConfig::load(&path) {
        Ok(config) => {
            tracing::info!("Loaded config from {:?}", path);
            config
        }
        Err(e) => {
            tracing::warn!("Failed to load config from {:?}: {}", path, e);
            RendererConfig::default()
        }
    }
}

fn frame_count() -> u64 {
    std::env::var("TRELLIS_FRAMES")
        .ok()
        .and_then(|frames| frames.parse().ok())
        .unwrap_or(DEFAULT_FRAMES)
}

fn main() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trellis_viewer=info,trellis_renderer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Trellis viewer");

    let config = load_config();
    let mut renderer = Renderer::new(HeadlessContext::new(), config);
    renderer.set_size(WIDTH, HEIGHT);

    let mut camera = Camera::new(WIDTH as f32 / HEIGHT as f32);
    camera.set_position(glam::Vec3::new(6.0, 4.0, 6.0));
    camera.update();

    let mut demo = DemoScene::new();
    let frames = frame_count();
    let mut gpu_calls = 0;

    for frame in 1..=frames {
        demo.animate(frame);
        if frame % WIREFRAME_PERIOD == 0 {
            let wireframe = demo.toggle_wireframe();
            tracing::info!("Frame {}: wireframe {}", frame, if wireframe { "on" } else { "off" });
        }
        camera.orbit(0.01, 0.0);
        camera.update();

        renderer.clear();
        let report = renderer.render(&demo.scene, &camera);
        for failure in &report.failures {
            tracing::warn!("Frame {}: object {} failed: {}", frame, failure.object, failure.error);
        }

        gpu_calls += renderer.context().take_calls().len();

        if frame % STATS_PERIOD == 0 {
            tracing::info!("Frame {}\n{}", frame, renderer.info());
        }
    }

    tracing::info!(
        "Drew {} frames with {} GPU calls, {} buffers, {} vertex arrays",
        frames,
        gpu_calls,
        renderer.buffer_count(),
        renderer.binding_state_count()
    );
    renderer.dispose();
}
